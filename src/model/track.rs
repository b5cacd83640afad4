use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;

/// Stable identifier of a playlist entry
///
/// Derived from the MD5 digest of the original playlist line, so the same
/// text always maps to the same id regardless of position or load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(pub u64);

impl EntryId {
    /// Compute the id of a raw playlist line
    pub fn from_line(line: &str) -> Self {
        let digest = md5::compute(line.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest.0[..8]);
        Self(u64::from_be_bytes(bytes))
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Which value of an entry to read (sorting) or write (saving)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryField {
    /// Text exactly as found in the playlist file
    Original,
    /// Absolute path found on disk
    #[default]
    Resolved,
    /// Alternate value set by the export pipeline
    Mapped,
    /// Base filename
    Name,
}

/// One track line of a playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    /// Identifier computed once from `original`
    pub id: EntryId,

    /// The line as read from the file (or inserted)
    pub original: String,

    /// Absolute path if resolution succeeded
    pub resolved: Option<PathBuf>,

    /// Output value written by the export pipeline
    pub mapped: Option<String>,

    /// Filename portion of `original`
    pub name: String,
}

impl PlaylistEntry {
    /// Create an unresolved entry from a raw line
    pub fn new(line: &str) -> Self {
        Self {
            id: EntryId::from_line(line),
            original: line.to_string(),
            resolved: None,
            mapped: None,
            name: file_name(line).to_string(),
        }
    }

    /// Directory portion of the original line (may be empty)
    pub fn dir(&self) -> &str {
        dir_name(&self.original)
    }

    /// Read one of the entry values as text; empty if the value is absent
    pub fn value(&self, field: EntryField) -> Cow<'_, str> {
        match field {
            EntryField::Original => Cow::Borrowed(&self.original),
            EntryField::Resolved => self
                .resolved
                .as_ref()
                .map(|p| p.to_string_lossy())
                .unwrap_or(Cow::Borrowed("")),
            EntryField::Mapped => Cow::Borrowed(self.mapped.as_deref().unwrap_or("")),
            EntryField::Name => Cow::Borrowed(&self.name),
        }
    }
}

/// Filename part of a playlist line, accepting both separator styles
pub fn file_name(line: &str) -> &str {
    line.rsplit(['/', '\\']).next().unwrap_or(line)
}

/// Directory part of a playlist line, without the trailing separator
pub fn dir_name(line: &str) -> &str {
    match line.rfind(['/', '\\']) {
        Some(0) => &line[..1],
        Some(pos) => &line[..pos],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_reproducible() {
        let a = EntryId::from_line("Music/[A-D]/Artist - Song.mp3");
        let b = EntryId::from_line("Music/[A-D]/Artist - Song.mp3");
        let c = EntryId::from_line("Music/[A-D]/Artist - Song2.mp3");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_name_and_dir_split() {
        assert_eq!(file_name("D:\\Music\\abc.mp3"), "abc.mp3");
        assert_eq!(dir_name("D:\\Music\\abc.mp3"), "D:\\Music");
        assert_eq!(file_name("/music/x/abc.mp3"), "abc.mp3");
        assert_eq!(dir_name("/music/x/abc.mp3"), "/music/x");
        assert_eq!(dir_name("/abc.mp3"), "/");
        assert_eq!(file_name("abc.mp3"), "abc.mp3");
        assert_eq!(dir_name("abc.mp3"), "");
    }

    #[test]
    fn test_entry_values() {
        let mut entry = PlaylistEntry::new("sub/track.mp3");
        assert_eq!(entry.name, "track.mp3");
        assert_eq!(entry.dir(), "sub");
        assert_eq!(entry.value(EntryField::Resolved), "");
        assert_eq!(entry.value(EntryField::Mapped), "");

        entry.resolved = Some(PathBuf::from("/media/sub/track.mp3"));
        entry.mapped = Some("sub/track.mp3".into());
        assert_eq!(entry.value(EntryField::Resolved), "/media/sub/track.mp3");
        assert_eq!(entry.value(EntryField::Original), "sub/track.mp3");
        assert_eq!(entry.value(EntryField::Mapped), "sub/track.mp3");
    }
}
