//! Playlist store: ordered entries of one M3U/M3U8 file
//!
//! Entries are kept in an explicit order list plus an id -> entry map, so
//! removing or reordering never renumbers ids. `load()` hydrates the store
//! without marking it dirty; every mutation afterwards does.

use super::format::{self, PlaylistFormat, DIRECTIVE, EOL};
use super::stats::PlaylistStats;
use super::track::{EntryField, EntryId, PlaylistEntry};
use crate::tags::Tagger;
use crate::Error;
use anyhow::{Context, Result};
use encoding_rs::Encoding;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Settings held alongside the entries
#[derive(Clone)]
pub struct PlaylistOptions {
    /// Directory relative lines are resolved from (None = playlist's own dir)
    pub base: Option<PathBuf>,

    /// Code page of *.m3u files
    pub code_page: &'static Encoding,

    /// Writes `#EXTINF` lines on save when set
    pub tagger: Option<Arc<dyn Tagger>>,
}

impl Default for PlaylistOptions {
    fn default() -> Self {
        Self {
            base: None,
            code_page: encoding_rs::WINDOWS_1252,
            tagger: None,
        }
    }
}

impl fmt::Debug for PlaylistOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaylistOptions")
            .field("base", &self.base)
            .field("code_page", &self.code_page.name())
            .field("tagger", &self.tagger.is_some())
            .finish()
    }
}

impl PlaylistOptions {
    pub fn with_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn with_code_page(mut self, code_page: &'static Encoding) -> Self {
        self.code_page = code_page;
        self
    }

    pub fn with_tagger(mut self, tagger: Arc<dyn Tagger>) -> Self {
        self.tagger = Some(tagger);
        self
    }
}

/// One line reported while loading
#[derive(Debug)]
pub struct LoadProgress<'a> {
    /// 1-based number of the non-empty line
    pub current: usize,
    /// Number of non-empty lines in the file
    pub total: usize,
    pub line: &'a str,
    /// Entry created from this line (None for comments and duplicates)
    pub entry: Option<&'a PlaylistEntry>,
}

/// How `save()` should write the playlist
#[derive(Debug, Clone, Copy)]
pub struct SaveOptions {
    /// false = dry run
    pub write: bool,
    /// Rename an existing destination to a `.bak` file first
    pub backup: bool,
    /// Output format, None = keep the current one
    pub format: Option<PlaylistFormat>,
    /// Entry value written per line
    pub field: EntryField,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            write: true,
            backup: true,
            format: None,
            field: EntryField::Resolved,
        }
    }
}

/// Result of `save()`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub file: PathBuf,
    pub backup: Option<PathBuf>,
    /// Bytes written, 0 on dry run
    pub bytes: usize,
}

/// An M3U playlist
#[derive(Debug, Clone)]
pub struct Playlist {
    file: Option<PathBuf>,
    format: Option<PlaylistFormat>,
    options: PlaylistOptions,

    order: Vec<EntryId>,
    entries: HashMap<EntryId, PlaylistEntry>,

    dirty: bool,
    loaded: bool,
    shuffled: bool,
    stats: PlaylistStats,
}

impl Default for Playlist {
    fn default() -> Self {
        Self::new(PlaylistOptions::default())
    }
}

impl Playlist {
    /// Create a memory-only playlist
    pub fn new(options: PlaylistOptions) -> Self {
        Self {
            file: None,
            format: Some(PlaylistFormat::default()),
            options,
            order: Vec::new(),
            entries: HashMap::new(),
            dirty: false,
            loaded: false,
            shuffled: false,
            stats: PlaylistStats::default(),
        }
    }

    /// Create a playlist bound to a file. Nothing is read until `load()`.
    pub fn open(file: impl Into<PathBuf>, options: PlaylistOptions) -> Self {
        let file = file.into();
        let format = PlaylistFormat::from_path(&file);
        Self {
            file: Some(file),
            format,
            ..Self::new(options)
        }
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Current format (None if the bound file has an unsupported extension)
    pub fn format(&self) -> Option<PlaylistFormat> {
        self.format
    }

    pub fn options(&self) -> &PlaylistOptions {
        &self.options
    }

    /// Directory relative lines are resolved from
    pub fn base(&self) -> PathBuf {
        if let Some(base) = &self.options.base {
            return base.clone();
        }
        match self.file.as_deref().and_then(Path::parent) {
            Some(dir) if !dir.as_os_str().is_empty() => {
                fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf())
            }
            _ => std::env::current_dir().unwrap_or_default(),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffled
    }

    pub fn stats(&self) -> &PlaylistStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entry ids in playlist order
    pub fn ids(&self) -> &[EntryId] {
        &self.order
    }

    pub fn get(&self, id: EntryId) -> Option<&PlaylistEntry> {
        self.entries.get(&id)
    }

    /// Entries in playlist order
    pub fn entries(&self) -> impl Iterator<Item = &PlaylistEntry> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    /// One value per entry, in playlist order
    pub fn values(&self, field: EntryField) -> Vec<String> {
        self.entries().map(|e| e.value(field).into_owned()).collect()
    }

    /// Read the bound file once
    pub fn load(&mut self) -> Result<bool> {
        self.load_with(|_| {})
    }

    /// Read the bound file once, reporting every non-empty line
    ///
    /// Returns false when there was nothing to do (already loaded, or no file).
    pub fn load_with<F>(&mut self, mut on_line: F) -> Result<bool>
    where
        F: FnMut(LoadProgress<'_>),
    {
        let Some(file) = self.file.clone() else {
            return Ok(false);
        };
        if self.loaded || !file.is_file() {
            return Ok(false);
        }

        let format = self.format.ok_or_else(|| Error::UnsupportedPlaylistType {
            path: file.clone(),
            ext: file
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default(),
            supported: PlaylistFormat::supported_list(),
        })?;

        let bytes =
            fs::read(&file).with_context(|| format!("Failed to read playlist: {:?}", file))?;
        let bytes = bytes.strip_prefix(format::BOM_BYTES).unwrap_or(&bytes[..]);
        let text = format::decode(bytes, format, self.options.code_page);

        let lines: Vec<&str> = text
            .lines()
            .enumerate()
            .map(|(i, l)| if i == 0 { l.trim_start_matches(format::BOM) } else { l })
            .filter(|l| !l.is_empty())
            .collect();
        let total = lines.len();

        log::debug!("Loading {} lines from {:?}", total, file);

        let was_dirty = self.dirty;

        for (i, line) in lines.iter().enumerate() {
            let id = if line.starts_with(DIRECTIVE) {
                None
            } else {
                self.insert_line(line, true)
            };

            on_line(LoadProgress {
                current: i + 1,
                total,
                line,
                entry: id.and_then(|id| self.entries.get(&id)),
            });
        }

        self.dirty = was_dirty;
        self.loaded = true;
        Ok(true)
    }

    /// Add one line; returns its id unless it was empty or a duplicate
    pub fn insert_line(&mut self, line: &str, resolve: bool) -> Option<EntryId> {
        self.insert([line], resolve).into_iter().next()
    }

    /// Add lines, skipping empty ones and recording duplicates
    ///
    /// With `resolve` set each line is looked up on disk relative to `base()`;
    /// a failed lookup is recorded as missing but the entry is still added.
    pub fn insert<I, S>(&mut self, lines: I, resolve: bool) -> Vec<EntryId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let base = if resolve { Some(self.base()) } else { None };
        let mut inserted = Vec::new();
        let mut dupes: Vec<(String, Vec<EntryId>)> = Vec::new();

        for line in lines {
            let line = line.as_ref();
            if line.is_empty() {
                continue;
            }

            let mut entry = PlaylistEntry::new(line);
            let id = entry.id;

            if self.entries.contains_key(&id) {
                match dupes.iter_mut().find(|(key, _)| key == line) {
                    Some((_, ids)) => ids.push(id),
                    None => dupes.push((line.to_string(), vec![id])),
                }
                continue;
            }

            if let Some(base) = &base {
                entry.resolved = resolve_line(base, line);
                if entry.resolved.is_none() {
                    self.stats.missing.insert(id, line.to_string());
                }
            }

            self.order.push(id);
            self.entries.insert(id, entry);
            inserted.push(id);
            self.dirty = true;
        }

        self.stats.add_dupes(dupes);
        inserted
    }

    /// Set the resolved path of an entry; a change counts as a move
    pub fn update_path(&mut self, id: EntryId, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        if entry.resolved.as_ref() == Some(&path) {
            return false;
        }

        self.stats
            .moved
            .insert(id, path.to_string_lossy().into_owned());
        entry.resolved = Some(path);
        self.dirty = true;
        true
    }

    /// Put the original text back as the entry's path (not a move)
    pub fn reset_path(&mut self, id: EntryId) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        let original = PathBuf::from(&entry.original);
        if entry.resolved.as_ref() == Some(&original) {
            return false;
        }
        entry.resolved = Some(original);
        self.dirty = true;
        true
    }

    /// Set the export value of an entry
    pub fn set_mapped(&mut self, id: EntryId, value: impl Into<String>) -> bool {
        let value = value.into();
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        if entry.mapped.as_deref() == Some(value.as_str()) {
            return false;
        }
        entry.mapped = Some(value);
        self.dirty = true;
        true
    }

    /// Remove entries, recording their original line as removed
    ///
    /// Unknown (or already removed) ids are ignored.
    pub fn remove(&mut self, ids: &[EntryId]) {
        for id in ids {
            if let Some(entry) = self.entries.remove(id) {
                self.order.retain(|o| o != id);
                self.stats.removed.insert(*id, entry.original);
                self.dirty = true;
            }
        }
    }

    /// Find entries resolving to the same file
    ///
    /// Unresolved entries never count as duplicates. With `remove` set,
    /// every occurrence after the first is removed. Returns the number of
    /// duplicate entries found.
    pub fn duplicates(&mut self, remove: bool) -> usize {
        let mut first_seen: HashMap<PathBuf, EntryId> = HashMap::new();
        let mut found: Vec<(String, Vec<EntryId>)> = Vec::new();

        for id in &self.order {
            let Some(path) = self.entries.get(id).and_then(|e| e.resolved.clone()) else {
                continue;
            };
            if first_seen.contains_key(&path) {
                let key = path.to_string_lossy().into_owned();
                match found.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, ids)) => ids.push(*id),
                    None => found.push((key, vec![*id])),
                }
            } else {
                first_seen.insert(path, *id);
            }
        }

        let count = found.iter().map(|(_, ids)| ids.len()).sum();
        if remove {
            for (_, ids) in &found {
                self.remove(ids);
            }
        }
        self.stats.add_dupes(found);
        count
    }

    /// Sort by an entry value; returns whether the order changed
    pub fn sort(&mut self, field: EntryField, ascending: bool) -> bool {
        let mut keyed: Vec<(String, EntryId)> = self
            .order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|e| (e.value(field).into_owned(), e.id))
            .collect();

        if ascending {
            keyed.sort_by(|a, b| a.0.cmp(&b.0));
        } else {
            keyed.sort_by(|a, b| b.0.cmp(&a.0));
        }

        let sorted: Vec<EntryId> = keyed.into_iter().map(|(_, id)| id).collect();
        self.reorder(sorted)
    }

    /// Randomize order; returns whether the order changed
    pub fn shuffle(&mut self) -> bool {
        let mut shuffled = self.order.clone();
        shuffled.shuffle(&mut rand::thread_rng());
        self.shuffled = true;
        self.reorder(shuffled)
    }

    fn reorder(&mut self, order: Vec<EntryId>) -> bool {
        let changed = order != self.order;
        self.order = order;
        self.dirty |= changed;
        changed
    }

    /// Keep only the first `length` entries
    pub fn reduce(&mut self, length: usize) -> bool {
        if length >= self.order.len() {
            return false;
        }
        for id in self.order.drain(length..) {
            self.entries.remove(&id);
        }
        self.dirty = true;
        true
    }

    /// Build the file content (without BOM / code page conversion)
    pub fn render(&self, field: EntryField) -> String {
        let tagger = self.options.tagger.as_deref();
        let mut out = String::new();

        if tagger.is_some() {
            out.push_str("#EXTM3U");
            out.push_str(EOL);
        }

        for entry in self.entries() {
            let value = entry.value(field);
            if value.is_empty() {
                continue;
            }

            if let (Some(tagger), Some(path)) = (tagger, entry.resolved.as_deref()) {
                if path.is_file() {
                    match tagger.analyze(path) {
                        Ok(tags) => {
                            out.push_str(&tags.extinf());
                            out.push_str(EOL);
                        }
                        Err(e) => log::debug!("No tags for {:?}: {:#}", path, e),
                    }
                }
            }

            out.push_str(&value);
            out.push_str(EOL);
        }

        out
    }

    /// Write the playlist to disk
    ///
    /// The destination is the bound file, or the bound file with the
    /// extension of the output format when the format changes. The dirty
    /// flag is cleared even on a dry run.
    pub fn save(&mut self, options: SaveOptions) -> Result<SaveReport> {
        let file = self.file.clone().ok_or(Error::PlaylistWithoutFile)?;
        let format = options
            .format
            .or(self.format)
            .ok_or_else(|| Error::UnsupportedOutputFormat(file.to_string_lossy().into_owned()))?;

        let text = self.render(options.field);
        let bytes = format::encode(&text, format, self.options.code_page);

        let mut report = SaveReport {
            file: if Some(format) == self.format {
                file
            } else {
                file.with_extension(format.extension())
            },
            backup: None,
            bytes: 0,
        };

        if options.write && options.backup && report.file.is_file() {
            let backup = format::backup_name(&report.file);
            fs::rename(&report.file, &backup).with_context(|| {
                format!("Failed to back up {:?} to {:?}", report.file, backup)
            })?;
            log::debug!("Backup: {:?}", backup);
            report.backup = Some(backup);
        }

        if options.write {
            fs::write(&report.file, &bytes)
                .with_context(|| format!("Failed to write playlist: {:?}", report.file))?;
            report.bytes = bytes.len();
        }

        self.dirty = false;
        Ok(report)
    }
}

/// Canonical path of `line` relative to `base`, if it exists
fn resolve_line(base: &Path, line: &str) -> Option<PathBuf> {
    let path = Path::new(line);
    let candidate = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    fs::canonicalize(candidate).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::TrackTags;
    use tempfile::TempDir;

    fn media(dir: &Path, names: &[&str]) {
        for name in names {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, name.as_bytes()).unwrap();
        }
    }

    struct FixedTagger;

    impl Tagger for FixedTagger {
        fn analyze(&self, path: &Path) -> Result<TrackTags> {
            Ok(TrackTags {
                artist: "Artist".into(),
                title: path.file_stem().unwrap().to_string_lossy().into_owned(),
                seconds: 3,
            })
        }
    }

    #[test]
    fn test_insert_is_idempotent_for_same_line() {
        let mut pl = Playlist::default();
        let ids = pl.insert(["a.mp3", "b.mp3", "a.mp3", "", "a.mp3"], false);

        assert_eq!(ids.len(), 2);
        assert_eq!(pl.len(), 2);
        assert_eq!(pl.stats().duped, vec!["a.mp3".to_string()]);
        assert_eq!(pl.stats().dupes["a.mp3"].len(), 2);
        assert!(pl.is_dirty());
    }

    #[test]
    fn test_insert_records_missing() {
        let dir = TempDir::new().unwrap();
        media(dir.path(), &["here.mp3"]);

        let mut pl = Playlist::new(PlaylistOptions::default().with_base(dir.path()));
        let ids = pl.insert(["here.mp3", "gone.mp3"], true);

        assert_eq!(ids.len(), 2);
        assert!(pl.get(ids[0]).unwrap().resolved.is_some());
        assert!(pl.get(ids[1]).unwrap().resolved.is_none());
        assert_eq!(pl.stats().missing.get(&ids[1]).unwrap(), "gone.mp3");
    }

    #[test]
    fn test_remove_twice_counts_once() {
        let mut pl = Playlist::default();
        let ids = pl.insert(["a.mp3", "b.mp3"], false);

        pl.remove(&[ids[0]]);
        pl.remove(&[ids[0]]);

        assert_eq!(pl.len(), 1);
        assert_eq!(pl.stats().removed.len(), 1);
        assert_eq!(pl.stats().removed[&ids[0]], "a.mp3");
        assert_eq!(pl.ids(), &[ids[1]]);
    }

    #[test]
    fn test_duplicates_by_resolved_path() {
        let dir = TempDir::new().unwrap();
        media(dir.path(), &["sub/a.mp3"]);

        let mut pl = Playlist::new(PlaylistOptions::default().with_base(dir.path()));
        let ids = pl.insert(["sub/a.mp3", "sub/../sub/a.mp3", "x/gone.mp3", "y/../x/gone.mp3"], true);

        assert_eq!(pl.duplicates(false), 1);
        assert_eq!(pl.len(), 4);

        assert_eq!(pl.duplicates(true), 1);
        assert_eq!(pl.len(), 3);
        assert!(pl.get(ids[0]).is_some());
        assert!(pl.get(ids[1]).is_none());
        // unresolved entries are never duplicates
        assert!(pl.get(ids[2]).is_some());
        assert!(pl.get(ids[3]).is_some());
    }

    #[test]
    fn test_sort_reports_unchanged_second_time() {
        let mut pl = Playlist::default();
        pl.insert(["c.mp3", "a.mp3", "b.mp3"], false);

        assert!(pl.sort(EntryField::Original, false));
        assert_eq!(pl.values(EntryField::Original), vec!["c.mp3", "b.mp3", "a.mp3"]);
        assert!(pl.sort(EntryField::Original, true));
        assert!(!pl.sort(EntryField::Original, true));
        assert_eq!(pl.values(EntryField::Name), vec!["a.mp3", "b.mp3", "c.mp3"]);
    }

    #[test]
    fn test_reduce() {
        let mut pl = Playlist::default();
        pl.insert(["1.mp3", "2.mp3", "3.mp3", "4.mp3"], false);

        pl.mark_clean();
        assert!(!pl.reduce(4));
        assert!(!pl.is_dirty());

        assert!(pl.reduce(2));
        assert!(pl.is_dirty());
        assert_eq!(pl.values(EntryField::Original), vec!["1.mp3", "2.mp3"]);
    }

    #[test]
    fn test_shuffle_keeps_entries() {
        let mut pl = Playlist::default();
        let lines: Vec<String> = (0..50).map(|i| format!("{i}.mp3")).collect();
        pl.insert(&lines, false);

        pl.shuffle();
        assert!(pl.is_shuffled());
        let mut values = pl.values(EntryField::Original);
        values.sort();
        let mut expect = lines.clone();
        expect.sort();
        assert_eq!(values, expect);
    }

    #[test]
    fn test_load_does_not_set_dirty() {
        let dir = TempDir::new().unwrap();
        media(dir.path(), &["a.mp3", "b.mp3"]);
        let file = dir.path().join("list.m3u8");
        fs::write(&file, "\u{feff}#EXTM3U\r\n#EXTINF:1,x - y\r\na.mp3\r\n\r\nb.mp3\r\nc.mp3\r\n").unwrap();

        let mut pl = Playlist::open(&file, PlaylistOptions::default());
        let mut seen = Vec::new();
        assert!(pl
            .load_with(|p| seen.push((p.current, p.total, p.entry.is_some())))
            .unwrap());

        assert!(!pl.is_dirty());
        assert!(pl.is_loaded());
        assert_eq!(pl.len(), 3);
        assert_eq!(
            seen,
            vec![(1, 5, false), (2, 5, false), (3, 5, true), (4, 5, true), (5, 5, true)]
        );
        assert_eq!(pl.stats().missing.len(), 1);

        // second load is a no-op
        assert!(!pl.load().unwrap());
        assert_eq!(pl.len(), 3);
    }

    #[test]
    fn test_load_empty_file_reports_nothing() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("empty.m3u");
        fs::write(&file, "").unwrap();

        let mut pl = Playlist::open(&file, PlaylistOptions::default());
        let mut count = 0;
        pl.load_with(|_| count += 1).unwrap();
        assert_eq!(count, 0);
        assert!(pl.is_empty());
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("list.pls");
        fs::write(&file, "a.mp3\n").unwrap();

        let err = Playlist::open(&file, PlaylistOptions::default())
            .load()
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::UnsupportedPlaylistType { .. })
        ));
    }

    #[test]
    fn test_load_resolves_from_configured_base() {
        let dir = TempDir::new().unwrap();
        media(dir.path(), &["media/a.mp3"]);
        fs::create_dir_all(dir.path().join("lists")).unwrap();
        let file = dir.path().join("lists/list.m3u8");
        fs::write(&file, "a.mp3\n").unwrap();

        let mut next_to_file = Playlist::open(&file, PlaylistOptions::default());
        next_to_file.load().unwrap();
        assert!(next_to_file.entries().all(|e| e.resolved.is_none()));

        let mut from_media = Playlist::open(
            &file,
            PlaylistOptions::default().with_base(dir.path().join("media")),
        );
        from_media.load().unwrap();
        assert!(from_media.entries().all(|e| e.resolved.is_some()));
    }

    #[test]
    fn test_ascii_playlist_uses_code_page() {
        let dir = TempDir::new().unwrap();
        media(dir.path(), &["Żółw.mp3"]);
        let cp = format::code_page("windows-1250").unwrap();
        let file = dir.path().join("list.m3u");
        fs::write(&file, format::encode("Żółw.mp3\n", PlaylistFormat::M3u, cp)).unwrap();

        let mut pl = Playlist::open(&file, PlaylistOptions::default().with_code_page(cp));
        pl.load().unwrap();
        let entry = pl.entries().next().unwrap();
        assert_eq!(entry.original, "Żółw.mp3");
        assert!(entry.resolved.is_some());

        let report = pl
            .save(SaveOptions {
                backup: false,
                field: EntryField::Original,
                ..SaveOptions::default()
            })
            .unwrap();
        let expected = format::encode(&format!("Żółw.mp3{EOL}"), PlaylistFormat::M3u, cp).into_owned();
        assert_eq!(report.file, file);
        assert_eq!(fs::read(&file).unwrap(), expected);
        assert_eq!(expected.len(), "Żółw.mp3".chars().count() + EOL.len());
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = TempDir::new().unwrap();
        media(dir.path(), &["a.mp3", "b.mp3"]);
        let file = dir.path().join("list.m3u8");
        fs::write(&file, "a.mp3\nmissing.mp3\nb.mp3\n").unwrap();

        let mut pl = Playlist::open(&file, PlaylistOptions::default());
        pl.load().unwrap();
        let before: Vec<String> = pl
            .entries()
            .filter_map(|e| e.resolved.clone())
            .map(|p| p.to_string_lossy().into_owned())
            .collect();

        let report = pl.save(SaveOptions::default()).unwrap();
        assert!(report.bytes > 0);
        assert_eq!(report.backup, Some(dir.path().join("list (1).m3u8.bak")));
        assert!(fs::read(&report.file).unwrap().starts_with(&[0xEF, 0xBB, 0xBF]));

        let mut again = Playlist::open(&file, PlaylistOptions::default());
        again.load().unwrap();
        assert_eq!(again.values(EntryField::Resolved), before);
        assert_eq!(again.len(), 2);
    }

    #[test]
    fn test_dry_run_writes_nothing_and_clears_dirty() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("new.m3u8");

        let mut pl = Playlist::open(&file, PlaylistOptions::default());
        pl.insert(["a.mp3"], false);
        assert!(pl.is_dirty());

        let report = pl
            .save(SaveOptions {
                write: false,
                field: EntryField::Original,
                ..SaveOptions::default()
            })
            .unwrap();

        assert_eq!(report.bytes, 0);
        assert_eq!(report.backup, None);
        assert!(!file.exists());
        assert!(!pl.is_dirty());
    }

    #[test]
    fn test_no_backup_when_destination_absent() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("list.m3u");

        let mut pl = Playlist::open(&file, PlaylistOptions::default());
        pl.insert(["a.mp3"], false);
        let report = pl
            .save(SaveOptions {
                format: Some(PlaylistFormat::M3u8),
                field: EntryField::Original,
                ..SaveOptions::default()
            })
            .unwrap();

        assert_eq!(report.file, dir.path().join("list.m3u8"));
        assert_eq!(report.backup, None);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_hash_prefixed_track_is_kept() {
        let dir = TempDir::new().unwrap();
        media(dir.path(), &["#1 Crush.mp3", "b.mp3"]);
        let file = dir.path().join("list.m3u8");
        fs::write(&file, "#EXTM3U\n#EXTINF:200,Garbage - #1 Crush\n#1 Crush.mp3\nb.mp3\n").unwrap();

        let mut pl = Playlist::open(&file, PlaylistOptions::default());
        pl.load().unwrap();

        assert_eq!(pl.len(), 2);
        assert_eq!(pl.values(EntryField::Original), vec!["#1 Crush.mp3", "b.mp3"]);
        assert!(pl.entries().all(|e| e.resolved.is_some()));
    }

    #[test]
    fn test_ascii_playlist_strips_utf8_bom() {
        let dir = TempDir::new().unwrap();
        media(dir.path(), &["a.mp3"]);
        let file = dir.path().join("list.m3u");
        fs::write(&file, b"\xEF\xBB\xBFa.mp3\r\nb.mp3").unwrap();

        let mut pl = Playlist::open(&file, PlaylistOptions::default());
        pl.load().unwrap();

        assert_eq!(pl.values(EntryField::Original), vec!["a.mp3", "b.mp3"]);
        assert!(pl.entries().next().unwrap().resolved.is_some());
    }

    #[test]
    fn test_save_keeps_extension_case() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("Party.M3U8");
        fs::write(&file, "old.mp3\n").unwrap();

        let mut pl = Playlist::open(&file, PlaylistOptions::default());
        pl.load().unwrap();
        pl.insert(["new.mp3"], false);
        let report = pl
            .save(SaveOptions {
                field: EntryField::Original,
                ..SaveOptions::default()
            })
            .unwrap();

        assert_eq!(report.file, file);
        assert_eq!(report.backup, Some(dir.path().join("Party (1).M3U8.bak")));
        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["Party (1).M3U8.bak", "Party.M3U8"]);

        // a format change still swaps the extension
        let report = pl
            .save(SaveOptions {
                write: false,
                format: Some(PlaylistFormat::M3u),
                field: EntryField::Original,
                ..SaveOptions::default()
            })
            .unwrap();
        assert_eq!(report.file, dir.path().join("Party.m3u"));
    }

    #[test]
    fn test_remove_records_original_line() {
        let mut pl = Playlist::default();
        let ids = pl.insert(["a.mp3", "b.mp3"], false);
        pl.remove(&ids[..1]);

        assert_eq!(pl.stats().removed.len(), 1);
        assert_eq!(pl.stats().removed.get(&ids[0]).map(String::as_str), Some("a.mp3"));
        assert!(pl.stats().moved.is_empty());
        assert!(pl.stats().missing.is_empty());
    }

    #[test]
    fn test_save_with_tags() {
        let dir = TempDir::new().unwrap();
        media(dir.path(), &["a.mp3"]);
        let file = dir.path().join("list.m3u8");
        fs::write(&file, "a.mp3\nmissing.mp3\n").unwrap();

        let mut pl = Playlist::open(
            &file,
            PlaylistOptions::default().with_tagger(Arc::new(FixedTagger)),
        );
        pl.load().unwrap();

        let text = pl.render(EntryField::Original);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec!["#EXTM3U", "#EXTINF:3,Artist - a", "a.mp3", "missing.mp3"]
        );
    }

    #[test]
    fn test_update_and_reset_path() {
        let mut pl = Playlist::default();
        let id = pl.insert_line("old/a.mp3", false).unwrap();
        pl.mark_clean();

        assert!(pl.reset_path(id));
        assert!(pl.stats().moved.is_empty());
        assert!(!pl.reset_path(id));

        assert!(pl.update_path(id, "/new/a.mp3"));
        assert!(!pl.update_path(id, "/new/a.mp3"));
        assert_eq!(pl.stats().moved[&id], "/new/a.mp3");

        assert!(pl.set_mapped(id, "x/a.mp3"));
        assert_eq!(pl.get(id).unwrap().value(EntryField::Mapped), "x/a.mp3");
    }

    impl Playlist {
        fn mark_clean(&mut self) {
            self.dirty = false;
        }
    }
}
