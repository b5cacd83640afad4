//! M3U file flavours, code pages and backup naming

use crate::Error;
use anyhow::Result;
use encoding_rs::Encoding;
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Byte order mark written in front of *.m3u8 files
pub const BOM: &str = "\u{feff}";

/// UTF-8 byte order mark as found on disk
pub const BOM_BYTES: &[u8] = b"\xEF\xBB\xBF";

/// Prefix of extended M3U lines (`#EXTM3U`, `#EXTINF`); other lines are tracks
pub const DIRECTIVE: &str = "#EXT";

#[cfg(windows)]
pub const EOL: &str = "\r\n";
#[cfg(not(windows))]
pub const EOL: &str = "\n";

/// Supported playlist file types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaylistFormat {
    /// 8-bit code page, no BOM
    M3u,
    /// UTF-8 with BOM
    #[default]
    M3u8,
}

impl PlaylistFormat {
    pub const SUPPORTED: [PlaylistFormat; 2] = [PlaylistFormat::M3u, PlaylistFormat::M3u8];

    pub fn extension(&self) -> &'static str {
        match self {
            PlaylistFormat::M3u => "m3u",
            PlaylistFormat::M3u8 => "m3u8",
        }
    }

    pub fn is_unicode(&self) -> bool {
        matches!(self, PlaylistFormat::M3u8)
    }

    /// Format implied by a file's extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }

    /// "*.m3u, *.m3u8"
    pub fn supported_list() -> String {
        Self::SUPPORTED
            .iter()
            .map(|f| format!("*.{}", f.extension()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for PlaylistFormat {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "m3u" => Ok(PlaylistFormat::M3u),
            "m3u8" => Ok(PlaylistFormat::M3u8),
            _ => Err(Error::UnsupportedOutputFormat(s.to_string())),
        }
    }
}

impl fmt::Display for PlaylistFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Look up a code page by its label (windows-1250, iso-8859-2, ...)
pub fn code_page(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| Error::UnknownCodePage(label.to_string()).into())
}

/// Decode raw playlist bytes into text
pub fn decode(bytes: &[u8], format: PlaylistFormat, cp: &'static Encoding) -> String {
    match format {
        PlaylistFormat::M3u8 => String::from_utf8_lossy(bytes).into_owned(),
        PlaylistFormat::M3u => {
            let (text, had_errors) = cp.decode_without_bom_handling(bytes);
            if had_errors {
                log::warn!("Some characters could not be decoded from {}", cp.name());
            }
            text.into_owned()
        }
    }
}

/// Encode playlist text for writing
pub fn encode<'a>(text: &'a str, format: PlaylistFormat, cp: &'static Encoding) -> Cow<'a, [u8]> {
    match format {
        PlaylistFormat::M3u8 => Cow::Owned(format!("{BOM}{text}").into_bytes()),
        PlaylistFormat::M3u => {
            let (bytes, _, had_errors) = cp.encode(text);
            if had_errors {
                log::warn!("Some characters are not representable in {}", cp.name());
            }
            bytes
        }
    }
}

/// First free `<name> (<n>).<ext>.bak` next to `path`, counting from 1
pub fn backup_name(path: &Path) -> PathBuf {
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut n = 1u32;
    loop {
        let candidate = dir.join(format!("{stem} ({n}).{ext}.bak"));
        if !candidate.is_file() {
            return candidate;
        }
        n += 1;
    }
}
