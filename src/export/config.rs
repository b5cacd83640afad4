//! Export configuration
//!
//! Read from a JSON file; every key is optional. Command line flags may
//! override single keys afterwards through the `with_*` setters.

use crate::Error;
use anyhow::{Context, Result};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Size limit as written in the config: a byte count or a size string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ByteSize {
    Bytes(u64),
    Text(String),
}

impl Default for ByteSize {
    fn default() -> Self {
        ByteSize::Bytes(0)
    }
}

impl ByteSize {
    /// Byte count, 0 = unlimited
    pub fn bytes(&self) -> Result<u64> {
        match self {
            ByteSize::Bytes(n) => Ok(*n),
            ByteSize::Text(s) => parse_bytes(s),
        }
    }
}

/// One configured playlist
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistDef {
    /// File name relative to the Winamp dir
    pub file: String,
    pub name: Option<String>,
    /// Number of output copies
    pub save: Option<u32>,
    /// Max tracks, 0 = all
    pub limit: usize,
    pub shuffle: bool,
}

/// A playlist definition with defaults applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistJob {
    pub name: String,
    pub file: String,
    pub shuffle: bool,
    pub limit: usize,
    pub save: u32,
    /// Counts against the total size limit
    pub budgeted: bool,
}

impl PlaylistJob {
    /// Apply defaults; a playlist saved more than once is always shuffled
    pub fn from_def(def: &PlaylistDef) -> Self {
        let save = def.save.unwrap_or(1);
        Self {
            name: def.name.clone().unwrap_or_else(|| "Unknown".to_string()),
            file: def.file.clone(),
            shuffle: def.shuffle || save > 1,
            limit: def.limit,
            save,
            budgeted: true,
        }
    }

    /// Catalog playlist added by title: as-is, never shuffled, no size limit
    pub fn extra(name: &str, file: &str) -> Self {
        Self {
            name: name.to_string(),
            file: file.to_string(),
            shuffle: false,
            limit: 0,
            save: 1,
            budgeted: false,
        }
    }

    /// Output file names (without extension), one per saved copy
    pub fn output_names(&self) -> Vec<String> {
        if self.save <= 1 {
            return vec![self.name.clone()];
        }
        let width = (self.save / 10 + 1) as usize;
        (1..=self.save)
            .map(|i| format!("{}_{:0width$}", self.name, i))
            .collect()
    }
}

/// Configuration of an export run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Title written in playlist headers
    pub title: String,
    /// Winamp media library dir (playlists.xml + *.m3u8)
    pub winamp_dir: PathBuf,
    pub winamp_xml: String,
    /// Manifest file name inside output/export dirs
    pub manifest: String,
    /// Name of the all-tracks playlist
    pub playlist_all: String,
    /// Create missing output/export dirs
    pub auto_dirs: bool,
    pub total_size: ByteSize,
    /// Where generated playlists go
    pub output_dir: PathBuf,
    /// Where media files are copied; empty = no copying
    pub export_dir: PathBuf,
    /// Prefix written in playlists instead of the export dir
    pub export_map: String,
    pub export_sep: String,
    pub playlists: Vec<PlaylistDef>,
    /// Catalog titles added unbudgeted
    pub extra: Vec<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            title: "Export Winamp ML".to_string(),
            winamp_dir: PathBuf::new(),
            winamp_xml: "playlists.xml".to_string(),
            manifest: "export.json".to_string(),
            playlist_all: "Export".to_string(),
            auto_dirs: false,
            total_size: ByteSize::default(),
            output_dir: PathBuf::new(),
            export_dir: PathBuf::new(),
            export_map: String::new(),
            export_sep: "/".to_string(),
            playlists: Vec::new(),
            extra: Vec::new(),
        }
    }
}

impl ExportConfig {
    /// Read a JSON config file, expanding `~` in its paths
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read export config: {:?}", path))?;
        let mut config: ExportConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse export config: {:?}", path))?;

        config.winamp_dir = expand(&config.winamp_dir);
        config.output_dir = expand(&config.output_dir);
        config.export_dir = expand(&config.export_dir);
        Ok(config)
    }

    pub fn with_winamp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.winamp_dir = dir.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = dir.into();
        self
    }

    pub fn with_total_size(mut self, size: ByteSize) -> Self {
        self.total_size = size;
        self
    }

    pub fn with_auto_dirs(mut self, auto_dirs: bool) -> Self {
        self.auto_dirs = auto_dirs;
        self
    }

    /// Media files are copied
    pub fn is_export(&self) -> bool {
        !self.export_dir.as_os_str().is_empty()
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.winamp_dir.join(&self.winamp_xml)
    }
}

/// Expand a leading `~`
pub fn expand(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).as_ref()),
        None => path.to_path_buf(),
    }
}

const UNITS: [&str; 7] = ["B", "K", "M", "G", "T", "P", "E"];

/// Parse `44444`, `120M`, `3.4G`, `1 GB` ... into bytes (K = 1024)
pub fn parse_bytes(text: &str) -> Result<u64> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(0);
    }

    let re = RegexBuilder::new(r"^([\d.]+)\s?([BKMGTPE]?)B?$")
        .case_insensitive(true)
        .build()
        .context("Invalid size pattern")?;

    let caps = re
        .captures(text)
        .ok_or_else(|| Error::InvalidByteSize(text.to_string()))?;
    let number: f64 = caps[1]
        .parse()
        .map_err(|_| Error::InvalidByteSize(text.to_string()))?;
    let unit = caps[2].to_ascii_uppercase();
    let power = UNITS
        .iter()
        .position(|u| *u == unit)
        .unwrap_or(0);

    Ok((number * 1024f64.powi(power as i32)).round() as u64)
}

/// Human readable size: `512 B`, `1.50 MB` ...
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut power = 0;
    while value >= 1024.0 && power < UNITS.len() - 1 {
        value /= 1024.0;
        power += 1;
    }
    if power == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}B", value, UNITS[power])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_bytes() {
        assert_eq!(parse_bytes("44444").unwrap(), 44444);
        assert_eq!(parse_bytes("120M").unwrap(), 120 * 1024 * 1024);
        assert_eq!(parse_bytes("1 kb").unwrap(), 1024);
        assert_eq!(parse_bytes("0").unwrap(), 0);
        assert_eq!(parse_bytes("").unwrap(), 0);
        assert_eq!(
            parse_bytes("3.5G").unwrap(),
            (3.5 * 1024.0 * 1024.0 * 1024.0) as u64
        );

        let err = parse_bytes("lots").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::InvalidByteSize(_))
        ));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_output_names_padding() {
        let mut job = PlaylistJob::from_def(&PlaylistDef {
            file: "a.m3u8".into(),
            name: Some("Party".into()),
            save: Some(3),
            ..PlaylistDef::default()
        });
        assert!(job.shuffle);
        assert_eq!(job.output_names(), vec!["Party_1", "Party_2", "Party_3"]);

        job.save = 12;
        let names = job.output_names();
        assert_eq!(names.len(), 12);
        assert_eq!(names[0], "Party_01");
        assert_eq!(names[11], "Party_12");

        job.save = 1;
        assert_eq!(job.output_names(), vec!["Party"]);
    }

    #[test]
    fn test_defaults_applied() {
        let job = PlaylistJob::from_def(&PlaylistDef {
            file: "a.m3u8".into(),
            ..PlaylistDef::default()
        });
        assert_eq!(job.name, "Unknown");
        assert_eq!(job.save, 1);
        assert!(!job.shuffle);
        assert!(job.budgeted);
        assert!(!PlaylistJob::extra("X", "x.m3u8").budgeted);
    }

    #[test]
    fn test_load_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("export.config.json");
        fs::write(
            &path,
            r#"{
                "winamp_dir": "/ml",
                "output_dir": "/out",
                "total_size": "2G",
                "playlists": [{"file": "plf1.m3u8", "name": "One", "limit": 10}],
                "extra": ["Chill"]
            }"#,
        )
        .unwrap();

        let config = ExportConfig::load(&path).unwrap();
        assert_eq!(config.winamp_dir, PathBuf::from("/ml"));
        assert_eq!(config.manifest, "export.json");
        assert_eq!(config.export_sep, "/");
        assert!(!config.is_export());
        assert_eq!(config.total_size.bytes().unwrap(), 2 * 1024 * 1024 * 1024);
        assert_eq!(config.playlists[0].limit, 10);
        assert_eq!(config.extra, vec!["Chill"]);

        let numeric: ExportConfig = serde_json::from_str(r#"{"total_size": 50000}"#).unwrap();
        assert_eq!(numeric.total_size, ByteSize::Bytes(50000));
    }
}
