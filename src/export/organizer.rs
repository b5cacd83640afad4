//! Export directory layout and file copying

use super::config::ExportConfig;
use crate::model::file_name;
use crate::Error;
use anyhow::{Context, Result};
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};

/// Where exported playlists and media files go
#[derive(Debug, Clone)]
pub struct ExportLayout {
    output_dir: PathBuf,
    /// None = playlists reference the source files
    export_dir: Option<PathBuf>,
    export_map: String,
    sep: String,
}

impl ExportLayout {
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            export_dir: config.is_export().then(|| config.export_dir.clone()),
            export_map: config.export_map.clone(),
            sep: config.export_sep.clone(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn export_dir(&self) -> Option<&Path> {
        self.export_dir.as_deref()
    }

    /// Check (or create) the output and export dirs
    pub fn prepare(&self, auto_dirs: bool) -> Result<()> {
        prepare_dir("Playlists output", &self.output_dir, auto_dirs)?;
        if let Some(dir) = &self.export_dir {
            prepare_dir("Music output", dir, auto_dirs)?;
        }
        Ok(())
    }

    /// `{last_dir}{sep}{file}` of a source path
    fn last(&self, source: &Path) -> String {
        let text = source.to_string_lossy();
        let home = source
            .parent()
            .and_then(Path::file_name)
            .map(|d| d.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}{}{}", home, self.sep, file_name(&text))
    }

    /// Line written to exported playlists for a source file
    pub fn track_line(&self, source: &Path) -> String {
        if self.export_dir.is_none() {
            return source.to_string_lossy().into_owned();
        }
        let last = self.last(source);
        if self.export_map.is_empty() {
            last
        } else {
            format!("{}{}{}", self.export_map, self.sep, last)
        }
    }

    /// Copy destination of a source file (None when not exporting)
    pub fn destination(&self, source: &Path) -> Option<PathBuf> {
        let dir = self.export_dir.as_ref()?;
        let home = source.parent().and_then(Path::file_name)?;
        let name = source.file_name()?;
        Some(dir.join(home).join(name))
    }

    /// Output file of a playlist
    pub fn playlist_file(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{}.m3u8", name))
    }
}

/// Make sure an output dir exists
pub fn prepare_dir(what: &str, dir: &Path, auto_dirs: bool) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Err(Error::MissingDirectory {
            what: what.to_string(),
            path: dir.to_path_buf(),
        }
        .into());
    }
    if !dir.is_dir() {
        if !auto_dirs {
            return Err(Error::MissingDirectory {
                what: what.to_string(),
                path: dir.to_path_buf(),
            }
            .into());
        }
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
        log::info!("Created {} dir {:?}", what, dir);
    }
    log::info!("{} dir set: {:?}", what, dir);
    Ok(())
}

/// Copy a media file, giving the copy the source's mtime
pub fn copy_track(source: &Path, dest: &Path) -> Result<u64> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let bytes = fs::copy(source, dest)
        .with_context(|| format!("Failed to copy {:?} to {:?}", source, dest))?;

    let meta = fs::metadata(source).with_context(|| format!("Failed to stat {:?}", source))?;
    filetime::set_file_mtime(dest, FileTime::from_last_modification_time(&meta))
        .with_context(|| format!("Failed to set mtime of {:?}", dest))?;

    Ok(bytes)
}
