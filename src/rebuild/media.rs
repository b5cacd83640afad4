//! Alphabetic media folder
//!
//! The media root holds one sub-folder per letter range, each named with a
//! regex character class (`[A-D]`, `[E-H]`, `[0-9]` ...). A file lives in the
//! first folder whose name matches its first character.

use crate::Error;
use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Default escape bucket for names no other bucket matches
pub const DEFAULT_ESCAPE: &str = "[0-9]";

#[derive(Debug, Clone)]
pub struct MediaLibrary {
    root: PathBuf,
    escape: PathBuf,
    buckets: Vec<(String, Regex)>,
}

impl MediaLibrary {
    /// Scan the media root for letter buckets
    pub fn open(root: &Path, escape: &str) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::MissingMediaFolder(root.to_path_buf()).into());
        }
        let root = fs::canonicalize(root)
            .with_context(|| format!("Failed to resolve media folder: {:?}", root))?;

        let escape_dir = root.join(escape);
        if !escape_dir.is_dir() {
            return Err(Error::MissingEscapeFolder {
                name: escape.to_string(),
                media: root,
            }
            .into());
        }

        let mut buckets = Vec::new();
        for entry in WalkDir::new(&root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.with_context(|| format!("Failed to scan media folder: {:?}", root))?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match RegexBuilder::new(&name).case_insensitive(true).build() {
                Ok(re) => buckets.push((name, re)),
                Err(_) => log::debug!("Ignoring media sub-folder {:?}", name),
            }
        }

        log::debug!(
            "Media folder {:?}: {} buckets, escape {:?}",
            root,
            buckets.len(),
            escape_dir
        );

        Ok(Self {
            root,
            escape: escape_dir,
            buckets,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn escape(&self) -> &Path {
        &self.escape
    }

    /// Bucket folder names, in match order
    pub fn bucket_names(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|(name, _)| name.as_str())
    }

    /// Folder a file with this name belongs to
    pub fn bucket_for(&self, file_name: &str) -> PathBuf {
        let Some(first) = file_name.chars().next() else {
            return self.escape.clone();
        };
        let mut buf = [0u8; 4];
        let first = first.encode_utf8(&mut buf);

        self.buckets
            .iter()
            .find(|(_, re)| re.is_match(first))
            .map(|(name, _)| self.root.join(name))
            .unwrap_or_else(|| self.escape.clone())
    }

    /// Existing file for this name inside its bucket
    pub fn locate(&self, file_name: &str) -> Option<PathBuf> {
        let path = self.bucket_for(file_name).join(file_name);
        if path.exists() {
            Some(path)
        } else {
            log::debug!("Not in media folder: {:?}", path);
            None
        }
    }
}
