//! lofty based tag reader

use super::traits::{Tagger, TrackTags};
use anyhow::{Context, Result};
use lofty::prelude::*;
use std::path::Path;

/// Reads artist, title and duration with lofty
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTagger;

impl LoftyTagger {
    pub fn new() -> Self {
        Self
    }
}

impl Tagger for LoftyTagger {
    fn analyze(&self, path: &Path) -> Result<TrackTags> {
        let tagged_file = lofty::read_from_path(path)
            .with_context(|| format!("Failed to read tags from: {}", path.display()))?;

        let mut tags = TrackTags::default();

        let duration = tagged_file.properties().duration();
        if !duration.is_zero() {
            tags.seconds = duration.as_secs() as i64;
        }

        // Primary tag first (ID3v2 for mp3), then whatever else the file carries
        let tag = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag());

        if let Some(tag) = tag {
            if let Some(artist) = tag.artist() {
                tags.artist = artist.into_owned();
            }
            if let Some(title) = tag.title() {
                tags.title = title.into_owned();
            }
        }

        log::debug!("Tags for {:?}: {:?}", path, tags);
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.mp3");
        assert!(LoftyTagger::new().analyze(&path).is_err());
    }
}
