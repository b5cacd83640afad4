//! Tagger trait definition and tag data

use anyhow::Result;
use std::path::Path;

/// Placeholder used for unknown artist/title
pub const UNKNOWN: &str = "n/a";

/// Reads the tags an `#EXTINF` line needs
pub trait Tagger {
    /// Analyze a media file. Any error means "no tag line" for that file.
    fn analyze(&self, path: &Path) -> Result<TrackTags>;
}

/// Tags of one media file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackTags {
    pub artist: String,
    pub title: String,
    /// Play time, -1 when unknown
    pub seconds: i64,
}

impl Default for TrackTags {
    fn default() -> Self {
        Self {
            artist: UNKNOWN.to_string(),
            title: UNKNOWN.to_string(),
            seconds: -1,
        }
    }
}

impl TrackTags {
    /// `#EXTINF:<seconds>,<artist> - <title>`
    pub fn extinf(&self) -> String {
        format!("#EXTINF:{},{} - {}", self.seconds, self.artist, self.title)
    }
}
