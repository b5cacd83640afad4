//! Playlist repair
//!
//! Finds the current location of tracks that moved on disk and rewrites
//! the playlists pointing at them.

mod media;
mod resolver;
mod runner;

pub use media::{MediaLibrary, DEFAULT_ESCAPE};
pub use resolver::{DefaultAction, Outcome, PathResolver};
pub use runner::{
    playlist_sources, RebuildOptions, RebuildReport, RebuildStatus, RebuildSummary, Rebuilder,
};
