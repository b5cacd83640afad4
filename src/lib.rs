//! Winamp Tools - playlist maintenance for a Winamp media library
//!
//! Repairs M3U/M3U8 playlists whose tracks moved on disk, combines
//! playlists, and exports size-limited playlist sets together with their
//! media files.

pub mod error;
pub mod export;
pub mod math;
pub mod model;
pub mod prompt;
pub mod rebuild;
pub mod tags;
pub mod winamp;

pub use error::Error;
pub use export::{ExportConfig, ExportPipeline};
pub use model::{Playlist, PlaylistEntry};

/// Name written in generated playlist headers
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
