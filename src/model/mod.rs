//! Playlist data model
//!
//! Entries, the playlist store itself, and the file-format helpers used to
//! read and write M3U/M3U8 files.

pub mod format;
mod playlist;
mod stats;
mod track;

pub use format::PlaylistFormat;
pub use playlist::{LoadProgress, Playlist, PlaylistOptions, SaveOptions, SaveReport};
pub use stats::PlaylistStats;
pub use track::{dir_name, file_name, EntryField, EntryId, PlaylistEntry};
