//! Export of budgeted playlists and their media files

pub mod budget;
pub mod config;
pub mod manifest;
pub mod organizer;
pub mod pipeline;

pub use budget::{Admission, Budget, ExportStats};
pub use config::{ByteSize, ExportConfig, PlaylistDef, PlaylistJob};
pub use manifest::{Manifest, ManifestEntry, SyncReport};
pub use organizer::ExportLayout;
pub use pipeline::{ExportPipeline, ExportReport};
