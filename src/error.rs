//! Domain errors
//!
//! Library functions return `anyhow::Result`; the variants below are raised
//! into it whenever a caller needs to tell one failure from another.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Playlist file extension is not one of the supported types
    #[error("File type \"{ext}\" of {path:?} not in supported extensions: {supported}")]
    UnsupportedPlaylistType {
        path: PathBuf,
        ext: String,
        supported: String,
    },

    #[error("Unsupported output format \"{0}\"")]
    UnsupportedOutputFormat(String),

    #[error("Unknown code page \"{0}\"")]
    UnknownCodePage(String),

    #[error("Media folder not found: {0:?}")]
    MissingMediaFolder(PathBuf),

    #[error("Escape folder \"{name}\" not found in {media:?}")]
    MissingEscapeFolder { name: String, media: PathBuf },

    #[error("{what} dir not found: {path:?}")]
    MissingDirectory { what: String, path: PathBuf },

    /// Memory-only playlist asked to touch the filesystem
    #[error("Playlist is not bound to a file")]
    PlaylistWithoutFile,

    /// A resolution strategy produced something that is not a regular file
    #[error("Computed path {path:?} is invalid for playlist entry \"{entry}\"")]
    InvalidResolvedPath { path: PathBuf, entry: String },

    #[error("Unable to locate playlist file: {0:?}")]
    MissingPlaylistFile(PathBuf),

    #[error("Unable to locate playlist name: [{}]", .0.join("], ["))]
    UnknownPlaylistTitles(Vec<String>),

    #[error("Missing track \"{entry}\" in playlist [{playlist}]. Rebuild the playlist first!")]
    MissingTrack { playlist: String, entry: String },

    /// The two independently kept export counters disagree
    #[error(
        "Data integrity check failed! unique set: {set_items} items / {set_bytes} bytes, \
         counters: {counted_items} items / {counted_bytes} bytes"
    )]
    IntegrityCheckFailed {
        set_items: usize,
        set_bytes: u64,
        counted_items: usize,
        counted_bytes: u64,
    },

    #[error("Missing manifest source file: {0:?}")]
    MissingManifestSource(PathBuf),

    #[error("Invalid size \"{0}\". Use integer or size string: 100M, 3.4G, etc...")]
    InvalidByteSize(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_titles_message_lists_all() {
        let err = Error::UnknownPlaylistTitles(vec!["Pl 01".into(), "Pl 02".into()]);
        assert_eq!(
            err.to_string(),
            "Unable to locate playlist name: [Pl 01], [Pl 02]"
        );
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = Error::PlaylistWithoutFile.into();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::PlaylistWithoutFile)
        ));
    }
}
