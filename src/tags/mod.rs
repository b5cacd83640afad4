//! Tag collaborator used to write `#EXTINF` lines
//!
//! The playlist store only sees the `Tagger` trait; the lofty backed
//! reader is the production implementation.

mod reader;
mod traits;

pub use reader::LoftyTagger;
pub use traits::{Tagger, TrackTags};
