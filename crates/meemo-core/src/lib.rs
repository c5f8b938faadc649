//! # meemo-core
//!
//! Core types, traits, and content extraction for meemo.
//!
//! This crate provides the data model shared by every meemo crate, the
//! interfaces of the external collaborators (note store, tag index,
//! directory, link classifier), the archive envelope format, and the pure
//! URL/hashtag extraction functions.

pub mod archive;
pub mod defaults;
pub mod error;
pub mod extraction;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use archive::{parse_envelope, ArchiveEnvelope, ArchivedThing, ImportedThing, RawTimestamp};
pub use error::{Error, Result};
pub use extraction::{
    dedup_tags, extract_tags, extract_unique_tags, extract_urls, mask_urls, URL_PLACEHOLDER,
};
pub use models::*;
pub use traits::*;
