//! # meemo-db
//!
//! In-process storage collaborators for meemo.
//!
//! This crate provides:
//! - In-memory implementations of the note store, tag index, directory and
//!   legacy store traits from meemo-core
//! - Per-user attachment directories on the local filesystem
//!
//! ## Example
//!
//! ```rust,ignore
//! use meemo_db::{MemoryNoteStore, MemoryTagIndex};
//! use meemo_core::{NewNote, NoteStore};
//!
//! let notes = MemoryNoteStore::new();
//! let id = notes.add("alice", NewNote { content: "#hello".into(), ..Default::default() }).await?;
//! ```

pub mod file_storage;
pub mod memory;

pub use file_storage::{validate_segment, AttachmentStore};
pub use memory::{MemoryLegacyStore, MemoryNoteStore, MemoryTagIndex, StaticDirectory};

// Re-export core types
pub use meemo_core::*;
