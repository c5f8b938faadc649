//! Collaborator traits for meemo.
//!
//! The note store, tag index, directory and link classifier are external
//! capabilities the core calls into. These traits define their interfaces
//! so that concrete backends stay pluggable and testable.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// NOTE STORAGE
// =============================================================================

/// Persistent storage of notes, keyed by user id and note id.
///
/// The store owns all note state; callers hold no cached copies across calls.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// List a user's notes matching `filter`, newest modification first.
    async fn get_all(
        &self,
        user_id: &str,
        filter: &NoteFilter,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Note>>;

    /// All of a user's notes, unfiltered and unpaged.
    async fn get_all_lean(&self, user_id: &str) -> Result<Vec<Note>>;

    /// Fetch one note.
    async fn get(&self, user_id: &str, note_id: Uuid) -> Result<Note>;

    /// Insert a note stamped with the current time. The owner is put on
    /// the access list.
    async fn add(&self, user_id: &str, note: NewNote) -> Result<Uuid>;

    /// Insert a note with explicit timestamps (epoch milliseconds).
    async fn add_full(
        &self,
        user_id: &str,
        note: NewNote,
        created_at: i64,
        modified_at: i64,
    ) -> Result<Uuid>;

    /// Overwrite a stored note's fields.
    async fn put(&self, user_id: &str, note_id: Uuid, update: NoteUpdate) -> Result<()>;

    /// Delete a note.
    async fn del(&self, user_id: &str, note_id: Uuid) -> Result<()>;

    /// Ids of every user that owns at least one note.
    async fn active_user_ids(&self) -> Result<Vec<String>>;
}

// =============================================================================
// TAG INDEX
// =============================================================================

/// Per-user registry of distinct tag names in use.
#[async_trait]
pub trait TagIndex: Send + Sync {
    /// Create the tag or refresh its usage metadata.
    async fn update(&self, user_id: &str, name: &str) -> Result<()>;

    /// All tag records for a user.
    async fn get(&self, user_id: &str) -> Result<Vec<TagRecord>>;

    /// Delete one tag record.
    async fn del(&self, user_id: &str, tag_id: Uuid) -> Result<()>;
}

// =============================================================================
// DIRECTORY
// =============================================================================

/// User directory lookup.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Resolve a user id, email or username to a canonical profile.
    ///
    /// No match is `NotFound`; several matches are `Upstream`.
    async fn profile_by_identifier(&self, identifier: &str) -> Result<Profile>;
}

// =============================================================================
// LINK CLASSIFICATION
// =============================================================================

/// Best-effort classification of external URLs.
#[async_trait]
pub trait LinkClassifier: Send + Sync {
    /// Classify every URL.
    ///
    /// Individual probe failures classify that URL as
    /// [`ContentKind::Unknown`]; the output always holds exactly one entry
    /// per input URL, in no particular order. An `Err` means the classifier
    /// itself could not run.
    async fn classify(&self, urls: &[String]) -> Result<Vec<ExternalLink>>;
}

// =============================================================================
// LEGACY DATA
// =============================================================================

/// Read access to the single-user data layout that predates per-user
/// storage.
#[async_trait]
pub trait LegacyStore: Send + Sync {
    /// All legacy notes.
    async fn get_all(&self) -> Result<Vec<Note>>;

    /// Drop the legacy note, public link and tag collections.
    async fn drop_all(&self) -> Result<()>;
}
