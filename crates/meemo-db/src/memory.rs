//! In-memory collaborators.
//!
//! These implement the meemo-core collaborator traits on top of process
//! memory. They back embedded deployments and every service-level test.
//! Each store can be told to fail for a given key so that callers' error
//! paths can be exercised.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use meemo_core::{
    now_millis, DirectoryService, Error, LegacyStore, NewNote, Note, NoteFilter, NoteStore,
    NoteUpdate, Profile, Result, TagIndex, TagRecord,
};

// =============================================================================
// NOTES
// =============================================================================

/// In-memory [`NoteStore`].
#[derive(Default)]
pub struct MemoryNoteStore {
    notes: RwLock<BTreeMap<String, HashMap<Uuid, Note>>>,
    failing_users: RwLock<HashSet<String>>,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every read of `user_id`'s notes fail with `Upstream`.
    pub async fn fail_user(&self, user_id: &str) {
        self.failing_users.write().await.insert(user_id.to_string());
    }

    /// Insert a fully formed note as-is, e.g. one written before link
    /// classification existed.
    pub async fn insert_raw(&self, note: Note) {
        self.notes
            .write()
            .await
            .entry(note.user_id.clone())
            .or_default()
            .insert(note.id, note);
    }

    /// Number of notes stored for a user.
    pub async fn count(&self, user_id: &str) -> usize {
        self.notes
            .read()
            .await
            .get(user_id)
            .map(|notes| notes.len())
            .unwrap_or(0)
    }

    async fn check_user(&self, user_id: &str) -> Result<()> {
        if self.failing_users.read().await.contains(user_id) {
            return Err(Error::Upstream(format!(
                "note store unavailable for user {}",
                user_id
            )));
        }
        Ok(())
    }

    async fn insert(&self, user_id: &str, note: NewNote, created_at: i64, modified_at: i64) -> Uuid {
        let id = Uuid::now_v7();
        let stored = Note {
            id,
            user_id: user_id.to_string(),
            content: note.content,
            created_at,
            modified_at,
            tags: note.tags,
            external_content: Some(note.external_content),
            attachments: note.attachments,
            acl: vec![user_id.to_string()],
        };
        self.insert_raw(stored).await;
        debug!(user_id, note_id = %id, "memory store: note inserted");
        id
    }
}

#[async_trait]
impl NoteStore for MemoryNoteStore {
    async fn get_all(
        &self,
        user_id: &str,
        filter: &NoteFilter,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Note>> {
        self.check_user(user_id).await?;
        let notes = self.notes.read().await;
        let mut matching: Vec<Note> = notes
            .get(user_id)
            .map(|notes| notes.values().filter(|n| filter.matches(n)).cloned().collect())
            .unwrap_or_default();
        matching.sort_by(|a, b| b.modified_at.cmp(&a.modified_at).then(b.id.cmp(&a.id)));
        Ok(matching.into_iter().skip(skip).take(limit).collect())
    }

    async fn get_all_lean(&self, user_id: &str) -> Result<Vec<Note>> {
        self.check_user(user_id).await?;
        let notes = self.notes.read().await;
        let mut all: Vec<Note> = notes
            .get(user_id)
            .map(|notes| notes.values().cloned().collect())
            .unwrap_or_default();
        all.sort_by_key(|n| (n.created_at, n.id));
        Ok(all)
    }

    async fn get(&self, user_id: &str, note_id: Uuid) -> Result<Note> {
        self.check_user(user_id).await?;
        self.notes
            .read()
            .await
            .get(user_id)
            .and_then(|notes| notes.get(&note_id))
            .cloned()
            .ok_or(Error::NoteNotFound(note_id))
    }

    async fn add(&self, user_id: &str, note: NewNote) -> Result<Uuid> {
        self.check_user(user_id).await?;
        let now = now_millis();
        Ok(self.insert(user_id, note, now, now).await)
    }

    async fn add_full(
        &self,
        user_id: &str,
        note: NewNote,
        created_at: i64,
        modified_at: i64,
    ) -> Result<Uuid> {
        self.check_user(user_id).await?;
        Ok(self.insert(user_id, note, created_at, modified_at).await)
    }

    async fn put(&self, user_id: &str, note_id: Uuid, update: NoteUpdate) -> Result<()> {
        self.check_user(user_id).await?;
        let mut notes = self.notes.write().await;
        let note = notes
            .get_mut(user_id)
            .and_then(|notes| notes.get_mut(&note_id))
            .ok_or(Error::NoteNotFound(note_id))?;

        note.content = update.content;
        note.tags = update.tags;
        note.attachments = update.attachments;
        note.external_content = update.external_content;
        if let Some(acl) = update.acl {
            note.acl = acl;
        }
        if let Some(modified_at) = update.modified_at {
            note.modified_at = modified_at;
        }
        Ok(())
    }

    async fn del(&self, user_id: &str, note_id: Uuid) -> Result<()> {
        self.check_user(user_id).await?;
        self.notes
            .write()
            .await
            .get_mut(user_id)
            .and_then(|notes| notes.remove(&note_id))
            .map(|_| ())
            .ok_or(Error::NoteNotFound(note_id))
    }

    async fn active_user_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .notes
            .read()
            .await
            .iter()
            .filter(|(_, notes)| !notes.is_empty())
            .map(|(user_id, _)| user_id.clone())
            .collect())
    }
}

// =============================================================================
// TAGS
// =============================================================================

/// In-memory [`TagIndex`].
#[derive(Default)]
pub struct MemoryTagIndex {
    tags: RwLock<HashMap<String, Vec<TagRecord>>>,
    failing_tags: RwLock<HashSet<String>>,
    updates: RwLock<Vec<(String, String)>>,
}

impl MemoryTagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make upserts of `name` fail with `Upstream`.
    pub async fn fail_on(&self, name: &str) {
        self.failing_tags.write().await.insert(name.to_string());
    }

    /// Tag names held for a user, sorted.
    pub async fn names(&self, user_id: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .tags
            .read()
            .await
            .get(user_id)
            .map(|records| records.iter().map(|r| r.name.clone()).collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Every `(user_id, tag)` upsert in call order.
    pub async fn update_log(&self) -> Vec<(String, String)> {
        self.updates.read().await.clone()
    }
}

#[async_trait]
impl TagIndex for MemoryTagIndex {
    async fn update(&self, user_id: &str, name: &str) -> Result<()> {
        if self.failing_tags.read().await.contains(name) {
            return Err(Error::Upstream(format!("tag index rejected '{}'", name)));
        }

        self.updates
            .write()
            .await
            .push((user_id.to_string(), name.to_string()));

        let now = now_millis();
        let mut tags = self.tags.write().await;
        let records = tags.entry(user_id.to_string()).or_default();
        match records.iter_mut().find(|r| r.name == name) {
            Some(record) => {
                record.usage += 1;
                record.last_used_at = now;
            }
            None => records.push(TagRecord {
                id: Uuid::now_v7(),
                name: name.to_string(),
                usage: 1,
                last_used_at: now,
            }),
        }
        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Vec<TagRecord>> {
        Ok(self
            .tags
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn del(&self, user_id: &str, tag_id: Uuid) -> Result<()> {
        let mut tags = self.tags.write().await;
        let records = tags
            .get_mut(user_id)
            .ok_or_else(|| Error::NotFound(format!("tag {}", tag_id)))?;
        let before = records.len();
        records.retain(|r| r.id != tag_id);
        if records.len() == before {
            return Err(Error::NotFound(format!("tag {}", tag_id)));
        }
        Ok(())
    }
}

// =============================================================================
// DIRECTORY
// =============================================================================

/// [`DirectoryService`] over a fixed list of profiles.
#[derive(Debug, Default, Clone)]
pub struct StaticDirectory {
    profiles: Vec<Profile>,
}

impl StaticDirectory {
    pub fn new(profiles: Vec<Profile>) -> Self {
        Self { profiles }
    }
}

#[async_trait]
impl DirectoryService for StaticDirectory {
    async fn profile_by_identifier(&self, identifier: &str) -> Result<Profile> {
        let mut matches = self.profiles.iter().filter(|p| {
            p.id == identifier || p.email == identifier || p.username == identifier
        });

        match (matches.next(), matches.next()) {
            (Some(profile), None) => Ok(profile.clone()),
            (None, _) => Err(Error::NotFound(format!("user '{}'", identifier))),
            (Some(_), Some(_)) => Err(Error::Upstream(format!(
                "duplicate directory entries for '{}'",
                identifier
            ))),
        }
    }
}

// =============================================================================
// LEGACY DATA
// =============================================================================

/// In-memory [`LegacyStore`].
#[derive(Default)]
pub struct MemoryLegacyStore {
    notes: RwLock<Vec<Note>>,
}

impl MemoryLegacyStore {
    pub fn new(notes: Vec<Note>) -> Self {
        Self {
            notes: RwLock::new(notes),
        }
    }
}

#[async_trait]
impl LegacyStore for MemoryLegacyStore {
    async fn get_all(&self) -> Result<Vec<Note>> {
        Ok(self.notes.read().await.clone())
    }

    async fn drop_all(&self) -> Result<()> {
        self.notes.write().await.clear();
        Ok(())
    }
}
