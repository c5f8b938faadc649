//! Note service.
//!
//! Orchestrates extraction, link classification, tag index upkeep and
//! storage for single-note operations, and renders notes on the way out.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use meemo_core::{
    extract_unique_tags, extract_urls, now_millis, Attachment, DirectoryService, Error,
    ExternalLink, LinkClassifier, NewNote, Note, NoteFilter, NoteStore, NoteUpdate, Profile,
    RenderedNote, Result, TagIndex,
};

use crate::render::Renderer;

pub struct NoteService {
    notes: Arc<dyn NoteStore>,
    tags: Arc<dyn TagIndex>,
    classifier: Arc<dyn LinkClassifier>,
    directory: Option<Arc<dyn DirectoryService>>,
    renderer: Renderer,
}

impl NoteService {
    pub fn new(
        notes: Arc<dyn NoteStore>,
        tags: Arc<dyn TagIndex>,
        classifier: Arc<dyn LinkClassifier>,
    ) -> Self {
        Self {
            notes,
            tags,
            classifier,
            directory: None,
            renderer: Renderer::default(),
        }
    }

    pub fn with_directory(mut self, directory: Arc<dyn DirectoryService>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn with_renderer(mut self, renderer: Renderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Create a note and return it rendered.
    #[instrument(skip(self, content, attachments), fields(subsystem = "notes", op = "add"))]
    pub async fn add(
        &self,
        user_id: &str,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> Result<RenderedNote> {
        let start = Instant::now();
        let links = self.classifier.classify(&extract_urls(content)).await?;
        let tags = extract_unique_tags(content);

        upsert_tags(self.tags.as_ref(), user_id, &tags).await?;

        let note_id = self
            .notes
            .add(
                user_id,
                NewNote {
                    content: content.to_string(),
                    tags,
                    attachments,
                    external_content: links,
                },
            )
            .await?;

        info!(
            user_id,
            note_id = %note_id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Note added"
        );
        self.get(user_id, note_id, user_id).await
    }

    /// Overwrite a note's content, attachments and access list.
    ///
    /// The creation time is kept; the modification time is set to now. A
    /// classifier failure leaves the note without external links rather
    /// than failing the write.
    #[instrument(
        skip(self, note_id, content, attachments, acl),
        fields(subsystem = "notes", op = "update", note_id = %note_id)
    )]
    pub async fn update(
        &self,
        user_id: &str,
        note_id: Uuid,
        content: &str,
        attachments: Vec<Attachment>,
        acl: Vec<String>,
    ) -> Result<RenderedNote> {
        let tags = extract_unique_tags(content);
        upsert_tags(self.tags.as_ref(), user_id, &tags).await?;

        let links = match self.classifier.classify(&extract_urls(content)).await {
            Ok(links) => links,
            Err(e) => {
                error!(user_id, note_id = %note_id, error = %e, "Failed to extract external content");
                Vec::new()
            }
        };

        self.notes
            .put(
                user_id,
                note_id,
                NoteUpdate {
                    content: content.to_string(),
                    tags,
                    attachments,
                    external_content: Some(links),
                    acl: Some(acl),
                    modified_at: Some(now_millis()),
                },
            )
            .await?;

        debug!(user_id, note_id = %note_id, "Note updated");
        self.get(user_id, note_id, user_id).await
    }

    /// Fetch and render a note on behalf of `requesting`, which must be on
    /// the note's access list.
    pub async fn get(&self, user_id: &str, note_id: Uuid, requesting: &str) -> Result<RenderedNote> {
        if requesting.is_empty() {
            return Err(Error::AccessDenied("no requesting identity".to_string()));
        }

        let note = self.notes.get(user_id, note_id).await?;
        if !note.acl.iter().any(|entry| entry == requesting) {
            return Err(Error::AccessDenied(format!(
                "{} may not read note {}",
                requesting, note_id
            )));
        }

        Ok(self.rendered(user_id, note).await)
    }

    /// List a page of notes, newest first, each rendered.
    #[instrument(skip(self, filter), fields(subsystem = "notes", op = "list"))]
    pub async fn list(
        &self,
        user_id: &str,
        filter: &NoteFilter,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<RenderedNote>> {
        let notes = self.notes.get_all(user_id, filter, skip, limit).await?;

        let mut rendered = Vec::with_capacity(notes.len());
        for note in notes {
            rendered.push(self.rendered(user_id, note).await);
        }

        debug!(user_id, result_count = rendered.len(), "Notes listed");
        Ok(rendered)
    }

    pub async fn delete(&self, user_id: &str, note_id: Uuid) -> Result<()> {
        self.notes.del(user_id, note_id).await?;
        info!(user_id, note_id = %note_id, "Note deleted");
        Ok(())
    }

    /// Resolve a user id, email address or username to a profile.
    pub async fn profile_by_identifier(&self, identifier: &str) -> Result<Profile> {
        match self.directory {
            Some(ref directory) => directory.profile_by_identifier(identifier).await,
            None => Err(Error::Config("no directory service configured".to_string())),
        }
    }

    /// Render a note's markup.
    ///
    /// Notes stored before link classification existed are classified
    /// first, and the result is written back once.
    pub async fn facelift(&self, user_id: &str, note: &Note) -> Result<String> {
        let links = match note.external_content {
            Some(ref links) => links.clone(),
            None => self.backfill_links(user_id, note).await,
        };

        self.renderer
            .render(user_id, &note.content, &note.tags, &links, &note.attachments)
    }

    async fn backfill_links(&self, user_id: &str, note: &Note) -> Vec<ExternalLink> {
        let links = match self.classifier.classify(&extract_urls(&note.content)).await {
            Ok(links) => links,
            Err(e) => {
                error!(user_id, note_id = %note.id, error = %e, "Failed to extract external content");
                return Vec::new();
            }
        };

        info!(
            user_id,
            note_id = %note.id,
            result_count = links.len(),
            "Backfilling external content"
        );

        let update = NoteUpdate {
            content: note.content.clone(),
            tags: note.tags.clone(),
            attachments: note.attachments.clone(),
            external_content: Some(links.clone()),
            acl: None,
            modified_at: None,
        };
        if let Err(e) = self.notes.put(user_id, note.id, update).await {
            error!(user_id, note_id = %note.id, error = %e, "Failed to update external content");
        }

        links
    }

    async fn rendered(&self, user_id: &str, note: Note) -> RenderedNote {
        let rich_content = match self.facelift(user_id, &note).await {
            Ok(markup) => markup,
            Err(e) => {
                warn!(user_id, note_id = %note.id, error = %e, "Failed to facelift");
                note.content.clone()
            }
        };
        RenderedNote { note, rich_content }
    }
}

/// Upsert tags one at a time, in order. The first failure aborts.
pub(crate) async fn upsert_tags(tags: &dyn TagIndex, user_id: &str, names: &[String]) -> Result<()> {
    for name in names {
        tags.update(user_id, name).await.map_err(|e| {
            warn!(user_id, tag = %name, error = %e, "Tag upsert failed");
            e
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meemo_db::{MemoryNoteStore, MemoryTagIndex};
    use meemo_probe::mock::MockLinkClassifier;

    fn service() -> (NoteService, Arc<MemoryNoteStore>) {
        let notes = Arc::new(MemoryNoteStore::new());
        let service = NoteService::new(
            notes.clone(),
            Arc::new(MemoryTagIndex::new()),
            Arc::new(MockLinkClassifier::new()),
        );
        (service, notes)
    }

    #[tokio::test]
    async fn test_get_requires_identity() {
        let (service, _) = service();
        let note = service.add("alice", "hello", Vec::new()).await.unwrap();

        let err = service.get("alice", note.note.id, "").await.unwrap_err();
        assert!(matches!(err, Error::AccessDenied(_)));

        let err = service.get("alice", note.note.id, "bob").await.unwrap_err();
        assert!(matches!(err, Error::AccessDenied(_)));
    }

    #[tokio::test]
    async fn test_profile_lookup_without_directory() {
        let (service, _) = service();
        let err = service.profile_by_identifier("alice").await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
