//! Per-user attachment directories on the local filesystem.
//!
//! Attachments live at `{root}/{user_id}/{identifier}`. The identifier is
//! generated when the file is uploaded and is what note content and archive
//! bundles refer to.
//!
//! ## Example
//!
//! ```rust,ignore
//! use meemo_db::AttachmentStore;
//!
//! let store = AttachmentStore::new("/app/data/attachments");
//! let id = store.store("alice", b"...").await?;
//! let data = store.read("alice", &id).await?;
//! ```

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use meemo_core::{Error, Result};

/// Filesystem storage for attachment files.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
}

impl AttachmentStore {
    /// Create a store rooted at `root`. Nothing is created on disk until
    /// the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a user's attachments.
    pub fn user_dir(&self, user_id: &str) -> Result<PathBuf> {
        validate_segment(user_id, "user id")?;
        Ok(self.root.join(user_id))
    }

    /// Create the user's directory if needed and return it.
    pub async fn ensure_user_dir(&self, user_id: &str) -> Result<PathBuf> {
        let dir = self.user_dir(user_id)?;
        fs::create_dir_all(&dir).await.map_err(|e| {
            warn!(dir = %dir.display(), error = %e, "file_storage: create_dir_all failed");
            e
        })?;
        Ok(dir)
    }

    fn file_path(&self, user_id: &str, identifier: &str) -> Result<PathBuf> {
        validate_segment(identifier, "attachment identifier")?;
        Ok(self.user_dir(user_id)?.join(identifier))
    }

    /// Store new attachment data under a generated identifier.
    pub async fn store(&self, user_id: &str, data: &[u8]) -> Result<String> {
        let identifier = Uuid::new_v4().simple().to_string();
        self.write(user_id, &identifier, data).await?;
        Ok(identifier)
    }

    /// Write attachment data atomically (temp file + rename).
    pub async fn write(&self, user_id: &str, identifier: &str, data: &[u8]) -> Result<()> {
        let full_path = self.file_path(user_id, identifier)?;
        debug!(user_id, identifier, size = data.len(), "file_storage: write");

        self.ensure_user_dir(user_id).await?;

        let temp_path = full_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            warn!(temp_path = %temp_path.display(), error = %e, "file_storage: File::create failed");
            e
        })?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &full_path).await.map_err(|e| {
            warn!(from = %temp_path.display(), to = %full_path.display(), error = %e, "file_storage: rename failed");
            e
        })?;

        Ok(())
    }

    /// Move an existing file into the user's directory under `identifier`,
    /// replacing any file already there.
    pub async fn adopt(&self, user_id: &str, source: &Path, identifier: &str) -> Result<()> {
        let target = self.file_path(user_id, identifier)?;
        self.ensure_user_dir(user_id).await?;

        if fs::rename(source, &target).await.is_err() {
            // Different filesystem: copy, then drop the source.
            fs::copy(source, &target).await?;
            if let Err(e) = fs::remove_file(source).await {
                debug!(source = %source.display(), error = %e, "file_storage: source cleanup failed");
            }
        }
        Ok(())
    }

    pub async fn read(&self, user_id: &str, identifier: &str) -> Result<Vec<u8>> {
        let full_path = self.file_path(user_id, identifier)?;
        match fs::read(&full_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound(format!(
                "attachment {}/{}",
                user_id, identifier
            ))),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, user_id: &str, identifier: &str) -> Result<()> {
        let full_path = self.file_path(user_id, identifier)?;
        if fs::try_exists(&full_path).await? {
            fs::remove_file(full_path).await?;
        }
        Ok(())
    }

    pub async fn exists(&self, user_id: &str, identifier: &str) -> Result<bool> {
        let full_path = self.file_path(user_id, identifier)?;
        Ok(fs::try_exists(full_path).await?)
    }

    /// Identifiers of all attachments stored for a user, sorted.
    pub async fn list(&self, user_id: &str) -> Result<Vec<String>> {
        let dir = self.user_dir(user_id)?;
        if !fs::try_exists(&dir).await? {
            return Ok(Vec::new());
        }

        let mut identifiers = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    identifiers.push(name.to_string());
                }
            }
        }
        identifiers.sort();
        Ok(identifiers)
    }
}

/// Reject anything that is not a single plain path component.
pub fn validate_segment(segment: &str, what: &str) -> Result<()> {
    let mut components = Path::new(segment).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !segment.contains(['/', '\\']) => Ok(()),
        _ => Err(Error::Validation(format!("invalid {}: '{}'", what, segment))),
    }
}
