//! Migration of data left behind by the single-user layout.
//!
//! Migration status is computed on every call from the legacy store and
//! the bundle path. Nothing is cached between calls.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use meemo_core::{ArchiveEnvelope, Error, LegacyStore, Result};

use crate::archive::pack_bundle;
use crate::config::ServiceConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum MigrationStatus {
    /// No legacy notes remain.
    NotNeeded,
    /// Legacy notes exist but have not been exported yet.
    LegacyDataPresent { notes: usize },
    /// Legacy notes exist and a bundle is ready for import.
    ExportReady { bundle: PathBuf },
}

pub struct LegacyMigration {
    store: Arc<dyn LegacyStore>,
    attachment_dir: PathBuf,
    bundle_path: PathBuf,
}

impl LegacyMigration {
    pub fn new(
        store: Arc<dyn LegacyStore>,
        attachment_dir: impl Into<PathBuf>,
        bundle_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            attachment_dir: attachment_dir.into(),
            bundle_path: bundle_path.into(),
        }
    }

    pub fn from_config(store: Arc<dyn LegacyStore>, config: &ServiceConfig) -> Self {
        Self::new(
            store,
            config.legacy_attachment_dir.clone(),
            config.legacy_bundle_path.clone(),
        )
    }

    pub async fn status(&self) -> Result<MigrationStatus> {
        let notes = self.store.get_all().await?.len();
        if notes == 0 {
            return Ok(MigrationStatus::NotNeeded);
        }

        if tokio::fs::try_exists(&self.bundle_path).await? {
            Ok(MigrationStatus::ExportReady {
                bundle: self.bundle_path.clone(),
            })
        } else {
            Ok(MigrationStatus::LegacyDataPresent { notes })
        }
    }

    /// Pack all legacy notes and the legacy attachment directory into a
    /// bundle in the standard archive format.
    pub async fn export(&self) -> Result<MigrationStatus> {
        let notes = self.store.get_all().await?;
        if notes.is_empty() {
            return Ok(MigrationStatus::NotNeeded);
        }

        info!(notes = notes.len(), "Old data found, preparing export");

        tokio::fs::create_dir_all(&self.attachment_dir).await?;
        let envelope = serde_json::to_vec_pretty(&ArchiveEnvelope::from_notes(&notes))?;
        let attachment_dir = self.attachment_dir.clone();
        let bundle_path = self.bundle_path.clone();

        let attachments = tokio::task::spawn_blocking(move || {
            pack_bundle(&bundle_path, &envelope, Some(&attachment_dir), true)
        })
        .await
        .map_err(|e| Error::Internal(format!("legacy export task failed: {}", e)))??;

        info!(
            bundle = %self.bundle_path.display(),
            notes = notes.len(),
            attachments,
            "Old data available"
        );
        Ok(MigrationStatus::ExportReady {
            bundle: self.bundle_path.clone(),
        })
    }

    /// Remove the legacy attachment directory, the legacy collections and
    /// the export bundle. Each step runs even if an earlier one failed.
    pub async fn cleanup(&self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.attachment_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                error!(dir = %self.attachment_dir.display(), error = %e, "Failed to remove legacy attachments");
            }
        }

        if let Err(e) = self.store.drop_all().await {
            error!(error = %e, "Failed to drop legacy collections");
        }

        if let Err(e) = tokio::fs::remove_file(&self.bundle_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(bundle = %self.bundle_path.display(), error = %e, "Failed to remove legacy bundle");
            }
        }

        info!("Legacy data cleaned up");
    }
}
