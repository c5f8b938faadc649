//! Tag garbage collection.
//!
//! For each active user, deletes every tag record whose name no longer
//! appears in any of the user's notes. Users are processed independently:
//! one user's failure is logged and the rest still run.
//!
//! Not transactional. A tag deleted here while a concurrent note write is
//! re-adding it may be missing until that note is next saved.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, instrument};

use meemo_core::{extract_tags, NoteStore, Result, TagIndex};

/// Outcome of one collection run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Users processed, including failed ones.
    pub users: usize,
    pub failed_users: Vec<String>,
    pub tags_deleted: usize,
}

#[derive(Clone)]
pub struct TagCollector {
    notes: Arc<dyn NoteStore>,
    tags: Arc<dyn TagIndex>,
    max_concurrent: usize,
}

impl TagCollector {
    pub fn new(notes: Arc<dyn NoteStore>, tags: Arc<dyn TagIndex>) -> Self {
        Self {
            notes,
            tags,
            max_concurrent: meemo_core::defaults::TAG_CLEANUP_MAX_CONCURRENT,
        }
    }

    /// Number of users cleaned up at once.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    /// Clean up every active user.
    ///
    /// Fails only when the active users cannot be listed.
    #[instrument(skip(self), fields(subsystem = "jobs", component = "tag_cleanup"))]
    pub async fn run_once(&self) -> Result<CleanupReport> {
        let start = Instant::now();
        let user_ids = self.notes.active_user_ids().await?;

        let outcomes: Vec<(String, Result<usize>)> = stream::iter(user_ids)
            .map(|user_id| async move {
                let outcome = self.cleanup_user(&user_id).await;
                (user_id, outcome)
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut report = CleanupReport {
            users: outcomes.len(),
            ..Default::default()
        };
        for (user_id, outcome) in outcomes {
            match outcome {
                Ok(deleted) => report.tags_deleted += deleted,
                Err(e) => {
                    error!(user_id = %user_id, error = %e, "Cleanup tags failed");
                    report.failed_users.push(user_id);
                }
            }
        }
        report.failed_users.sort();

        info!(
            users = report.users,
            failed = report.failed_users.len(),
            tags_deleted = report.tags_deleted,
            duration_ms = start.elapsed().as_millis() as u64,
            "Tag cleanup complete"
        );
        Ok(report)
    }

    /// Delete the user's unreferenced tag records. Returns how many were
    /// deleted.
    pub async fn cleanup_user(&self, user_id: &str) -> Result<usize> {
        let notes = self.notes.get_all_lean(user_id).await?;
        let active: HashSet<String> = notes
            .iter()
            .flat_map(|note| extract_tags(&note.content))
            .collect();

        let mut deleted = 0;
        for record in self.tags.get(user_id).await? {
            if active.contains(&record.name) {
                continue;
            }
            debug!(user_id, tag = %record.name, "Cleanup tag");
            self.tags.del(user_id, record.id).await?;
            deleted += 1;
        }
        Ok(deleted)
    }
}
