//! Periodic tag cleanup worker.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, instrument};

use meemo_core::{defaults, NoteStore, Result, TagIndex};

use crate::cleanup::{CleanupReport, TagCollector};

/// Capacity of the worker event channel.
const EVENT_CAPACITY: usize = 16;

/// Configuration for the tag cleanup worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupConfig {
    /// Time between runs. The first run starts immediately.
    pub interval: Duration,
    /// Number of users cleaned up concurrently.
    pub max_concurrent: usize,
    /// Whether the worker runs at all.
    pub enabled: bool,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(defaults::TAG_CLEANUP_INTERVAL_SECS),
            max_concurrent: defaults::TAG_CLEANUP_MAX_CONCURRENT,
            enabled: true,
        }
    }
}

impl CleanupConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `TAG_CLEANUP_ENABLED` | `true` | Enable/disable the worker |
    /// | `TAG_CLEANUP_INTERVAL_SECS` | `3600` | Seconds between runs |
    /// | `TAG_CLEANUP_MAX_CONCURRENT` | `4` | Users cleaned up at once |
    pub fn from_env() -> Self {
        let enabled = std::env::var("TAG_CLEANUP_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let interval_secs = std::env::var("TAG_CLEANUP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(defaults::TAG_CLEANUP_INTERVAL_SECS);

        let max_concurrent = std::env::var("TAG_CLEANUP_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::TAG_CLEANUP_MAX_CONCURRENT)
            .max(1);

        Self {
            interval: Duration::from_secs(interval_secs),
            max_concurrent,
            enabled,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the cleanup worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    WorkerStarted,
    RunCompleted(CleanupReport),
    /// The run could not start, e.g. active users could not be listed.
    RunFailed(String),
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Signal the worker to shut down. A run in progress finishes first.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| meemo_core::Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Runs the tag collector on a fixed interval.
pub struct TagCleanupWorker {
    collector: TagCollector,
    config: CleanupConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl TagCleanupWorker {
    pub fn new(notes: Arc<dyn NoteStore>, tags: Arc<dyn TagIndex>, config: CleanupConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let collector = TagCollector::new(notes, tags).with_max_concurrent(config.max_concurrent);
        Self {
            collector,
            config,
            event_tx,
        }
    }

    /// Run one collection pass now, outside the schedule.
    pub async fn run_once(&self) -> Result<CleanupReport> {
        self.collector.run_once().await
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    #[instrument(skip(self, shutdown_rx), fields(subsystem = "jobs", component = "tag_cleanup"))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Tag cleanup worker is disabled, not starting");
            return;
        }

        info!(
            interval_secs = self.config.interval.as_secs(),
            max_concurrent = self.config.max_concurrent,
            "Tag cleanup worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        // tokio's interval panics on a zero period
        let mut ticker = interval(self.config.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Tag cleanup worker received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    let event = match self.collector.run_once().await {
                        Ok(report) => WorkerEvent::RunCompleted(report),
                        Err(e) => {
                            error!(error = %e, "Tag cleanup run failed");
                            WorkerEvent::RunFailed(e.to_string())
                        }
                    };
                    let _ = self.event_tx.send(event);
                }
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Tag cleanup worker stopped");
    }
}
