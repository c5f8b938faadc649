//! # meemo-jobs
//!
//! Background tag cleanup for meemo.
//!
//! This crate provides:
//! - [`TagCollector`], which deletes tag records no note refers to anymore
//! - [`TagCleanupWorker`], which runs the collector on a fixed interval
//!
//! ## Example
//!
//! ```ignore
//! use meemo_jobs::{CleanupConfig, TagCleanupWorker};
//!
//! let worker = TagCleanupWorker::new(notes, tags, CleanupConfig::from_env());
//! let handle = worker.start();
//!
//! let mut events = handle.events();
//! while let Ok(event) = events.recv().await {
//!     println!("Event: {:?}", event);
//! }
//!
//! handle.shutdown().await?;
//! ```

pub mod cleanup;
pub mod worker;

pub use cleanup::{CleanupReport, TagCollector};
pub use worker::{CleanupConfig, TagCleanupWorker, WorkerEvent, WorkerHandle};
