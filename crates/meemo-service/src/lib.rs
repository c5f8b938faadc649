//! # meemo-service
//!
//! Note enrichment, rendering and archive exchange for meemo.
//!
//! This crate provides:
//! - [`NoteService`]: add, update, get, list and delete notes, keeping the
//!   tag index in sync and rendering display markup on read
//! - [`Renderer`]: the markup rewrite for tags, links and attachments
//! - [`ArchiveExchange`]: bulk export and import of a user's notes as a tar
//!   bundle, plus [`inspect_bundle`]
//! - [`LegacyMigration`]: export and cleanup of single-user legacy data
//! - [`ServiceConfig`] and tracing setup for binaries

pub mod archive;
pub mod config;
pub mod logging;
pub mod migration;
pub mod notes;
pub mod render;

pub use archive::{inspect_bundle, ArchiveExchange, BundleReport, ExportSummary, ImportSummary};
pub use config::ServiceConfig;
pub use migration::{LegacyMigration, MigrationStatus};
pub use notes::NoteService;
pub use render::{pretty_label, Renderer};
