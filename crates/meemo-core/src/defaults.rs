//! Centralized default constants for meemo.
//!
//! All crates reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// LINK PROBING
// =============================================================================

/// Per-probe timeout for link classification, in seconds.
pub const PROBE_TIMEOUT_SECS: u64 = 20;

/// Maximum number of link probes in flight at once.
pub const PROBE_MAX_CONCURRENT: usize = 8;

/// User agent sent with link probes.
pub const PROBE_USER_AGENT: &str = concat!("meemo/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// RENDERING
// =============================================================================

/// Visible label length for non-image links before truncation.
pub const PRETTY_URL_LENGTH: usize = 40;

/// Suffix appended to truncated link labels.
pub const PRETTY_URL_ELLIPSIS: &str = "...";

/// Path prefix for attachment retrieval (`{prefix}/{user_id}/{identifier}`).
pub const FILES_URL_PREFIX: &str = "/api/files";

// =============================================================================
// ARCHIVE
// =============================================================================

/// Name of the JSON envelope entry inside a bundle.
pub const ENVELOPE_FILE_NAME: &str = "things.json";

/// Path prefix for attachment entries inside a bundle.
pub const ATTACHMENT_PREFIX: &str = "attachments/";

/// Default root of per-user attachment directories.
pub const ATTACHMENT_DIR: &str = "/app/data/files";

/// Default location of the legacy (pre-multi-user) attachment directory.
pub const LEGACY_ATTACHMENT_DIR: &str = "/app/data/attachments";

/// Default location of the legacy data export bundle.
pub const LEGACY_BUNDLE_PATH: &str = "/tmp/old_data_export.tar";

// =============================================================================
// TAG CLEANUP
// =============================================================================

/// Interval between tag cleanup runs, in seconds.
pub const TAG_CLEANUP_INTERVAL_SECS: u64 = 3600;

/// Number of users cleaned up concurrently.
pub const TAG_CLEANUP_MAX_CONCURRENT: usize = 4;
