//! Service configuration.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MEEMO_ATTACHMENT_DIR` | `/app/data/files` | Root of per-user attachment directories |
//! | `MEEMO_SCRATCH_DIR` | system temp dir | Where import workspaces are created |
//! | `MEEMO_FILES_URL_PREFIX` | `/api/files` | Prefix of rendered attachment links |
//! | `MEEMO_LEGACY_ATTACHMENT_DIR` | `/app/data/attachments` | Attachments of the legacy single-user layout |
//! | `MEEMO_LEGACY_BUNDLE_PATH` | `/tmp/old_data_export.tar` | Where the legacy export bundle is written |

use std::path::PathBuf;

use meemo_core::defaults;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub attachment_dir: PathBuf,
    /// `None` uses the system temp directory.
    pub scratch_dir: Option<PathBuf>,
    pub files_url_prefix: String,
    pub legacy_attachment_dir: PathBuf,
    pub legacy_bundle_path: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            attachment_dir: PathBuf::from(defaults::ATTACHMENT_DIR),
            scratch_dir: None,
            files_url_prefix: defaults::FILES_URL_PREFIX.to_string(),
            legacy_attachment_dir: PathBuf::from(defaults::LEGACY_ATTACHMENT_DIR),
            legacy_bundle_path: PathBuf::from(defaults::LEGACY_BUNDLE_PATH),
        }
    }
}

impl ServiceConfig {
    /// Create config from environment variables (with defaults).
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(dir) = non_empty_var("MEEMO_ATTACHMENT_DIR") {
            config.attachment_dir = PathBuf::from(dir);
        }
        config.scratch_dir = non_empty_var("MEEMO_SCRATCH_DIR").map(PathBuf::from);
        if let Some(prefix) = non_empty_var("MEEMO_FILES_URL_PREFIX") {
            config.files_url_prefix = prefix.trim_end_matches('/').to_string();
        }
        if let Some(dir) = non_empty_var("MEEMO_LEGACY_ATTACHMENT_DIR") {
            config.legacy_attachment_dir = PathBuf::from(dir);
        }
        if let Some(path) = non_empty_var("MEEMO_LEGACY_BUNDLE_PATH") {
            config.legacy_bundle_path = PathBuf::from(path);
        }

        config
    }

    pub fn with_attachment_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.attachment_dir = dir.into();
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn with_files_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.files_url_prefix = prefix.into();
        self
    }

    pub fn with_legacy_paths(
        mut self,
        attachment_dir: impl Into<PathBuf>,
        bundle_path: impl Into<PathBuf>,
    ) -> Self {
        self.legacy_attachment_dir = attachment_dir.into();
        self.legacy_bundle_path = bundle_path.into();
        self
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.attachment_dir, PathBuf::from("/app/data/files"));
        assert_eq!(config.files_url_prefix, "/api/files");
        assert!(config.scratch_dir.is_none());
        assert_eq!(
            config.legacy_bundle_path,
            PathBuf::from("/tmp/old_data_export.tar")
        );
    }

    #[test]
    fn test_builder() {
        let config = ServiceConfig::default()
            .with_attachment_dir("/srv/files")
            .with_scratch_dir("/srv/tmp")
            .with_files_url_prefix("/files")
            .with_legacy_paths("/old", "/old.tar");

        assert_eq!(config.attachment_dir, PathBuf::from("/srv/files"));
        assert_eq!(config.scratch_dir, Some(PathBuf::from("/srv/tmp")));
        assert_eq!(config.files_url_prefix, "/files");
        assert_eq!(config.legacy_attachment_dir, PathBuf::from("/old"));
        assert_eq!(config.legacy_bundle_path, PathBuf::from("/old.tar"));
    }
}
