//! Link probe configuration.
//!
//! Configuration is read from environment variables, falling back to the
//! defaults in `meemo_core::defaults`:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MEEMO_PROBE_TIMEOUT_SECS` | `20` | Per-probe timeout |
//! | `MEEMO_PROBE_MAX_CONCURRENT` | `8` | Probes in flight at once |
//! | `MEEMO_PROBE_USER_AGENT` | `meemo/<version>` | User agent header |

use std::env;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use meemo_core::defaults;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings for [`crate::HttpLinkClassifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Upper bound on each individual probe. There is no bound on the batch.
    pub timeout: Duration,
    /// Maximum number of probes in flight at once.
    pub max_concurrent: usize,
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(defaults::PROBE_TIMEOUT_SECS),
            max_concurrent: defaults::PROBE_MAX_CONCURRENT,
            user_agent: defaults::PROBE_USER_AGENT.to_string(),
        }
    }
}

impl ProbeConfig {
    /// Load from environment variables.
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Ok(value) = env::var("MEEMO_PROBE_TIMEOUT_SECS") {
            let secs = value.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                name: "MEEMO_PROBE_TIMEOUT_SECS",
                value: value.clone(),
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        if let Ok(value) = env::var("MEEMO_PROBE_MAX_CONCURRENT") {
            config.max_concurrent =
                value.parse::<usize>().map_err(|_| ConfigError::InvalidValue {
                    name: "MEEMO_PROBE_MAX_CONCURRENT",
                    value: value.clone(),
                })?;
        }

        if let Ok(value) = env::var("MEEMO_PROBE_USER_AGENT") {
            config.user_agent = value;
        }

        config.validate()?;
        debug!(
            timeout_secs = config.timeout.as_secs(),
            max_concurrent = config.max_concurrent,
            "Probe config loaded"
        );
        Ok(config)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.timeout.is_zero() {
            return Err(ConfigError::Validation(
                "probe timeout must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrent == 0 {
            return Err(ConfigError::Validation(
                "probe concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<ConfigError> for meemo_core::Error {
    fn from(e: ConfigError) -> Self {
        meemo_core::Error::Config(e.to_string())
    }
}
