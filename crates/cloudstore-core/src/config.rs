//! Backend configuration.
//!
//! Values come from code (builder methods) or from `CLOUDSTORE_*`
//! environment variables via [`CloudStoreConfig::from_env`].

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Zone used when none is configured.
pub const DEFAULT_ZONE: &str = "_defaultZone";

/// Default staging write size (256 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Default minimum spacing between intermediate progress snapshots.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Environment variable naming the zone.
pub const ENV_ZONE: &str = "CLOUDSTORE_ZONE";
/// Environment variable naming the staging directory.
pub const ENV_STAGING_DIR: &str = "CLOUDSTORE_STAGING_DIR";
/// Environment variable holding the chunk size in bytes.
pub const ENV_CHUNK_SIZE: &str = "CLOUDSTORE_CHUNK_SIZE";
/// Environment variable holding the progress interval in milliseconds.
pub const ENV_PROGRESS_INTERVAL_MS: &str = "CLOUDSTORE_PROGRESS_INTERVAL_MS";

/// Errors from reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable held a value that could not be parsed.
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Rejected value.
        value: String,
    },

    /// The zone name is empty.
    #[error("Zone name must not be empty")]
    EmptyZone,
}

/// Configuration for a cloud store backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudStoreConfig {
    /// Zone files are written into and read from.
    pub zone: String,
    /// Directory downloads are staged in before relocation.
    pub staging_directory: PathBuf,
    /// Bytes buffered before each write to a staging file.
    pub chunk_size: usize,
    /// Minimum spacing between intermediate progress snapshots.
    pub progress_interval: Duration,
}

impl Default for CloudStoreConfig {
    fn default() -> Self {
        Self {
            zone: DEFAULT_ZONE.to_string(),
            staging_directory: std::env::temp_dir().join("cloudstore-staging"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl CloudStoreConfig {
    /// Create a config for the given zone.
    pub fn new(zone: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            ..Default::default()
        }
    }

    /// Set the staging directory.
    #[must_use]
    pub fn with_staging_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_directory = dir.into();
        self
    }

    /// Set the chunk size. Zero is raised to one byte.
    #[must_use]
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Set the progress interval.
    #[must_use]
    pub const fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(zone) = lookup(ENV_ZONE) {
            if zone.trim().is_empty() {
                return Err(ConfigError::EmptyZone);
            }
            config.zone = zone;
        }

        if let Some(dir) = lookup(ENV_STAGING_DIR).filter(|d| !d.is_empty()) {
            config.staging_directory = PathBuf::from(dir);
        }

        if let Some(raw) = lookup(ENV_CHUNK_SIZE) {
            let size = parse_number(ENV_CHUNK_SIZE, &raw)?;
            if size == 0 {
                return Err(invalid(ENV_CHUNK_SIZE, &raw));
            }
            config.chunk_size = usize::try_from(size).map_err(|_| invalid(ENV_CHUNK_SIZE, &raw))?;
        }

        if let Some(raw) = lookup(ENV_PROGRESS_INTERVAL_MS) {
            let millis = parse_number(ENV_PROGRESS_INTERVAL_MS, &raw)?;
            config.progress_interval = Duration::from_millis(millis);
        }

        tracing::debug!(
            zone = %config.zone,
            staging = %config.staging_directory.display(),
            chunk_size = config.chunk_size,
            "Loaded cloud store configuration"
        );
        Ok(config)
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| invalid(key, raw))
}

fn invalid(key: &str, raw: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    }
}
