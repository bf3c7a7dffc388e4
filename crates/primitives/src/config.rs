//! Collection configuration via `collections.toml`
//!
//! One knob today: how many CAS-guarded attempts a single-shot operation
//! gets before it reports a conflict storm. Load it once and hand the
//! resulting [`RetryPolicy`] to each collection with `with_retry_policy`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use strata_core::{Error, Result};

use crate::protocol::{RetryPolicy, MAX_OPTIMISTIC_LOCKING_ATTEMPTS};

/// Default config file name
pub const CONFIG_FILE_NAME: &str = "collections.toml";

/// Collection configuration loaded from `collections.toml`
///
/// # Example
///
/// ```toml
/// # Maximum CAS-guarded attempts for a single-shot mutation
/// cas_retry_limit = 10
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionsConfig {
    /// Attempts per optimistic operation, including the first
    #[serde(default = "default_cas_retry_limit")]
    pub cas_retry_limit: usize,
}

fn default_cas_retry_limit() -> usize {
    MAX_OPTIMISTIC_LOCKING_ATTEMPTS
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            cas_retry_limit: default_cas_retry_limit(),
        }
    }
}

impl CollectionsConfig {
    /// Check that every value is in range
    ///
    /// # Errors
    ///
    /// Returns an error if `cas_retry_limit` is 0.
    pub fn validate(&self) -> Result<()> {
        if self.cas_retry_limit == 0 {
            return Err(Error::InvalidConfig(
                "cas_retry_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Retry policy described by this config
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new().with_max_attempts(self.cas_retry_limit)
    }

    /// Returns the default config file content with comments
    pub fn default_toml() -> &'static str {
        r#"# Strata collections configuration
#
# Maximum CAS-guarded attempts for a single-shot mutation (set, remove,
# set add, queue poll, map insert) before a conflict storm is reported.
# Retries are immediate. Must be at least 1.
cas_retry_limit = 10
"#
    }

    /// Parse and validate config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: CollectionsConfig = toml::from_str(content)
            .map_err(|e| Error::InvalidConfig(format!("malformed collections config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| io_failure("read", path, e))?;
        Self::from_toml_str(&content)
    }

    /// Write the default config file if it does not already exist
    ///
    /// An existing file is never touched, whatever it holds.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if path.exists() {
            return Ok(());
        }
        fs::write(path, Self::default_toml()).map_err(|e| io_failure("create", path, e))
    }

    /// Serialize this config to TOML and write it to the given path
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::InvalidConfig(format!("cannot encode config: {}", e)))?;
        fs::write(path, content).map_err(|e| io_failure("write", path, e))
    }
}

fn io_failure(action: &str, path: &Path, err: io::Error) -> Error {
    Error::InvalidConfig(format!(
        "cannot {} collections config {}: {}",
        action,
        path.display(),
        err
    ))
}
