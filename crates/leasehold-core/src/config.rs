//! Configuration for contract locking and pruning
//!
//! Loaded from TOML, optionally overridden by `LEASEHOLD_*` environment
//! variables, then validated. Every field has a default so an empty file is a
//! valid configuration.
//!
//! ```toml
//! [lock]
//! max_wait_ms = 30000
//! priority_aging_interval_ms = 10000
//!
//! [pruning]
//! max_batch_size = 262144
//! spending_record_timeout_ms = 60000
//! default_timeout_ms = 600000
//! lock_priority = 20
//! ```

use crate::constants::MAX_SECTOR_BATCH_SIZE;
use crate::gouging::GougingSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix of environment variables that override file settings
pub const ENV_PREFIX: &str = "LEASEHOLD_";

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Reading the file failed
    #[error("failed to read config file {path}: {message}")]
    Io {
        /// File that could not be read
        path: String,
        /// Underlying cause
        message: String,
    },
    /// The file is not valid TOML for this schema
    #[error("invalid config: {message}")]
    Parse {
        /// Parser message
        message: String,
    },
    /// A value is out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },
}

impl ConfigError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Contract lock settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// How long acquire waits for a contended contract
    pub max_wait_ms: u64,
    /// Waiting this long raises a waiter's effective priority by one
    pub priority_aging_interval_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            max_wait_ms: 30_000,
            priority_aging_interval_ms: 10_000,
        }
    }
}

impl LockConfig {
    /// Maximum acquire wait
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    /// Priority aging interval
    pub fn priority_aging_interval(&self) -> Duration {
        Duration::from_millis(self.priority_aging_interval_ms)
    }
}

/// Sector pruning settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PruningConfig {
    /// Page size for root enumeration and cap on sectors freed per pass
    pub max_batch_size: u64,
    /// Budget for persisting a spending record, independent of the caller
    pub spending_record_timeout_ms: u64,
    /// Pass timeout used when a request does not specify one
    pub default_timeout_ms: u64,
    /// Priority used when the service locks a contract for pruning
    pub lock_priority: i64,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            max_batch_size: MAX_SECTOR_BATCH_SIZE,
            spending_record_timeout_ms: 60_000,
            default_timeout_ms: 600_000,
            lock_priority: 20,
        }
    }
}

impl PruningConfig {
    /// Spending record timeout
    pub fn spending_record_timeout(&self) -> Duration {
        Duration::from_millis(self.spending_record_timeout_ms)
    }

    /// Default pass timeout
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseholdConfig {
    /// Lock settings
    pub lock: LockConfig,
    /// Pruning settings
    pub pruning: PruningConfig,
    /// Price limits for the built-in gouging checker
    pub gouging: GougingSettings,
}

impl LeaseholdConfig {
    /// Parse from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Load from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded leasehold config");
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn merge_with_env(&mut self) -> Result<(), ConfigError> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply `LEASEHOLD_<SECTION>_<FIELD>` overrides from key/value pairs
    ///
    /// Unknown keys with the prefix are ignored so unrelated tooling can share
    /// it.
    pub fn merge_with_vars<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name.to_ascii_lowercase().as_str() {
                "lock_max_wait_ms" => self.lock.max_wait_ms = parse_u64(&key, &value)?,
                "lock_priority_aging_interval_ms" => {
                    self.lock.priority_aging_interval_ms = parse_u64(&key, &value)?;
                }
                "pruning_max_batch_size" => self.pruning.max_batch_size = parse_u64(&key, &value)?,
                "pruning_spending_record_timeout_ms" => {
                    self.pruning.spending_record_timeout_ms = parse_u64(&key, &value)?;
                }
                "pruning_default_timeout_ms" => {
                    self.pruning.default_timeout_ms = parse_u64(&key, &value)?;
                }
                "pruning_lock_priority" => {
                    self.pruning.lock_priority = value
                        .trim()
                        .parse()
                        .map_err(|e| ConfigError::invalid(&key, format!("{e}")))?;
                }
                _ => {
                    tracing::trace!(key = %key, "ignoring unknown config override");
                }
            }
        }
        Ok(())
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock.priority_aging_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "lock.priority_aging_interval_ms",
                "must be positive, otherwise low priority waiters can starve",
            ));
        }
        if self.pruning.max_batch_size == 0 || self.pruning.max_batch_size > MAX_SECTOR_BATCH_SIZE
        {
            return Err(ConfigError::invalid(
                "pruning.max_batch_size",
                format!("must be within 1..={MAX_SECTOR_BATCH_SIZE}"),
            ));
        }
        if self.pruning.spending_record_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "pruning.spending_record_timeout_ms",
                "must be positive",
            ));
        }
        if self.pruning.default_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "pruning.default_timeout_ms",
                "must be positive",
            ));
        }
        Ok(())
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::invalid(key, format!("{e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        LeaseholdConfig::default().validate().unwrap();
    }

    #[test]
    fn empty_document_yields_defaults() {
        let config = LeaseholdConfig::from_toml_str("").unwrap();
        assert_eq!(config, LeaseholdConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = LeaseholdConfig::from_toml_str(
            r#"
            [pruning]
            max_batch_size = 16

            [gouging]
            max_egress_price = 1000
            "#,
        )
        .unwrap();
        assert_eq!(config.pruning.max_batch_size, 16);
        assert_eq!(config.pruning.lock_priority, 20);
        assert_eq!(config.lock, LockConfig::default());
        assert_eq!(config.gouging.max_egress_price.amount(), 1000);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[lock]\nmax_wait_ms = 5").unwrap();
        let config = LeaseholdConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.lock.max_wait(), Duration::from_millis(5));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = LeaseholdConfig::load_from_file(Path::new("/nonexistent/leasehold.toml"))
            .unwrap_err();
        assert_matches!(err, ConfigError::Io { .. });
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = LeaseholdConfig::default();
        config
            .merge_with_vars(vec![
                ("LEASEHOLD_PRUNING_MAX_BATCH_SIZE".to_string(), "8".to_string()),
                ("LEASEHOLD_PRUNING_LOCK_PRIORITY".to_string(), "-3".to_string()),
                ("LEASEHOLD_SOMETHING_ELSE".to_string(), "x".to_string()),
                ("PATH".to_string(), "/bin".to_string()),
            ])
            .unwrap();
        assert_eq!(config.pruning.max_batch_size, 8);
        assert_eq!(config.pruning.lock_priority, -3);
    }

    #[test]
    fn bad_env_value_is_rejected() {
        let mut config = LeaseholdConfig::default();
        let err = config
            .merge_with_vars(vec![(
                "LEASEHOLD_LOCK_MAX_WAIT_MS".to_string(),
                "soon".to_string(),
            )])
            .unwrap_err();
        assert_matches!(err, ConfigError::Invalid { .. });
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let mut config = LeaseholdConfig::default();
        config.pruning.max_batch_size = MAX_SECTOR_BATCH_SIZE + 1;
        assert_matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "pruning.max_batch_size");

        let mut config = LeaseholdConfig::default();
        config.lock.priority_aging_interval_ms = 0;
        assert!(config.validate().is_err());
    }
}
