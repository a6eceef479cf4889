//! Notification service configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{WatchError, WatchResult};

/// Default per-subscription buffer capacity.
pub const DEFAULT_CAPACITY: usize = 512;

/// Tunables shared by every subscription a service creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Ordinary events a subscription buffers before collapsing the rest into
    /// a single overflow marker.
    pub capacity: usize,
    /// Fold an event into the last buffered one when kind and context match.
    pub coalesce_repeats: bool,
}

impl WatchConfig {
    /// Creates a config with the given capacity and coalescing off.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            coalesce_repeats: false,
        }
    }

    /// Enables or disables repeat coalescing.
    pub fn with_coalesce_repeats(mut self, coalesce: bool) -> Self {
        self.coalesce_repeats = coalesce;
        self
    }

    /// Checks the config for values the service cannot run with.
    pub fn validate(&self) -> WatchResult<()> {
        if self.capacity == 0 {
            return Err(WatchError::InvalidConfig {
                reason: "capacity must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Loads and validates a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> WatchResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: WatchConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        tracing::debug!(
            "Loaded watch config from {}: capacity={}, coalesce_repeats={}",
            path.as_ref().display(),
            config.capacity,
            config.coalesce_repeats
        );
        Ok(config)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = WatchConfig::default();
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
        assert!(!config.coalesce_repeats);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = WatchConfig::new(0);
        assert!(matches!(
            config.validate(),
            Err(WatchError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_with_coalesce_repeats() {
        let config = WatchConfig::new(8).with_coalesce_repeats(true);
        assert!(config.coalesce_repeats);
        assert_eq!(config.capacity, 8);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"capacity": 16, "coalesce_repeats": true}}"#).unwrap();

        let config = WatchConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.capacity, 16);
        assert!(config.coalesce_repeats);
    }

    #[test]
    fn test_from_json_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"capacity": 3}}"#).unwrap();

        let config = WatchConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.capacity, 3);
        assert!(!config.coalesce_repeats);
    }

    #[test]
    fn test_from_json_file_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"capacity": 0}}"#).unwrap();

        let result = WatchConfig::from_json_file(file.path());
        assert!(matches!(result, Err(WatchError::InvalidConfig { .. })));
    }

    #[test]
    fn test_from_json_file_missing() {
        let result = WatchConfig::from_json_file("/nonexistent/fsbase/watch.json");
        assert!(matches!(result, Err(WatchError::Io(_))));
    }

    #[test]
    fn test_from_json_file_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let result = WatchConfig::from_json_file(file.path());
        assert!(matches!(result, Err(WatchError::Json(_))));
    }
}
