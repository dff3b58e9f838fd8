//! Configuration types for shardtopo
//!
//! The topology server never reads process-wide flags; everything tunable is
//! carried by a [`TopoConfig`] handed to its constructor.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sidecar database name used when a keyspace does not set one
pub const DEFAULT_SIDECAR_DB_NAME: &str = "_vt";

/// Durability policy used when a keyspace does not set one
pub const DEFAULT_DURABILITY_POLICY: &str = "none";

/// Topology server configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopoConfig {
    /// Path prefix under which all records live in the store
    pub root: String,
    /// Upper bound for a single store call (milliseconds)
    pub call_timeout_ms: u64,
    /// Upper bound for waiting on a keyspace lock (milliseconds)
    pub lock_timeout_ms: u64,
    /// Concurrent shard fetches when a discovery call does not ask for a level
    pub default_shard_concurrency: usize,
    /// Fallback sidecar database name
    pub default_sidecar_db_name: String,
    /// Fallback durability policy
    pub default_durability_policy: String,
}

impl Default for TopoConfig {
    fn default() -> Self {
        Self {
            root: "global".to_string(),
            call_timeout_ms: 30_000,
            lock_timeout_ms: 45_000,
            default_shard_concurrency: 1,
            default_sidecar_db_name: DEFAULT_SIDECAR_DB_NAME.to_string(),
            default_durability_policy: DEFAULT_DURABILITY_POLICY.to_string(),
        }
    }
}

impl TopoConfig {
    /// Store call timeout
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Lock acquisition timeout
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Check the configuration for values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.call_timeout_ms == 0 {
            return Err(Error::Configuration(
                "call_timeout_ms must be positive".to_string(),
            ));
        }
        if self.lock_timeout_ms == 0 {
            return Err(Error::Configuration(
                "lock_timeout_ms must be positive".to_string(),
            ));
        }
        if self.root.ends_with('/') {
            return Err(Error::Configuration(format!(
                "root {:?} must not end with '/'",
                self.root
            )));
        }
        if self.default_sidecar_db_name.is_empty() {
            return Err(Error::Configuration(
                "default_sidecar_db_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TopoConfig::default();
        assert_eq!(config.default_shard_concurrency, 1);
        assert_eq!(config.default_sidecar_db_name, "_vt");
        assert_eq!(config.default_durability_policy, "none");
        assert_eq!(config.call_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: TopoConfig =
            serde_json::from_str(r#"{"root": "/topo", "default_shard_concurrency": 8}"#).unwrap();
        assert_eq!(config.root, "/topo");
        assert_eq!(config.default_shard_concurrency, 8);
        assert_eq!(config.lock_timeout_ms, 45_000);
    }

    #[test]
    fn test_invalid_config() {
        let config = TopoConfig {
            call_timeout_ms: 0,
            ..TopoConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let config = TopoConfig {
            root: "global/".to_string(),
            ..TopoConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
