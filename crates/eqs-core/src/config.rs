// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Manager configuration plus the storage port used to persist it.
use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Tuning for [`crate::QueryManager`].
///
/// Durations are stored as fractional milliseconds in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Fixed per-tick budget shared by all running queries.
    #[serde(with = "millis")]
    pub max_allowed_testing_time: Duration,
    /// Round-robin one step per query (`true`) or drain queries in order.
    pub test_queries_using_breadth: bool,
    /// Warn when a query's total execution time exceeds this. Zero disables.
    #[serde(with = "millis")]
    pub execution_time_warning: Duration,
    /// Warn when more queries than this are running. Zero disables.
    pub query_count_warning_threshold: usize,
    /// Minimum accumulated tick time between query-count warnings.
    #[serde(with = "millis")]
    pub query_count_warning_interval: Duration,
    /// Finished queries kept by a recording debug sink. Zero disables.
    pub debug_history: usize,
}

impl ManagerConfig {
    /// Key under which the config is persisted.
    pub const CONFIG_KEY: &'static str = "eqs-manager";

    /// Loads the persisted config, falling back to defaults when absent.
    pub fn load_or_default<S: ConfigStore>(service: &ConfigService<S>) -> Result<Self, ConfigError> {
        Ok(service.load(Self::CONFIG_KEY)?.unwrap_or_default())
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_allowed_testing_time: Duration::from_millis(10),
            test_queries_using_breadth: true,
            execution_time_warning: Duration::from_millis(25),
            query_count_warning_threshold: 200,
            query_count_warning_interval: Duration::from_secs(30),
            debug_history: 0,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_nanos() as f64 / 1_000_000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(deserializer)?;
        if !ms.is_finite() || ms < 0.0 {
            return Err(serde::de::Error::custom(format!("invalid duration {ms} ms")));
        }
        Ok(Duration::from_nanos((ms * 1_000_000.0).round() as u64))
    }
}

/// Storage port for raw config blobs (keyed by logical name).
pub trait ConfigStore {
    /// Load a raw config blob. Returns `NotFound` when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persist a raw config blob.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Error type for config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key not present in store.
    #[error("not found")]
    NotFound,
    /// I/O error while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Catch-all error variant.
    #[error("other: {0}")]
    Other(String),
}

/// Serializes config values as JSON and delegates storage to a [`ConfigStore`].
#[derive(Debug)]
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Create a new service using the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Consume the service and return the inner store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S: ConfigStore> ConfigService<S> {
    /// Load and deserialize a config value for `key`. Returns `Ok(None)` if missing.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.store.load_raw(key) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(ConfigError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Serialize and persist a config value for `key`.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ConfigError> {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }
}
