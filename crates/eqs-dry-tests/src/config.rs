// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory config store fake for testing without filesystem I/O.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use eqs_core::{ConfigError, ConfigStore};

/// In-memory implementation of [`ConfigStore`] for testing.
///
/// Clones share storage; call counters count attempts, including ones that
/// fail through injected failures or missing keys.
///
/// # Example
///
/// ```
/// use eqs_core::{ConfigService, ManagerConfig};
/// use eqs_dry_tests::InMemoryConfigStore;
///
/// let store = InMemoryConfigStore::new();
/// let service = ConfigService::new(store.clone());
/// service.save(ManagerConfig::CONFIG_KEY, &ManagerConfig::default()).unwrap();
/// assert_eq!(store.save_count(), 1);
/// assert!(store.json(ManagerConfig::CONFIG_KEY).is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryConfigStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    data: BTreeMap<String, Vec<u8>>,
    load_count: usize,
    save_count: usize,
    fail_on_load: bool,
    fail_on_save: bool,
}

impl InMemoryConfigStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stores `data` under `key` without counting a save.
    pub fn insert(&self, key: &str, data: &[u8]) {
        self.lock().data.insert(key.to_owned(), data.to_vec());
    }

    /// Makes every load fail with [`ConfigError::Other`].
    pub fn set_fail_on_load(&self, fail: bool) {
        self.lock().fail_on_load = fail;
    }

    /// Makes every save fail with [`ConfigError::Other`].
    pub fn set_fail_on_save(&self, fail: bool) {
        self.lock().fail_on_save = fail;
    }

    /// Attempted loads.
    pub fn load_count(&self) -> usize {
        self.lock().load_count
    }

    /// Attempted saves.
    pub fn save_count(&self) -> usize {
        self.lock().save_count
    }

    /// Stored value for `key` parsed as JSON.
    pub fn json(&self, key: &str) -> Option<serde_json::Value> {
        let inner = self.lock();
        serde_json::from_slice(inner.data.get(key)?).ok()
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let mut inner = self.lock();
        inner.load_count += 1;
        if inner.fail_on_load {
            return Err(ConfigError::Other("simulated load failure".into()));
        }
        inner.data.get(key).cloned().ok_or(ConfigError::NotFound)
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let mut inner = self.lock();
        inner.save_count += 1;
        if inner.fail_on_save {
            return Err(ConfigError::Other("simulated save failure".into()));
        }
        inner.data.insert(key.to_owned(), data.to_vec());
        Ok(())
    }
}
