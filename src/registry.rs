use crate::common::display_bytes;
use crate::config::FilterConfig;
use crate::error::{FilterError, Result};
use crate::filter::BucketFilter;
use crate::snapshot;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, info};

pub type SharedFilter = Arc<Mutex<BucketFilter>>;

/// Lock a shared filter for the duration of one operation
pub fn lock_filter(filter: &SharedFilter) -> Result<MutexGuard<'_, BucketFilter>> {
    filter.lock().map_err(|_| {
        FilterError::LockError("Failed to acquire filter lock".to_string())
    })
}

/// Mapping from key to its filter, with lazy creation.
///
/// The registry lock is held only to look up or insert an entry. Filter
/// operations run under the per-filter mutex returned by the lookup, so
/// commands on different keys never contend beyond the lookup itself.
pub struct KeyRegistry {
    config: FilterConfig,
    filters: RwLock<HashMap<Vec<u8>, SharedFilter>>,
}

impl KeyRegistry {
    pub fn new(config: FilterConfig) -> Result<Self> {
        config.params()?;
        Ok(Self {
            config,
            filters: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Returns the filter for `key` without creating one.
    pub fn get(&self, key: &[u8]) -> Result<Option<SharedFilter>> {
        let filters = self.filters.read().map_err(|_| {
            FilterError::LockError("Failed to read registry".to_string())
        })?;
        Ok(filters.get(key).cloned())
    }

    pub fn get_or_create(&self, key: &[u8]) -> Result<SharedFilter> {
        if let Some(filter) = self.get(key)? {
            return Ok(filter);
        }

        // Allocate before taking the write lock so a failure cannot poison it
        let created = Arc::new(Mutex::new(BucketFilter::new(self.config.clone())?));

        let mut filters = self.filters.write().map_err(|_| {
            FilterError::LockError("Failed to write registry".to_string())
        })?;
        // Another writer may have created it between the two locks
        if let Some(filter) = filters.get(key) {
            return Ok(Arc::clone(filter));
        }

        filters.insert(key.to_vec(), Arc::clone(&created));
        debug!(key = %display_bytes(key), "created filter");
        Ok(created)
    }

    /// Drops the filter for `key`, e.g. when the host expires the key.
    pub fn remove(&self, key: &[u8]) -> Result<bool> {
        let mut filters = self.filters.write().map_err(|_| {
            FilterError::LockError("Failed to write registry".to_string())
        })?;
        Ok(filters.remove(key).is_some())
    }

    pub fn len(&self) -> Result<usize> {
        let filters = self.filters.read().map_err(|_| {
            FilterError::LockError("Failed to read registry".to_string())
        })?;
        Ok(filters.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Result<Vec<Vec<u8>>> {
        let filters = self.filters.read().map_err(|_| {
            FilterError::LockError("Failed to read registry".to_string())
        })?;
        let mut keys: Vec<Vec<u8>> = filters.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    pub fn snapshot(&self) -> Result<Vec<u8>> {
        let entries: Vec<(Vec<u8>, SharedFilter)> = {
            let filters = self.filters.read().map_err(|_| {
                FilterError::LockError("Failed to read registry".to_string())
            })?;
            filters
                .iter()
                .map(|(key, filter)| (key.clone(), Arc::clone(filter)))
                .collect()
        };

        let mut encoded = Vec::with_capacity(entries.len());
        for (key, filter) in entries {
            let filter = lock_filter(&filter)?;
            encoded.push((key, snapshot::FilterSnapshot::capture(&filter)));
        }
        snapshot::encode_registry(&self.config, encoded)
    }

    pub fn restore(bytes: &[u8]) -> Result<Self> {
        let (config, entries) = snapshot::decode_registry(bytes)?;
        let registry = Self::new(config)?;
        {
            let mut filters = registry.filters.write().map_err(|_| {
                FilterError::LockError("Failed to write registry".to_string())
            })?;
            for (key, filter) in entries {
                filters.insert(key, Arc::new(Mutex::new(filter)));
            }
        }
        Ok(registry)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let bytes = self.snapshot()?;
        std::fs::write(path, &bytes)?;
        info!(path = %path.display(), keys = self.len()?, bytes = bytes.len(), "saved snapshot");
        Ok(())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let registry = Self::restore(&bytes)?;
        info!(path = %path.display(), keys = registry.len()?, "loaded snapshot");
        Ok(registry)
    }
}

impl std::fmt::Debug for KeyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRegistry")
            .field("config", &self.config)
            .field("keys", &self.len())
            .finish()
    }
}
