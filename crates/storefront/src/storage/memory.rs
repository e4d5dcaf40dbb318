//! In-process storage namespace.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{ChangeFeed, ExternalChanges, Storage, StorageError};

/// Shared in-memory namespace, optionally limited to a byte quota.
///
/// The quota counts key and value bytes across the whole namespace, which is
/// how browser local storage accounts for its limit.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
    quota: Option<usize>,
    feed: ChangeFeed,
}

impl MemoryStorage {
    /// Create an empty, unlimited namespace.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            quota: None,
            feed: ChangeFeed::new(),
        }
    }

    /// Create an empty namespace that rejects writes beyond `quota` bytes.
    #[must_use]
    pub fn with_quota(quota: usize) -> Self {
        Self {
            quota: Some(quota),
            ..Self::new()
        }
    }

    /// Open another handle on the same namespace.
    #[must_use]
    pub fn attach(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            quota: self.quota,
            feed: self.feed.attach(),
        }
    }

    /// Remove every key and notify other handles.
    pub fn clear(&self) {
        self.lock().clear();
        self.feed.publish(None);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        // The map holds plain strings, so a poisoned lock is still consistent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        {
            let mut entries = self.lock();
            if let Some(quota) = self.quota {
                let others: usize = entries
                    .iter()
                    .filter(|(k, _)| k.as_str() != key)
                    .map(|(k, v)| k.len() + v.len())
                    .sum();
                let needed = others + key.len() + value.len();
                if needed > quota {
                    return Err(StorageError::QuotaExceeded { needed, quota });
                }
            }
            entries.insert(key.to_string(), value.to_string());
        }
        self.feed.publish(Some(key));
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let removed = self.lock().remove(key).is_some();
        if removed {
            self.feed.publish(Some(key));
        }
        Ok(())
    }

    fn subscribe(&self) -> ExternalChanges {
        self.feed.subscribe()
    }
}
