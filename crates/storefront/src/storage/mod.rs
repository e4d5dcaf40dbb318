//! Key-value storage backends for the persisted cart.
//!
//! A [`Storage`] handle is one session's view of a shared string namespace,
//! the same model as browser local storage. Several handles can be attached to
//! the same namespace; a write through one handle produces a [`StorageEvent`]
//! on every *other* handle's subscription, never on the writer's own.
//!
//! # Backends
//!
//! - [`MemoryStorage`] - In-process namespace with an optional byte quota
//! - [`FileStorage`] - One JSON file per key inside a directory

mod file;
mod memory;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::sync::broadcast;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Capacity of the change feed before slow subscribers start lagging.
const CHANGE_FEED_CAPACITY: usize = 64;

/// Errors returned by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The underlying filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The value could not be encoded for storage.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The write would exceed the namespace quota.
    #[error("quota exceeded: {needed} bytes needed, quota is {quota} bytes")]
    QuotaExceeded { needed: usize, quota: usize },
}

/// Identifies the handle that performed a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Origin(u64);

/// Signal that another handle changed the namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// Key that changed; `None` when the whole namespace was cleared.
    pub key: Option<String>,
    /// Handle that made the change.
    pub origin: Origin,
}

impl StorageEvent {
    /// Whether this event may have changed `key`.
    #[must_use]
    pub fn affects(&self, key: &str) -> bool {
        self.key.as_deref().is_none_or(|k| k == key)
    }
}

/// A string key-value namespace with cross-handle change notification.
pub trait Storage {
    /// Read a value. Returns `Ok(None)` if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Insert or replace a value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails or exceeds the quota.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a value. Succeeds even if the key did not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Subscribe to changes made through other handles on this namespace.
    fn subscribe(&self) -> ExternalChanges;
}

/// Receiver of changes made by other handles.
///
/// Events whose origin is the subscribing handle are filtered out.
#[derive(Debug)]
pub struct ExternalChanges {
    own: Origin,
    rx: broadcast::Receiver<StorageEvent>,
}

impl ExternalChanges {
    /// Drain every pending event without blocking.
    ///
    /// If the subscriber fell behind, a synthetic namespace-wide event is
    /// returned in place of the dropped ones.
    pub fn drain(&mut self) -> Vec<StorageEvent> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) if event.origin != self.own => events.push(event),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Storage change feed lagged");
                    events.push(StorageEvent {
                        key: None,
                        origin: self.own,
                    });
                }
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => break,
            }
        }
        events
    }
}

/// Broadcast channel shared by every handle attached to one namespace.
#[derive(Debug, Clone)]
pub(crate) struct ChangeFeed {
    tx: broadcast::Sender<StorageEvent>,
    next_origin: Arc<AtomicU64>,
    origin: Origin,
}

impl ChangeFeed {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            tx,
            next_origin: Arc::new(AtomicU64::new(1)),
            origin: Origin(0),
        }
    }

    /// Same channel, fresh origin.
    pub(crate) fn attach(&self) -> Self {
        let id = self.next_origin.fetch_add(1, Ordering::Relaxed);
        Self {
            tx: self.tx.clone(),
            next_origin: Arc::clone(&self.next_origin),
            origin: Origin(id),
        }
    }

    pub(crate) fn publish(&self, key: Option<&str>) {
        // No receivers is the normal single-session case.
        let _ = self.tx.send(StorageEvent {
            key: key.map(str::to_string),
            origin: self.origin,
        });
    }

    pub(crate) fn subscribe(&self) -> ExternalChanges {
        ExternalChanges {
            own: self.origin,
            rx: self.tx.subscribe(),
        }
    }
}
