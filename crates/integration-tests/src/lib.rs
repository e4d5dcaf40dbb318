//! Integration tests for minicart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p minicart-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_scenarios` - End-to-end store behavior over memory storage
//! - `cross_session` - Several stores sharing one namespace
//! - `file_persistence` - Reloading carts from a storage directory
//!
//! This library holds the fixtures shared by those test files.

use std::cell::RefCell;
use std::rc::Rc;

use rust_decimal::Decimal;

use minicart_core::Severity;
use minicart_storefront::{
    CartEvent, CartStore, HostBridge, HostMessage, HostSyncError, Product, Storage,
};

/// Host bridge that keeps every message it is handed.
#[derive(Clone, Default)]
pub struct RecordingBridge {
    sent: Rc<RefCell<Vec<HostMessage>>>,
}

impl RecordingBridge {
    /// Messages handed to the bridge so far.
    #[must_use]
    pub fn sent(&self) -> Vec<HostMessage> {
        self.sent.borrow().clone()
    }
}

impl HostBridge for RecordingBridge {
    fn send(&self, message: &HostMessage) -> Result<(), HostSyncError> {
        self.sent.borrow_mut().push(message.clone());
        Ok(())
    }
}

/// Events captured from a store.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<CartEvent>>>,
}

impl EventLog {
    /// Subscribe a new log to `store`.
    pub fn attach<S: Storage>(store: &mut CartStore<S>) -> Self {
        let log = Self::default();
        let sink = Rc::clone(&log.events);
        store.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        log
    }

    #[must_use]
    pub fn events(&self) -> Vec<CartEvent> {
        self.events.borrow().clone()
    }

    /// Notifications only, as `(message, severity)` pairs.
    #[must_use]
    pub fn notifications(&self) -> Vec<(String, Severity)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                CartEvent::Notification(n) => Some((n.message.clone(), n.severity)),
                _ => None,
            })
            .collect()
    }
}

/// Product with a price given in cents.
#[must_use]
pub fn product(id: &str, name: &str, cents: i64) -> Product {
    Product::new(id, name, Decimal::new(cents, 2))
}

/// Ids of the store's lines, in order.
#[must_use]
pub fn ids<S: Storage>(store: &CartStore<S>) -> Vec<String> {
    store.items().iter().map(|item| item.id.to_string()).collect()
}
