//! minicart storefront library.
//!
//! The cart store behind the storefront widget, kept free of any rendering
//! environment so it can be tested and reused.
//!
//! # Architecture
//!
//! - [`store::CartStore`] owns the cart, persists every mutation and emits
//!   [`events::CartEvent`]s for presentation layers
//! - [`storage`] provides the key-value backends and cross-session change feed
//! - [`host`] forwards saved carts to the embedding chat platform
//! - [`view`] turns the cart into pre-formatted display data
//!
//! One store is built per application root and passed to whatever needs it.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod model;
pub mod storage;
pub mod store;
pub mod telemetry;
pub mod view;

pub use config::{CartConfig, ConfigError, HostConfig};
pub use error::CartError;
pub use events::{CartEvent, Notification};
pub use host::{HostBridge, HostMessage, HostSyncError, HttpHostBridge};
pub use model::{CartSnapshot, LineItem, Product};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError, StorageEvent};
pub use store::{CartStore, CartStoreBuilder};
pub use view::{CartItemView, CartView};
