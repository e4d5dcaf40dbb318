//! The cart store.
//!
//! [`CartStore`] owns the authoritative list of line items for one application
//! session. Every mutation is persisted right away; the persisted record is a
//! mirror, and when another session rewrites it the store reloads and the
//! persisted copy wins.
//!
//! Failures never escape a store operation. Storage problems degrade to an
//! empty or unsaved cart and are logged; a bad import is reported to the user
//! through a notification.
//!
//! Two sessions that mutate the same key concurrently race: each store writes
//! its own in-memory list, so the last writer silently drops the other's
//! change. Nothing here detects or merges such writes.

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::instrument;

use minicart_core::{CurrencyCode, HostUserId};

use crate::config::DEFAULT_STORAGE_KEY;
use crate::error::{self, CartError, add_breadcrumb};
use crate::events::{CartEvent, Listeners, Notification};
use crate::host::{HostBridge, HostMessage};
use crate::model::{
    CartSnapshot, LineItem, Product, cart_item_count, cart_total, validate_items,
};
use crate::storage::{ExternalChanges, Storage};
use crate::view::{CartView, format_price};

type ExternalChangeCallback = Box<dyn Fn(&[LineItem])>;

/// Bridge plus the host user it reports for.
struct HostSession {
    bridge: Box<dyn HostBridge>,
    user_id: HostUserId,
}

/// Builder for [`CartStore`].
pub struct CartStoreBuilder<S> {
    storage: S,
    key: String,
    currency: CurrencyCode,
    host: Option<HostSession>,
}

impl<S: Storage> CartStoreBuilder<S> {
    /// Persist under `key` instead of the default `cart`.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Currency used for formatted totals.
    #[must_use]
    pub fn currency(mut self, currency: CurrencyCode) -> Self {
        self.currency = currency;
        self
    }

    /// Forward saved carts to the host platform for `user_id`.
    #[must_use]
    pub fn host(mut self, bridge: impl HostBridge + 'static, user_id: HostUserId) -> Self {
        self.host = Some(HostSession {
            bridge: Box::new(bridge),
            user_id,
        });
        self
    }

    /// Subscribe to storage changes and load the persisted cart.
    #[must_use]
    pub fn build(self) -> CartStore<S> {
        let changes = self.storage.subscribe();
        let mut store = CartStore {
            storage: self.storage,
            key: self.key,
            currency: self.currency,
            items: Vec::new(),
            changes,
            listeners: Listeners::default(),
            external_listeners: Vec::new(),
            host: self.host,
        };
        store.load();
        store
    }
}

/// Single authoritative in-memory cart plus its persistence and queries.
pub struct CartStore<S> {
    storage: S,
    key: String,
    currency: CurrencyCode,
    items: Vec<LineItem>,
    changes: ExternalChanges,
    listeners: Listeners,
    external_listeners: Vec<ExternalChangeCallback>,
    host: Option<HostSession>,
}

impl<S: Storage> CartStore<S> {
    /// Create a store with default settings and load the persisted cart.
    #[must_use]
    pub fn new(storage: S) -> Self {
        Self::builder(storage).build()
    }

    /// Start configuring a store over `storage`.
    #[must_use]
    pub fn builder(storage: S) -> CartStoreBuilder<S> {
        CartStoreBuilder {
            storage,
            key: DEFAULT_STORAGE_KEY.to_string(),
            currency: CurrencyCode::default(),
            host: None,
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Replace the in-memory cart with the persisted one.
    ///
    /// Missing, unreadable or malformed data yields an empty cart.
    pub fn load(&mut self) -> &[LineItem] {
        self.items = match self.read_persisted() {
            Ok(items) => items,
            Err(e) => {
                e.report();
                Vec::new()
            }
        };
        tracing::debug!(key = %self.key, items = self.items.len(), "Cart loaded");
        &self.items
    }

    fn read_persisted(&self) -> error::Result<Vec<LineItem>> {
        let raw = self
            .storage
            .get_item(&self.key)
            .map_err(|e| CartError::StorageRead(e.to_string()))?;
        let Some(raw) = raw else {
            return Ok(Vec::new());
        };
        let items: Vec<LineItem> =
            serde_json::from_str(&raw).map_err(|e| CartError::StorageRead(e.to_string()))?;
        validate_items(&items).map_err(CartError::StorageRead)?;
        Ok(items)
    }

    /// Persist the cart, refresh observers and sync with the host.
    ///
    /// A failed write is logged and the in-memory cart is kept as is. Host sync
    /// only follows a successful write.
    pub fn save(&mut self) {
        match self.persist() {
            Ok(()) => {
                self.emit_changed();
                self.sync_with_host();
            }
            Err(e) => {
                e.report();
                self.emit_changed();
            }
        }
    }

    fn persist(&self) -> error::Result<()> {
        let raw = serde_json::to_string(&self.items).map_err(crate::storage::StorageError::from)?;
        self.storage.set_item(&self.key, &raw)?;
        Ok(())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add one unit of `product`.
    pub fn add_one(&mut self, product: &Product) {
        self.add_item(product, 1);
    }

    /// Add `quantity` units of `product`, merging into an existing line.
    ///
    /// A zero quantity adds nothing. An add that would push the cart total past
    /// `Decimal::MAX` is rejected with an error notification.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub fn add_item(&mut self, product: &Product, quantity: u32) {
        if quantity == 0 {
            tracing::debug!("Ignoring add with zero quantity");
            return;
        }

        let position = self.items.iter().position(|item| item.id == product.id);
        let line = match position.and_then(|index| self.items.get(index)) {
            Some(existing) => LineItem {
                quantity: existing.quantity.saturating_add(quantity),
                ..existing.clone()
            },
            None => LineItem::from_product(product, quantity, Utc::now()),
        };

        let fits = self
            .items
            .iter()
            .filter(|item| item.id != product.id)
            .chain(std::iter::once(&line))
            .try_fold(Decimal::ZERO, |total, item| {
                total.checked_add(item.checked_line_total()?)
            })
            .is_some();
        if !fits {
            tracing::warn!(quantity, "Cart total would overflow, item not added");
            self.notify(Notification::error(format!(
                "{} could not be added: cart total is too large!",
                product.name
            )));
            return;
        }

        match position.and_then(|index| self.items.get_mut(index)) {
            Some(slot) => *slot = line,
            None => self.items.push(line),
        }

        add_breadcrumb(
            "cart",
            "Added item",
            Some(&[("product_id", product.id.as_str())]),
        );
        self.save();
        self.notify(Notification::success(format!(
            "{} added to cart!",
            product.name
        )));
        self.listeners.emit(&CartEvent::ItemAdded {
            id: product.id.clone(),
        });
    }

    /// Remove the line for `id`. Unknown ids are ignored.
    pub fn remove_item(&mut self, id: &str) -> Option<LineItem> {
        let index = self.items.iter().position(|item| item.id == id)?;
        let removed = self.items.remove(index);

        add_breadcrumb("cart", "Removed item", Some(&[("product_id", id)]));
        self.save();
        self.notify(Notification::info(format!(
            "{} removed from cart!",
            removed.name
        )));
        Some(removed)
    }

    /// Set the quantity for `id`; zero or less removes the line.
    pub fn update_quantity(&mut self, id: &str, quantity: i64) {
        if quantity <= 0 {
            self.remove_item(id);
            return;
        }

        let Some(item) = self.items.iter_mut().find(|item| item.id == id) else {
            return;
        };
        item.quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        self.save();
    }

    /// Remove every line.
    pub fn clear_cart(&mut self) {
        self.items.clear();
        add_breadcrumb("cart", "Cleared cart", None);
        self.save();
        self.notify(Notification::info("Cart cleared!"));
    }

    /// Replace the cart with `data.items`.
    ///
    /// Returns `false`, notifies the user and leaves the cart untouched when
    /// `data.items` is missing, is not an array, or holds malformed lines.
    pub fn import_cart(&mut self, data: &Value) -> bool {
        match parse_import(data) {
            Ok(items) => {
                self.items = items;
                self.save();
                self.notify(Notification::success("Cart imported successfully!"));
                true
            }
            Err(e) => {
                e.report();
                self.notify(Notification::error("Invalid cart data format!"));
                false
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current line items in order of first add.
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Line for `id`, if present.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&LineItem> {
        self.items.iter().find(|item| item.id == id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of `price * quantity`.
    #[must_use]
    pub fn total(&self) -> Decimal {
        cart_total(&self.items)
    }

    /// Sum of quantities.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        cart_item_count(&self.items)
    }

    /// Total formatted in the store currency, e.g. `$19.98`.
    #[must_use]
    pub fn formatted_total(&self) -> String {
        format_price(self.total(), self.currency)
    }

    /// Display model for presentation layers.
    #[must_use]
    pub fn view(&self) -> CartView {
        CartView::new(&self.items, self.currency)
    }

    /// Snapshot of the cart. Does not mutate anything.
    #[must_use]
    pub fn export_cart(&self) -> CartSnapshot {
        CartSnapshot::new(&self.items, Utc::now())
    }

    /// Key the cart is persisted under.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Underlying storage handle.
    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Register a listener for every [`CartEvent`].
    pub fn subscribe(&mut self, listener: impl Fn(&CartEvent) + 'static) {
        self.listeners.add(listener);
    }

    /// Register a callback run after a reload caused by another session.
    pub fn on_external_change(&mut self, callback: impl Fn(&[LineItem]) + 'static) {
        self.external_listeners.push(Box::new(callback));
    }

    /// Apply pending writes made by other sessions.
    ///
    /// If any of them touched the cart key, the persisted cart replaces the
    /// in-memory one unconditionally. Returns whether a reload happened.
    pub fn poll_external_changes(&mut self) -> bool {
        let events = self.changes.drain();
        if !events.iter().any(|event| event.affects(&self.key)) {
            return false;
        }

        tracing::info!(key = %self.key, "Cart changed in another session, reloading");
        self.load();
        self.listeners.emit(&CartEvent::Reloaded);
        self.emit_changed();
        for callback in &self.external_listeners {
            callback(&self.items);
        }
        true
    }

    // =========================================================================
    // Host sync
    // =========================================================================

    /// Whether saved carts are forwarded to a host user.
    #[must_use]
    pub const fn has_host_session(&self) -> bool {
        self.host.is_some()
    }

    /// Page visibility changed; resync when shown again with a host session.
    pub fn on_visibility_change(&self, visible: bool) {
        if visible {
            self.sync_with_host();
        }
    }

    /// Hand the current cart to the host bridge. Best effort, never retried.
    pub fn sync_with_host(&self) {
        let Some(host) = &self.host else {
            return;
        };
        let message = HostMessage::cart_update(host.user_id, &self.items, Utc::now());
        if let Err(e) = host.bridge.send(&message) {
            CartError::from(e).report();
        }
    }

    fn emit_changed(&self) {
        self.listeners.emit(&CartEvent::Changed {
            item_count: self.item_count(),
            total: self.total(),
        });
    }

    fn notify(&self, notification: Notification) {
        tracing::debug!(
            severity = %notification.severity,
            message = %notification.message,
            "Cart notification"
        );
        self.listeners.emit(&CartEvent::Notification(notification));
    }
}

impl<S> std::fmt::Debug for CartStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("key", &self.key)
            .field("currency", &self.currency)
            .field("items", &self.items)
            .field("listeners", &self.listeners)
            .field("host_user_id", &self.host.as_ref().map(|h| h.user_id))
            .finish_non_exhaustive()
    }
}

fn parse_import(data: &Value) -> error::Result<Vec<LineItem>> {
    let items = data
        .get("items")
        .ok_or_else(|| CartError::ImportValidation("missing items".to_string()))?;
    if !items.is_array() {
        return Err(CartError::ImportValidation(
            "items must be an array".to_string(),
        ));
    }
    let items: Vec<LineItem> = serde_json::from_value(items.clone())
        .map_err(|e| CartError::ImportValidation(e.to_string()))?;
    validate_items(&items).map_err(CartError::ImportValidation)?;
    Ok(items)
}
