//! End-to-end cart behavior over in-memory storage.
//!
//! These tests drive a store the way a storefront page does: add, adjust,
//! remove, export and import, checking totals and what observers see.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use serde_json::json;

use minicart_core::{HostUserId, Severity};
use minicart_integration_tests::{EventLog, RecordingBridge, ids, product};
use minicart_storefront::{CartEvent, CartStore, MemoryStorage, Storage};

// =============================================================================
// Totals
// =============================================================================

#[test]
fn test_widget_walkthrough() {
    let mut store = CartStore::new(MemoryStorage::new());
    let widget = product("a", "Widget", 999);

    store.add_item(&widget, 2);
    assert_eq!(store.total(), Decimal::new(1998, 2));
    assert_eq!(store.item_count(), 2);
    assert_eq!(store.formatted_total(), "$19.98");

    store.add_item(&widget, 1);
    assert_eq!(store.item_count(), 3);
    assert_eq!(store.total(), Decimal::new(2997, 2));
    assert_eq!(store.items().len(), 1);

    store.remove_item("a");
    assert!(store.is_empty());
    assert_eq!(store.formatted_total(), "$0.00");
}

#[test]
fn test_distinct_adds_sum_quantities_and_prices() {
    let mut store = CartStore::new(MemoryStorage::new());
    let lines = [("a", 999, 2), ("b", 150, 4), ("c", 1, 7), ("d", 0, 1)];

    for (id, cents, quantity) in lines {
        store.add_item(&product(id, id, cents), quantity);
    }

    let expected_count: u64 = lines.iter().map(|(_, _, q)| u64::from(*q)).sum();
    let expected_total: Decimal = lines
        .iter()
        .map(|(_, cents, q)| Decimal::new(*cents, 2) * Decimal::from(*q))
        .sum();
    assert_eq!(store.item_count(), expected_count);
    assert_eq!(store.total(), expected_total);
    assert_eq!(ids(&store), vec!["a", "b", "c", "d"]);
}

#[test]
fn test_clear_always_zeroes_totals() {
    let mut store = CartStore::new(MemoryStorage::new());
    store.clear_cart();
    assert_eq!(store.item_count(), 0);

    store.add_item(&product("a", "Widget", 999), 4);
    store.add_item(&product("b", "Gadget", 2500), 1);
    store.clear_cart();

    assert_eq!(store.item_count(), 0);
    assert_eq!(store.total(), Decimal::ZERO);
}

// =============================================================================
// Observers
// =============================================================================

#[test]
fn test_notification_sequence() {
    let mut store = CartStore::new(MemoryStorage::new());
    let log = EventLog::attach(&mut store);

    store.add_item(&product("a", "Widget", 999), 1);
    store.update_quantity("a", 3);
    store.update_quantity("a", 0);
    store.clear_cart();
    store.import_cart(&json!({"items": 5}));

    assert_eq!(
        log.notifications(),
        vec![
            ("Widget added to cart!".to_string(), Severity::Success),
            ("Widget removed from cart!".to_string(), Severity::Info),
            ("Cart cleared!".to_string(), Severity::Info),
            ("Invalid cart data format!".to_string(), Severity::Error),
        ]
    );
    assert!(
        log.events()
            .iter()
            .any(|e| matches!(e, CartEvent::ItemAdded { id } if id == "a"))
    );
}

#[test]
fn test_changed_events_track_counts() {
    let mut store = CartStore::new(MemoryStorage::new());
    let log = EventLog::attach(&mut store);

    store.add_item(&product("a", "Widget", 999), 2);
    store.update_quantity("a", 5);

    let counts: Vec<u64> = log
        .events()
        .iter()
        .filter_map(|e| match e {
            CartEvent::Changed { item_count, .. } => Some(*item_count),
            _ => None,
        })
        .collect();
    assert_eq!(counts, vec![2, 5]);
}

// =============================================================================
// Export / Import
// =============================================================================

#[test]
fn test_export_import_between_stores() {
    let mut source = CartStore::new(MemoryStorage::new());
    source.add_item(&product("a", "Widget", 999), 2);
    source.add_item(&product("b", "Gadget", 2500), 1);

    let snapshot = serde_json::to_value(source.export_cart()).unwrap();
    assert_eq!(snapshot["itemCount"], 3);
    assert_eq!(snapshot["total"], 44.98);

    let mut target = CartStore::new(MemoryStorage::new());
    target.add_item(&product("z", "Old", 100), 1);
    assert!(target.import_cart(&snapshot));

    assert_eq!(target.items(), source.items());
    assert_eq!(target.total(), source.total());
}

#[test]
fn test_import_non_array_leaves_cart() {
    let mut store = CartStore::new(MemoryStorage::new());
    store.add_item(&product("a", "Widget", 999), 2);
    let before = store.items().to_vec();

    assert!(!store.import_cart(&json!({"items": "not-an-array"})));

    assert_eq!(store.items(), before.as_slice());
}

// =============================================================================
// Host sync
// =============================================================================

#[test]
fn test_host_receives_update_per_save() {
    let bridge = RecordingBridge::default();
    let mut store = CartStore::builder(MemoryStorage::new())
        .host(bridge.clone(), HostUserId::new(99))
        .build();

    store.add_item(&product("a", "Widget", 999), 2);
    store.remove_item("missing");
    store.remove_item("a");

    let sent = bridge.sent();
    assert_eq!(sent.len(), 2);

    let json = serde_json::to_value(sent.first().unwrap()).unwrap();
    assert_eq!(json["type"], "cart_update");
    assert_eq!(json["user_id"], 99);
    assert_eq!(json["item_count"], 2);
    assert_eq!(json["total"], 19.98);
    assert_eq!(json["items"][0]["id"], "a");

    assert_eq!(sent.last().unwrap().item_count, 0);
}

#[test]
fn test_quota_failure_degrades_without_sync() {
    let bridge = RecordingBridge::default();
    let storage = MemoryStorage::with_quota(64);
    let mut store = CartStore::builder(storage.clone())
        .host(bridge.clone(), HostUserId::new(1))
        .build();

    store.add_item(&product("a", "A very long product name that overflows", 999), 1);

    assert_eq!(store.item_count(), 1);
    assert_eq!(storage.get_item("cart").unwrap(), None);
    assert!(bridge.sent().is_empty());
}
