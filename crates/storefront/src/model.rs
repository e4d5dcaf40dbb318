//! Cart data model.
//!
//! The persisted record and the export snapshot use the same JSON shape the
//! storefront page has always written: camelCase keys, prices as JSON numbers
//! and ISO-8601 timestamps.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use minicart_core::ProductId;

/// A product as offered on the page, before it is added to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Product {
    /// Create a product without an image.
    #[must_use]
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            image: None,
        }
    }

    /// Attach a display image reference.
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

/// One product entry in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub id: ProductId,
    /// Display name copied at add time.
    pub name: String,
    /// Unit price.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Display image reference, empty when the product had none.
    #[serde(default)]
    pub image: String,
    /// Always at least 1 while the item is in the cart.
    pub quantity: u32,
    /// When the product was first added. Never changes afterwards.
    pub added_at: DateTime<Utc>,
}

impl LineItem {
    /// Build a new line item from a product.
    #[must_use]
    pub fn from_product(product: &Product, quantity: u32, added_at: DateTime<Utc>) -> Self {
        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            price: product.price,
            image: product.image.clone().unwrap_or_default(),
            quantity,
            added_at,
        }
    }

    /// Unit price times quantity, saturating at `Decimal::MAX`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price.saturating_mul(Decimal::from(self.quantity))
    }

    /// Unit price times quantity, or `None` if it does not fit in a `Decimal`.
    #[must_use]
    pub fn checked_line_total(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Sum of `price * quantity` over all items.
///
/// Saturates instead of overflowing; carts that pass [`validate_items`] never
/// reach the limit.
#[must_use]
pub fn cart_total(items: &[LineItem]) -> Decimal {
    items
        .iter()
        .fold(Decimal::ZERO, |total, item| total.saturating_add(item.line_total()))
}

/// Sum of `price * quantity`, or `None` if any step overflows.
#[must_use]
pub fn checked_cart_total(items: &[LineItem]) -> Option<Decimal> {
    items.iter().try_fold(Decimal::ZERO, |total, item| {
        total.checked_add(item.checked_line_total()?)
    })
}

/// Sum of quantities over all items.
#[must_use]
pub fn cart_item_count(items: &[LineItem]) -> u64 {
    items.iter().map(|item| u64::from(item.quantity)).sum()
}

/// Check the cart invariants: unique ids, positive quantities, non-negative
/// prices and a total that fits in a `Decimal`.
///
/// # Errors
///
/// Returns a description of the first violation found.
pub fn validate_items(items: &[LineItem]) -> Result<(), String> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if item.quantity == 0 {
            return Err(format!("item {} has zero quantity", item.id));
        }
        if item.price.is_sign_negative() && !item.price.is_zero() {
            return Err(format!("item {} has a negative price", item.id));
        }
        if !seen.insert(&item.id) {
            return Err(format!("duplicate item id {}", item.id));
        }
    }
    if checked_cart_total(items).is_none() {
        return Err("cart total overflows".to_string());
    }
    Ok(())
}

/// Point-in-time export of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub items: Vec<LineItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub item_count: u64,
    pub exported_at: DateTime<Utc>,
}

impl CartSnapshot {
    /// Build a snapshot of `items` taken at `exported_at`.
    #[must_use]
    pub fn new(items: &[LineItem], exported_at: DateTime<Utc>) -> Self {
        Self {
            items: items.to_vec(),
            total: cart_total(items),
            item_count: cart_item_count(items),
            exported_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(id: &str, price: Decimal, quantity: u32) -> LineItem {
        LineItem::from_product(&Product::new(id, id, price), quantity, Utc::now())
    }

    #[test]
    fn test_line_item_json_shape() {
        let product = Product::new("a", "Widget", Decimal::new(999, 2));
        let added_at = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let line = LineItem::from_product(&product, 2, added_at);

        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["id"], "a");
        assert_eq!(json["name"], "Widget");
        assert_eq!(json["price"], 9.99);
        assert_eq!(json["image"], "");
        assert_eq!(json["quantity"], 2);
        assert_eq!(json["addedAt"], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn test_line_item_reads_browser_record() {
        let raw = r#"{"id":"p1","name":"Tea","price":4.5,"quantity":3,"addedAt":"2024-05-01T12:00:00.000Z"}"#;
        let line: LineItem = serde_json::from_str(raw).unwrap();
        assert_eq!(line.price, Decimal::new(45, 1));
        assert_eq!(line.image, "");
        assert_eq!(line.line_total(), Decimal::new(135, 1));
    }

    #[test]
    fn test_totals_on_empty_cart() {
        assert_eq!(cart_total(&[]), Decimal::ZERO);
        assert_eq!(cart_item_count(&[]), 0);
    }

    #[test]
    fn test_totals_are_exact() {
        let items = vec![
            item("a", Decimal::new(999, 2), 3),
            item("b", Decimal::new(1, 1), 2),
        ];
        assert_eq!(cart_total(&items), Decimal::new(3017, 2));
        assert_eq!(cart_item_count(&items), 5);
    }

    #[test]
    fn test_validate_items_rejects_duplicates() {
        let items = vec![item("a", Decimal::ONE, 1), item("a", Decimal::ONE, 2)];
        assert!(validate_items(&items).unwrap_err().contains("duplicate"));
    }

    #[test]
    fn test_validate_items_rejects_zero_quantity() {
        let items = vec![item("a", Decimal::ONE, 0)];
        assert!(validate_items(&items).is_err());
    }

    #[test]
    fn test_validate_items_rejects_negative_price() {
        let items = vec![item("a", Decimal::new(-1, 0), 1)];
        assert!(validate_items(&items).is_err());
    }

    #[test]
    fn test_validate_items_rejects_overflowing_line() {
        let items = vec![item("a", Decimal::MAX, 2)];
        assert!(validate_items(&items).unwrap_err().contains("overflows"));
    }

    #[test]
    fn test_validate_items_rejects_overflowing_sum() {
        let items = vec![item("a", Decimal::MAX, 1), item("b", Decimal::MAX, 1)];
        assert!(checked_cart_total(&items).is_none());
        assert!(validate_items(&items).is_err());
    }

    #[test]
    fn test_totals_saturate_instead_of_panicking() {
        let items = vec![item("a", Decimal::MAX, 3), item("b", Decimal::ONE, 1)];
        assert_eq!(cart_total(&items), Decimal::MAX);
    }

    #[test]
    fn test_snapshot_uses_camel_case() {
        let snapshot = CartSnapshot::new(&[item("a", Decimal::new(250, 2), 2)], Utc::now());
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["itemCount"], 2);
        assert_eq!(json["total"], 5.0);
        assert!(json.get("exportedAt").is_some());
    }
}
