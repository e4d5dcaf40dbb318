//! Display data for presentation layers.
//!
//! Prices are pre-formatted so a renderer can bind them directly to the
//! cart badge, cart page and mini-cart without doing any arithmetic.

use rust_decimal::Decimal;

use minicart_core::{CurrencyCode, Price};

use crate::model::{LineItem, cart_item_count, cart_total};

/// Cart line display data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItemView {
    pub id: String,
    pub name: String,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
    pub image: Option<String>,
}

/// Cart display data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: u64,
}

impl CartView {
    /// Create an empty cart view.
    #[must_use]
    pub fn empty(currency: CurrencyCode) -> Self {
        Self {
            items: Vec::new(),
            subtotal: format_price(Decimal::ZERO, currency),
            item_count: 0,
        }
    }

    /// Build the view for `items`.
    #[must_use]
    pub fn new(items: &[LineItem], currency: CurrencyCode) -> Self {
        Self {
            items: items
                .iter()
                .map(|item| CartItemView::new(item, currency))
                .collect(),
            subtotal: format_price(cart_total(items), currency),
            item_count: cart_item_count(items),
        }
    }

    /// Whether the header count badge should be shown.
    #[must_use]
    pub const fn show_badge(&self) -> bool {
        self.item_count > 0
    }
}

impl CartItemView {
    fn new(item: &LineItem, currency: CurrencyCode) -> Self {
        Self {
            id: item.id.to_string(),
            name: item.name.clone(),
            quantity: item.quantity,
            price: format_price(item.price, currency),
            line_price: format_price(item.line_total(), currency),
            image: (!item.image.is_empty()).then(|| item.image.clone()),
        }
    }
}

/// Format an amount as a price string (e.g. "$19.98").
#[must_use]
pub fn format_price(amount: Decimal, currency: CurrencyCode) -> String {
    Price::new(amount, currency).display()
}
