//! Core types for minicart.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod price;
pub mod severity;

pub use id::*;
pub use price::{CurrencyCode, ParseCurrencyError, Price};
pub use severity::Severity;
