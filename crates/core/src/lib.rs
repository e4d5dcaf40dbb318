//! minicart core - shared types library.
//!
//! This crate provides common types used across all minicart components:
//! - `storefront` - The cart store, its storage backends and host bridge
//! - `cli` - Command-line driver for a file-backed cart
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for identifiers, prices and notification severities

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
