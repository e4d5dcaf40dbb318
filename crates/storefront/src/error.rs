//! Unified error handling with Sentry integration.
//!
//! None of these errors are fatal to the cart. Store operations catch them at
//! the operation boundary and hand them to [`CartError::report`], which logs
//! and (for backend failures) captures them to Sentry. Only import validation
//! failures reach the user, as a notification.

use thiserror::Error;

use crate::host::HostSyncError;
use crate::storage::StorageError;

/// Cart-level error taxonomy.
#[derive(Debug, Error)]
pub enum CartError {
    /// Persisted data missing or unparseable.
    #[error("failed to read cart from storage: {0}")]
    StorageRead(String),

    /// Persisting the cart failed (e.g. quota exceeded).
    #[error("failed to write cart to storage: {0}")]
    StorageWrite(#[from] StorageError),

    /// An externally supplied cart snapshot failed shape validation.
    #[error("invalid cart data: {0}")]
    ImportValidation(String),

    /// Forwarding a snapshot to the host platform failed.
    #[error("host sync failed: {0}")]
    HostSync(#[from] HostSyncError),
}

impl CartError {
    /// Log the error and capture backend failures to Sentry.
    ///
    /// Read and validation failures are expected in normal operation (first
    /// visit, hand-edited storage, bad import file) and are only logged.
    pub fn report(&self) {
        match self {
            Self::StorageRead(_) | Self::ImportValidation(_) => {
                tracing::warn!(error = %self, "Cart error");
            }
            Self::StorageWrite(_) | Self::HostSync(_) => {
                let event_id = sentry::capture_error(self);
                tracing::error!(
                    error = %self,
                    sentry_event_id = %event_id,
                    "Cart error"
                );
            }
        }
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

/// Add a breadcrumb for cart actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart
/// mutations leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "sku-1")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
