//! Cart commands.
//!
//! Each invocation opens one store over `MINICART_STORAGE_DIR`, applies a
//! single command and drains pending host deliveries before exiting.
//!
//! # Environment Variables
//!
//! See `minicart_storefront::config` for the full list. The ones that matter
//! most here:
//!
//! - `MINICART_STORAGE_DIR` - Where the cart file lives
//! - `MINICART_HOST_ENDPOINT` / `MINICART_HOST_USER_ID` - Enable host sync

use std::io::Write;
use std::path::Path;

use rust_decimal::Decimal;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use minicart_core::Severity;
use minicart_storefront::{
    CartConfig, CartEvent, CartStore, FileStorage, HostSyncError, HttpHostBridge, Product,
    StorageError,
};

/// Errors that can occur while running a cart command.
#[derive(Debug, Error)]
pub enum CartCommandError {
    /// Storage directory could not be opened.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Host bridge could not be started.
    #[error("Host bridge error: {0}")]
    Host(#[from] HostSyncError),

    /// Reading or writing a snapshot file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot file is not JSON.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Snapshot file is JSON but not a cart.
    #[error("Invalid cart data in {0}")]
    InvalidCart(String),
}

/// A store plus the host bridge worker it feeds.
pub struct CartSession {
    store: CartStore<FileStorage>,
    host: Option<(HttpHostBridge, JoinHandle<()>)>,
}

impl CartSession {
    /// Drop the store and wait for queued host deliveries to finish.
    pub async fn close(self) {
        let Self { store, host } = self;
        drop(store);
        if let Some((bridge, worker)) = host {
            bridge.shutdown(worker).await;
        }
    }
}

/// Open the cart described by `config`.
///
/// # Errors
///
/// Returns an error if the storage directory cannot be created or the host
/// bridge cannot be started.
pub fn open(config: &CartConfig) -> Result<CartSession, CartCommandError> {
    let storage = FileStorage::open(&config.storage_dir)?;
    let builder = CartStore::builder(storage)
        .key(config.storage_key.clone())
        .currency(config.currency);

    let (builder, host) = match &config.host {
        Some(host) => {
            let (bridge, worker) = HttpHostBridge::spawn(host)?;
            info!(user_id = %host.user_id, endpoint = %host.endpoint, "Host sync enabled");
            (
                builder.host(bridge.clone(), host.user_id),
                Some((bridge, worker)),
            )
        }
        None => (builder, None),
    };

    let mut store = builder.build();
    store.subscribe(log_event);

    Ok(CartSession { store, host })
}

/// Presentation layer for the terminal: notifications become log lines.
fn log_event(event: &CartEvent) {
    match event {
        CartEvent::Notification(n) => match n.severity {
            Severity::Error | Severity::Warning => warn!(severity = %n.severity, "{}", n.message),
            Severity::Success | Severity::Info => info!(severity = %n.severity, "{}", n.message),
        },
        CartEvent::Changed { item_count, total } => {
            tracing::debug!(item_count, total = %total, "Cart changed");
        }
        CartEvent::ItemAdded { .. } | CartEvent::Reloaded => {}
    }
}

/// Add `quantity` units of a product.
pub fn add(
    session: &mut CartSession,
    id: String,
    name: String,
    price: Decimal,
    image: Option<String>,
    quantity: u32,
) {
    let mut product = Product::new(id, name, price);
    product.image = image;
    session.store.add_item(&product, quantity);
    log_summary(&session.store);
}

/// Remove a product.
pub fn remove(session: &mut CartSession, id: &str) {
    if session.store.remove_item(id).is_none() {
        info!(product_id = %id, "Product not in cart");
    }
    log_summary(&session.store);
}

/// Set a product's quantity.
pub fn update(session: &mut CartSession, id: &str, quantity: i64) {
    if session.store.get(id).is_none() {
        info!(product_id = %id, "Product not in cart");
        return;
    }
    session.store.update_quantity(id, quantity);
    log_summary(&session.store);
}

/// Empty the cart.
pub fn clear(session: &mut CartSession) {
    session.store.clear_cart();
}

/// Log every line and the subtotal.
pub fn show(session: &CartSession) {
    let view = session.store.view();
    if view.items.is_empty() {
        info!("Cart is empty");
        return;
    }

    info!("Cart");
    info!("====");
    for item in &view.items {
        info!(
            "  {} x {} ({}) = {}",
            item.quantity, item.name, item.price, item.line_price
        );
    }
    info!("Items: {}", view.item_count);
    info!("Subtotal: {}", view.subtotal);
}

/// Write a snapshot to `output`, or stdout when no file is given.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be encoded or written.
pub fn export(session: &CartSession, output: Option<&Path>) -> Result<(), CartCommandError> {
    let snapshot = session.store.export_cart();
    let json = serde_json::to_string_pretty(&snapshot)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            info!(path = %path.display(), items = snapshot.items.len(), "Cart exported");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}")?;
        }
    }
    Ok(())
}

/// Replace the cart with the snapshot in `file`.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not JSON, or does not hold
/// a valid cart. The existing cart is left untouched in the last two cases.
pub fn import(session: &mut CartSession, file: &Path) -> Result<(), CartCommandError> {
    let content = std::fs::read_to_string(file)?;
    let data: serde_json::Value = match serde_json::from_str(&content) {
        Ok(data) => data,
        Err(e) => {
            // Let the store reject it so the usual notification fires.
            session.store.import_cart(&serde_json::Value::Null);
            return Err(e.into());
        }
    };

    if !session.store.import_cart(&data) {
        return Err(CartCommandError::InvalidCart(file.display().to_string()));
    }
    log_summary(&session.store);
    Ok(())
}

/// Push the current cart to the host platform.
pub fn sync(session: &CartSession) {
    if !session.store.has_host_session() {
        warn!("Host sync is not configured; set MINICART_HOST_ENDPOINT and MINICART_HOST_USER_ID");
        return;
    }
    session.store.on_visibility_change(true);
    info!("Cart queued for host sync");
}

fn log_summary(store: &CartStore<FileStorage>) {
    info!(
        items = store.item_count(),
        total = %store.formatted_total(),
        "Cart updated"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    fn config_for(dir: &Path) -> CartConfig {
        CartConfig {
            storage_dir: dir.to_path_buf(),
            ..CartConfig::default()
        }
    }

    #[tokio::test]
    async fn test_commands_persist_between_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());

        let mut session = open(&config).unwrap();
        add(
            &mut session,
            "a".to_string(),
            "Widget".to_string(),
            Decimal::new(999, 2),
            None,
            2,
        );
        session.close().await;

        let mut session = open(&config).unwrap();
        assert_eq!(session.store.item_count(), 2);
        update(&mut session, "a", 5);
        assert_eq!(session.store.total(), Decimal::new(4995, 2));
        remove(&mut session, "a");
        assert!(session.store.is_empty());
        session.close().await;
    }

    #[tokio::test]
    async fn test_export_then_import_file() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot_path = dir.path().join("snapshot.json");

        let mut source = open(&config_for(&dir.path().join("source"))).unwrap();
        add(
            &mut source,
            "a".to_string(),
            "Widget".to_string(),
            Decimal::new(999, 2),
            Some("w.png".to_string()),
            3,
        );
        export(&source, Some(&snapshot_path)).unwrap();

        let mut target = open(&config_for(&dir.path().join("target"))).unwrap();
        import(&mut target, &snapshot_path).unwrap();
        assert_eq!(target.store.items(), source.store.items());

        source.close().await;
        target.close().await;
    }

    #[tokio::test]
    async fn test_import_rejects_non_cart_json() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"items":"not-an-array"}"#).unwrap();

        let mut session = open(&config_for(&dir.path().join("cart"))).unwrap();
        let err = import(&mut session, &bad).unwrap_err();
        assert!(matches!(err, CartCommandError::InvalidCart(_)));
        session.close().await;
    }

    #[tokio::test]
    async fn test_import_non_json_file_notifies_and_keeps_cart() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{oops").unwrap();

        let mut session = open(&config_for(&dir.path().join("cart"))).unwrap();
        add(
            &mut session,
            "a".to_string(),
            "Widget".to_string(),
            Decimal::new(999, 2),
            None,
            1,
        );
        let errors = Rc::new(Cell::new(0));
        let counter = Rc::clone(&errors);
        session.store.subscribe(move |event| {
            if matches!(event, CartEvent::Notification(n) if n.severity == Severity::Error) {
                counter.set(counter.get() + 1);
            }
        });

        let err = import(&mut session, &bad).unwrap_err();

        assert!(matches!(err, CartCommandError::Json(_)));
        assert_eq!(errors.get(), 1);
        assert_eq!(session.store.item_count(), 1);
        session.close().await;
    }

    #[tokio::test]
    async fn test_update_unknown_product_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = open(&config_for(dir.path())).unwrap();
        update(&mut session, "missing", 3);
        assert!(session.store.is_empty());
        session.close().await;
    }
}
