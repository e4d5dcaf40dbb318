//! Host platform bridge.
//!
//! When the widget runs inside a chat mini-app with an identified user, every
//! saved cart is forwarded to the host as a `cart_update` message. Delivery is
//! fire-and-forget: failures are logged and never retried.

use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use minicart_core::HostUserId;

use crate::config::HostConfig;
use crate::model::{LineItem, cart_item_count, cart_total};

/// Request timeout for a single delivery.
const DELIVERY_TIMEOUT_SECS: u64 = 10;

/// Errors that can occur when forwarding a cart to the host.
#[derive(Debug, Error)]
pub enum HostSyncError {
    /// Message could not be encoded.
    #[error("Serialize error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Host returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Bridge worker has shut down.
    #[error("host bridge is closed")]
    Closed,

    /// Bridge could not be configured.
    #[error("Config error: {0}")]
    Config(String),
}

/// Outbound cart snapshot for the host platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub user_id: HostUserId,
    pub items: Vec<LineItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub item_count: u64,
    pub updated_at: DateTime<Utc>,
}

impl HostMessage {
    /// Message type understood by the host.
    pub const CART_UPDATE: &'static str = "cart_update";

    /// Build a `cart_update` message for `user_id`.
    #[must_use]
    pub fn cart_update(user_id: HostUserId, items: &[LineItem], updated_at: DateTime<Utc>) -> Self {
        Self {
            kind: Self::CART_UPDATE,
            user_id,
            items: items.to_vec(),
            total: cart_total(items),
            item_count: cart_item_count(items),
            updated_at,
        }
    }
}

/// Something that can hand a message to the host platform.
///
/// Implementations must not block the caller on delivery.
pub trait HostBridge {
    /// Hand off a message.
    ///
    /// # Errors
    ///
    /// Returns `HostSyncError` if the message could not be handed off.
    fn send(&self, message: &HostMessage) -> Result<(), HostSyncError>;
}

/// Bridge that POSTs messages as JSON to an HTTP endpoint.
///
/// `send` only enqueues; a background tokio task performs delivery.
#[derive(Debug, Clone)]
pub struct HttpHostBridge {
    tx: mpsc::UnboundedSender<String>,
}

impl HttpHostBridge {
    /// Start the delivery worker on the current tokio runtime.
    ///
    /// Returns the bridge and the worker handle. The worker exits once every
    /// clone of the bridge has been dropped and the queue is drained.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn spawn(config: &HostConfig) -> Result<(Self, JoinHandle<()>), HostSyncError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &config.token {
            let auth_value = format!("Bearer {}", token.expose_secret());
            let mut value = HeaderValue::from_str(&auth_value)
                .map_err(|e| HostSyncError::Config(format!("Invalid token format: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(DELIVERY_TIMEOUT_SECS))
            .build()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let endpoint = config.endpoint.clone();
        let worker = tokio::spawn(deliver_all(client, endpoint, rx));

        Ok((Self { tx }, worker))
    }

    /// Drop this handle and wait until the worker has delivered the queue.
    ///
    /// The worker only stops once every other clone of the bridge is dropped
    /// too, so release the store holding one first.
    pub async fn shutdown(self, worker: JoinHandle<()>) {
        drop(self);
        if let Err(e) = worker.await {
            tracing::warn!(error = %e, "Host bridge worker did not shut down cleanly");
        }
    }
}

impl HostBridge for HttpHostBridge {
    fn send(&self, message: &HostMessage) -> Result<(), HostSyncError> {
        let body = serde_json::to_string(message)?;
        self.tx.send(body).map_err(|_| HostSyncError::Closed)
    }
}

async fn deliver_all(
    client: reqwest::Client,
    endpoint: url::Url,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    while let Some(body) = rx.recv().await {
        if let Err(e) = deliver(&client, &endpoint, body).await {
            let event_id = sentry::capture_error(&e);
            tracing::error!(
                error = %e,
                sentry_event_id = %event_id,
                endpoint = %endpoint,
                "Error syncing cart with host"
            );
        }
    }
    tracing::debug!("Host bridge worker stopped");
}

async fn deliver(
    client: &reqwest::Client,
    endpoint: &url::Url,
    body: String,
) -> Result<(), HostSyncError> {
    let response = client.post(endpoint.clone()).body(body).send().await?;
    let status = response.status();

    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(HostSyncError::Api {
            status: status.as_u16(),
            message,
        });
    }

    tracing::debug!(status = status.as_u16(), "Cart synced with host");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Product;

    fn sample_items() -> Vec<LineItem> {
        let product = Product::new("a", "Widget", Decimal::new(999, 2)).with_image("w.png");
        vec![LineItem::from_product(&product, 2, Utc::now())]
    }

    #[test]
    fn test_cart_update_wire_shape() {
        let updated_at = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let message = HostMessage::cart_update(HostUserId::new(42), &sample_items(), updated_at);
        let json = serde_json::to_value(&message).unwrap();

        let mut keys: Vec<&str> = json
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec!["item_count", "items", "total", "type", "updated_at", "user_id"]
        );
        assert_eq!(json["type"], "cart_update");
        assert_eq!(json["user_id"], 42);
        assert_eq!(json["total"], 19.98);
        assert_eq!(json["item_count"], 2);
        assert_eq!(json["updated_at"], "2024-05-01T12:00:00Z");
        assert!(json["items"][0]["addedAt"].is_string());
    }

    #[tokio::test]
    async fn test_http_bridge_send_does_not_wait_for_delivery() {
        // Port 9 (discard) is closed on test hosts; delivery fails and is logged.
        let config = HostConfig {
            endpoint: "http://127.0.0.1:9/cart".parse().unwrap(),
            token: Some(secrecy::SecretString::from("token-value")),
            user_id: HostUserId::new(1),
        };
        let (bridge, worker) = HttpHostBridge::spawn(&config).unwrap();

        let message = HostMessage::cart_update(HostUserId::new(1), &sample_items(), Utc::now());
        bridge.send(&message).unwrap();
        bridge.send(&message).unwrap();

        drop(bridge);
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_queued_deliveries() {
        let config = HostConfig {
            endpoint: "http://127.0.0.1:9/cart".parse().unwrap(),
            token: None,
            user_id: HostUserId::new(1),
        };
        let (bridge, worker) = HttpHostBridge::spawn(&config).unwrap();
        let clone = bridge.clone();

        let message = HostMessage::cart_update(HostUserId::new(1), &sample_items(), Utc::now());
        clone.send(&message).unwrap();
        drop(clone);

        let abort = worker.abort_handle();
        bridge.shutdown(worker).await;
        assert!(abort.is_finished());
    }

    #[tokio::test]
    async fn test_http_bridge_reports_closed_worker() {
        let config = HostConfig {
            endpoint: "http://127.0.0.1:9/cart".parse().unwrap(),
            token: None,
            user_id: HostUserId::new(1),
        };
        let (bridge, worker) = HttpHostBridge::spawn(&config).unwrap();
        worker.abort();
        let _ = worker.await;

        let message = HostMessage::cart_update(HostUserId::new(1), &[], Utc::now());
        assert!(matches!(bridge.send(&message), Err(HostSyncError::Closed)));
    }
}
