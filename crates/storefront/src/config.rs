//! Cart configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `MINICART_STORAGE_DIR` - Directory for file-backed storage (default: .minicart)
//! - `MINICART_STORAGE_KEY` - Key the cart is persisted under (default: cart)
//! - `MINICART_STORAGE_QUOTA_BYTES` - Reject writes beyond this many bytes
//! - `MINICART_CURRENCY` - Display currency code (default: USD)
//! - `MINICART_HOST_ENDPOINT` - Host platform URL receiving cart updates
//! - `MINICART_HOST_TOKEN` - Bearer token for the host endpoint
//! - `MINICART_HOST_USER_ID` - Host-assigned user id of the current session
//! - `MINICART_LOG_FORMAT` - `pretty` or `json` (default: pretty)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//!
//! Host sync is enabled only when both `MINICART_HOST_ENDPOINT` and
//! `MINICART_HOST_USER_ID` are set.

use std::path::PathBuf;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use minicart_core::{CurrencyCode, HostUserId};

use crate::telemetry::LogFormat;

/// Default key the cart is stored under.
pub const DEFAULT_STORAGE_KEY: &str = "cart";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart application configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Directory used by file-backed storage
    pub storage_dir: PathBuf,
    /// Key the cart is persisted under
    pub storage_key: String,
    /// Optional write quota in bytes
    pub storage_quota: Option<usize>,
    /// Display currency
    pub currency: CurrencyCode,
    /// Host platform sync, if configured
    pub host: Option<HostConfig>,
    /// Log output format
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Host platform endpoint and session.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct HostConfig {
    /// URL receiving `cart_update` messages
    pub endpoint: Url,
    /// Optional bearer token
    pub token: Option<SecretString>,
    /// Host-assigned user id of the current session
    pub user_id: HostUserId,
}

impl std::fmt::Debug for HostConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("user_id", &self.user_id)
            .finish()
    }
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(".minicart"),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            storage_quota: None,
            currency: CurrencyCode::default(),
            host: None,
            log_format: LogFormat::default(),
            sentry_dsn: None,
        }
    }
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);
        let defaults = Self::default();

        let storage_dir = env
            .optional("MINICART_STORAGE_DIR")
            .map_or(defaults.storage_dir, PathBuf::from);
        let storage_key = env.or_default("MINICART_STORAGE_KEY", DEFAULT_STORAGE_KEY);
        let storage_quota = env.parse_optional::<usize>("MINICART_STORAGE_QUOTA_BYTES")?;
        let currency = env
            .parse_optional::<CurrencyCode>("MINICART_CURRENCY")?
            .unwrap_or_default();
        let log_format = env
            .parse_optional::<LogFormat>("MINICART_LOG_FORMAT")?
            .unwrap_or_default();
        let host = HostConfig::from_env(&env)?;
        let sentry_dsn = env.optional("SENTRY_DSN");

        Ok(Self {
            storage_dir,
            storage_key,
            storage_quota,
            currency,
            host,
            log_format,
            sentry_dsn,
        })
    }
}

impl HostConfig {
    fn from_env(env: &Env<'_>) -> Result<Option<Self>, ConfigError> {
        let endpoint = env.parse_optional::<Url>("MINICART_HOST_ENDPOINT")?;
        let user_id = env.parse_optional::<HostUserId>("MINICART_HOST_USER_ID")?;

        match (endpoint, user_id) {
            (Some(endpoint), Some(user_id)) => {
                if !matches!(endpoint.scheme(), "http" | "https") {
                    return Err(ConfigError::InvalidEnvVar(
                        "MINICART_HOST_ENDPOINT".to_string(),
                        format!("unsupported scheme '{}'", endpoint.scheme()),
                    ));
                }
                Ok(Some(Self {
                    endpoint,
                    token: env.optional("MINICART_HOST_TOKEN").map(SecretString::from),
                    user_id,
                }))
            }
            (Some(_), None) => Err(ConfigError::MissingEnvVar(
                "MINICART_HOST_USER_ID".to_string(),
            )),
            // A user id without an endpoint is a session with nowhere to sync to.
            (None, _) => Ok(None),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Get an optional variable, treating blank values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse an optional variable.
    fn parse_optional<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key)
            .map(|raw| {
                raw.trim()
                    .parse::<T>()
                    .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
            })
            .transpose()
    }
}
