//! IMAP connection configuration

use crate::error::{Error, Result};
use serde::Deserialize;
use std::env;

const DEFAULT_TLS_PORT: u16 = 993;
const DEFAULT_PLAIN_PORT: u16 = 143;

/// Connection options for a [`Fetcher`](crate::Fetcher).
///
/// Deserializes from the usual option object:
///
/// ```
/// use imap_fetcher::FetcherConfig;
///
/// let config = FetcherConfig::from_value(&serde_json::json!({
///     "user": "me@example.com",
///     "password": "secret",
///     "host": "imap.example.com",
///     "port": 993,
///     "tls": true,
///     "tlsOptions": { "rejectUnauthorized": false }
/// }))
/// .unwrap();
/// assert!(!config.tls_options.reject_unauthorized);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetcherConfig {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Implicit TLS when set, STARTTLS over a plain connection otherwise.
    #[serde(default = "default_true")]
    pub tls: bool,
    #[serde(default)]
    pub tls_options: TlsOptions,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsOptions {
    /// Verify the server certificate against the web PKI roots.
    #[serde(default = "default_true")]
    pub reject_unauthorized: bool,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            reject_unauthorized: true,
        }
    }
}

const fn default_true() -> bool {
    true
}

impl FetcherConfig {
    /// Build a configuration from a JSON option object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`] if `value` is not an object, if a
    /// recognized option has the wrong type, or if `host` or `user` is
    /// empty.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::Argument("options must be an object".to_string()));
        }
        let config: Self = serde_json::from_value(value.clone())
            .map_err(|e| Error::Argument(format!("invalid options: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Reads from `.env` file if present. Required variables:
    /// - `IMAP_USER`
    /// - `IMAP_PASSWORD`
    ///
    /// Optional (with defaults):
    /// - `IMAP_HOST` (default: `127.0.0.1`)
    /// - `IMAP_PORT` (default: `993` with TLS, `143` without)
    /// - `IMAP_TLS` (default: `true`)
    /// - `IMAP_REJECT_UNAUTHORIZED` (default: `true`)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            host: env::var("IMAP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("IMAP_PORT")
                .ok()
                .map(|p| p.parse::<u16>())
                .transpose()
                .map_err(|e| Error::Config(format!("Invalid IMAP_PORT: {e}")))?,
            user: env::var("IMAP_USER").map_err(|_| Error::Config("IMAP_USER not set".into()))?,
            password: env::var("IMAP_PASSWORD")
                .map_err(|_| Error::Config("IMAP_PASSWORD not set".into()))?,
            tls: env_flag("IMAP_TLS")?.unwrap_or(true),
            tls_options: TlsOptions {
                reject_unauthorized: env_flag("IMAP_REJECT_UNAUTHORIZED")?.unwrap_or(true),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// The port to connect to, defaulting on the security mode.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(if self.tls {
            DEFAULT_TLS_PORT
        } else {
            DEFAULT_PLAIN_PORT
        })
    }

    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Argument("host must not be empty".into()));
        }
        if self.user.trim().is_empty() {
            return Err(Error::Argument("user must not be empty".into()));
        }
        Ok(())
    }
}

fn env_flag(name: &str) -> Result<Option<bool>> {
    let Ok(raw) = env::var(name) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(Some(true)),
        "0" | "false" | "no" => Ok(Some(false)),
        other => Err(Error::Config(format!("Invalid {name}: {other}"))),
    }
}
