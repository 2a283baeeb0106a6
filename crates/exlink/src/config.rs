//! Client configuration.
//!
//! Credentials and connection settings are plain structs, deserializable
//! from a JSON config file so deployments can keep keys out of the code.
//!
//! # Example config (Binance sandbox)
//!
//! ```json
//! {
//!   "binance": {
//!     "api_key": "k",
//!     "api_secret": "s",
//!     "sandbox": true
//!   }
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::ExchangeError;

/// Top-level config file: one section per supported venue.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    pub binance: Option<BinanceConfig>,
    pub nash: Option<NashConfig>,
}

impl AppConfig {
    /// Parse a JSON config file.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, ExchangeError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ExchangeError::Io(e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| ExchangeError::Json(e.to_string()))
    }
}

/// Binance connection settings. Leave the credentials out for a
/// public-data-only client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BinanceConfig {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    /// Connect to the testnet instead of production.
    #[serde(default)]
    pub sandbox: bool,
}

impl BinanceConfig {
    /// A credential-less sandbox config, enough for market data.
    pub fn sandbox() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            sandbox: true,
        }
    }

    pub fn with_credentials(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            api_secret: Some(api_secret.into()),
            sandbox: false,
        }
    }
}

/// Nash connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct NashConfig {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub client_id: u64,
    #[serde(default)]
    pub environment: Environment,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    pub affiliate_code: Option<String>,
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for NashConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            client_id: 0,
            environment: Environment::default(),
            timeout_ms: default_timeout_ms(),
            affiliate_code: None,
        }
    }
}

/// Target network for venues that distinguish test and live deployments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Sandbox,
    Production,
}

impl Environment {
    pub(crate) fn to_raw(self) -> u32 {
        match self {
            Environment::Sandbox => exlink_sys::FfiEnvironment::Sandbox as u32,
            Environment::Production => exlink_sys::FfiEnvironment::Production as u32,
        }
    }
}
