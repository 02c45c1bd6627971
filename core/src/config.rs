//! Client construction options.

use serde::{Deserialize, Serialize};

use crate::http::TransportOptions;

pub const DEFAULT_HOST: &str = "https://api.ninoxdb.de/v1";

/// Environment variable conventionally holding the API key.
pub const API_KEY_ENV: &str = "NINOX_API_KEY";
pub const HOST_ENV: &str = "NINOX_HOST";
pub const VERSION_ENV: &str = "NINOX_API_VERSION";

/// Options recognised by `NinoxClient::new`.
///
/// Missing fields fall back to their defaults when deserialized, so a config
/// file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    pub host: String,
    /// Prefix inserted between the host and every path.
    pub version: Option<String>,
    pub transport: TransportOptions,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            version: None,
            transport: TransportOptions::default(),
        }
    }
}

impl ClientOptions {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn transport(mut self, transport: TransportOptions) -> Self {
        self.transport = transport;
        self
    }

    /// Defaults overridden by `NINOX_HOST` and `NINOX_API_VERSION` when set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::default();
        if let Some(host) = lookup(HOST_ENV).filter(|h| !h.is_empty()) {
            options.host = host;
        }
        options.version = lookup(VERSION_ENV).filter(|v| !v.is_empty());
        options
    }
}
