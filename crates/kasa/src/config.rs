//! Client configuration.

use std::time::Duration;

use crate::error::{Error, InvalidInputError};
use crate::types::ApiUrl;

/// Environment variable holding the API base URL.
pub const API_URL_ENV: &str = "KASA_API_URL";

/// Environment variable holding the transport timeout in seconds.
pub const TIMEOUT_ENV: &str = "KASA_TIMEOUT_SECS";

/// Transport timeout applied to every call, renewal included.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Endpoint paths and transport settings for a wallet API deployment.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: ApiUrl,
    pub login_path: String,
    pub refresh_path: String,
    pub register_path: String,
    pub timeout: Duration,
}

impl ClientConfig {
    /// Configuration for the given base URL with default endpoint paths.
    pub fn new(api_url: ApiUrl) -> Self {
        Self {
            api_url,
            ..Self::default()
        }
    }

    /// Build from `KASA_API_URL` and `KASA_TIMEOUT_SECS`, falling back to
    /// [`DEFAULT_API_URL`](crate::types::DEFAULT_API_URL) and 30 seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if either variable is set but unparseable.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(url) = lookup(API_URL_ENV) {
            config.api_url = ApiUrl::new(url)?;
        }

        if let Some(secs) = lookup(TIMEOUT_ENV) {
            let secs: u64 = secs.parse().map_err(|_| InvalidInputError::Other {
                message: format!("{} must be a whole number of seconds, got '{}'", TIMEOUT_ENV, secs),
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: ApiUrl::default(),
            login_path: "auth/login/".to_string(),
            refresh_path: "auth/token/refresh/".to_string(),
            register_path: "auth/register/".to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}
