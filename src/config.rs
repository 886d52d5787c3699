use std::env;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Environment variable naming the backend WebSocket endpoint.
pub const WEBSOCKET_URL_VAR: &str = "WEBSOCKET_URL";
/// Environment variable for the response deadline, in whole seconds.
pub const RESPONSE_TIMEOUT_VAR: &str = "CHAT_RESPONSE_TIMEOUT_SECS";

/// Public echo service used when no endpoint is configured.
pub const DEFAULT_WEBSOCKET_URL: &str = "wss://echo.websocket.org";
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid endpoint URL '{value}': {source}")]
    InvalidUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported endpoint scheme '{0}', expected ws or wss")]
    UnsupportedScheme(String),

    #[error("invalid response timeout '{0}', expected a positive number of seconds")]
    InvalidTimeout(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    pub endpoint: Url,
    pub response_timeout: Duration,
}

impl ChatConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(
            env::var(WEBSOCKET_URL_VAR).ok(),
            env::var(RESPONSE_TIMEOUT_VAR).ok(),
        )
    }

    /// Empty values count as unset.
    pub fn from_vars(url: Option<String>, timeout: Option<String>) -> Result<Self, ConfigError> {
        let endpoint = match url.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => parse_endpoint(raw)?,
            _ => parse_endpoint(DEFAULT_WEBSOCKET_URL)?,
        };

        let response_timeout = match timeout.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => parse_timeout(raw)?,
            _ => DEFAULT_RESPONSE_TIMEOUT,
        };

        Ok(Self {
            endpoint,
            response_timeout,
        })
    }

    pub fn with_endpoint(mut self, raw: &str) -> Result<Self, ConfigError> {
        self.endpoint = parse_endpoint(raw)?;
        Ok(self)
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Result<Self, ConfigError> {
        if secs == 0 {
            return Err(ConfigError::InvalidTimeout(secs.to_string()));
        }
        self.response_timeout = Duration::from_secs(secs);
        Ok(self)
    }
}

pub fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
        value: raw.to_string(),
        source,
    })?;

    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
}

fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidTimeout(raw.to_string())),
    }
}
