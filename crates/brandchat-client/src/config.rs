use std::time::Duration;

use crate::errors::ClientError;

const DEFAULT_STREAM_PATH: &str = "/api/chat/stream";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for the chat backend client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the backend (scheme and host, optional path prefix).
    pub base_url: String,
    /// Path of the streaming query endpoint, relative to `base_url`.
    pub stream_path: String,
    /// Overall timeout for one exchange.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Creates a config with default path and timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            stream_path: DEFAULT_STREAM_PATH.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Builds a config from `BRANDCHAT_API_URL`, `BRANDCHAT_STREAM_PATH` and
    /// `BRANDCHAT_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClientError> {
        let base_url = lookup("BRANDCHAT_API_URL").unwrap_or_default();
        let config = Self::new(base_url).with_env_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `BRANDCHAT_STREAM_PATH` and `BRANDCHAT_TIMEOUT_SECS` from
    /// `lookup` on top of this config. The base URL is left untouched.
    pub fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ClientError> {
        if let Some(path) = lookup("BRANDCHAT_STREAM_PATH")
            && !path.trim().is_empty()
        {
            self = self.stream_path(path.trim());
        }
        if let Some(raw) = lookup("BRANDCHAT_TIMEOUT_SECS") {
            let secs = raw.trim().parse::<u64>().map_err(|e| {
                ClientError::Config(format!("invalid BRANDCHAT_TIMEOUT_SECS {raw:?}: {e}"))
            })?;
            self = self.timeout(Duration::from_secs(secs));
        }
        Ok(self)
    }

    /// Overrides the streaming endpoint path.
    pub fn stream_path(mut self, path: impl Into<String>) -> Self {
        self.stream_path = path.into();
        self
    }

    /// Overrides the exchange timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks that the base URL is set and the timeout is non-zero.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.base_url.trim().is_empty() {
            return Err(ClientError::Config(
                "missing BRANDCHAT_API_URL for chat client".into(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ClientError::Config("timeout must be greater than 0".into()));
        }
        Ok(())
    }

    pub(crate) fn stream_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.stream_path.trim_start_matches('/')
        )
    }
}
