//! Transport configuration

use crate::error::HttpError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP transport settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Server root, e.g. `https://apps.example.com/api`
    pub base_url: String,
    /// Per-request timeout
    pub timeout_ms: u64,
    /// Bearer token sent as `Authorization`
    pub bearer_token: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_ms: 10_000,
            bearer_token: None,
        }
    }
}

impl HttpConfig {
    /// Config for a server root
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// With request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With bearer token
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Request timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Base URL without trailing slash
    ///
    /// # Errors
    /// [`HttpError::InvalidBaseUrl`] unless it starts with `http://` or `https://`.
    pub fn normalized_base(&self) -> Result<String, HttpError> {
        let base = self.base_url.trim().trim_end_matches('/');
        let has_host = base
            .strip_prefix("https://")
            .or_else(|| base.strip_prefix("http://"))
            .is_some_and(|rest| !rest.is_empty());
        if !has_host {
            return Err(HttpError::InvalidBaseUrl(self.base_url.clone()));
        }
        Ok(base.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let config = HttpConfig::new("https://apps.example.com/api/ ");
        assert_eq!(config.normalized_base().unwrap(), "https://apps.example.com/api");
    }

    #[test]
    fn rejects_non_http_base() {
        assert!(HttpConfig::new("ftp://x").normalized_base().is_err());
        assert!(HttpConfig::new("https://").normalized_base().is_err());
        assert!(HttpConfig::new("").normalized_base().is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: HttpConfig =
            serde_json::from_str(r#"{"base_url": "http://h", "bearer_token": "t"}"#).unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.bearer_token.as_deref(), Some("t"));
    }
}
