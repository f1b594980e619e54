//! Gateway Configuration
//!
//! Defines the configuration schema for a single WAHA gateway endpoint.

use crate::error::{Result, WahaError};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Session used when none is configured
pub const DEFAULT_SESSION: &str = "default";

/// Max messages per 60-second window
pub const DEFAULT_RATE_LIMIT: u32 = 10;

/// Timeout for generic requests, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for one gateway endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the gateway, e.g. `http://localhost:3000`
    pub base_url: String,

    /// Optional environment variable overriding the base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url_env: Option<String>,

    /// API key sent as a bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the API key (used when `api_key` is unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// WhatsApp session name tracked by the gateway
    #[serde(default = "default_session", alias = "session_name")]
    pub session: String,

    /// Max messages admitted per 60-second window
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,

    /// Timeout for generic requests
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry policy for sends and webhook registration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Recipients used by notification fan-out when no target is given
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_recipients: Vec<String>,
}

/// Exponential backoff settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Delay before the first retry
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: f64,

    /// Growth factor between consecutive delays
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound for any single delay
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: f64,
}

fn default_session() -> String {
    DEFAULT_SESSION.to_string()
}

fn default_rate_limit() -> u32 {
    DEFAULT_RATE_LIMIT
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_attempts() -> u32 {
    3
}

fn default_initial_delay() -> f64 {
    1.0
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay() -> f64 {
    10.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            initial_delay_secs: default_initial_delay(),
            multiplier: default_multiplier(),
            max_delay_secs: default_max_delay(),
        }
    }
}

impl RetryConfig {
    /// Delay before the first retry. Values that do not fit a `Duration`
    /// read as zero; `validate` rejects them.
    pub fn initial_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.initial_delay_secs).unwrap_or_default()
    }

    /// Cap for any single delay, read like [`RetryConfig::initial_delay`]
    pub fn max_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.max_delay_secs).unwrap_or_default()
    }

    fn validate(&self) -> Result<()> {
        if self.attempts == 0 {
            return Err(WahaError::Config(
                "retry.attempts must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("retry.initial_delay_secs", self.initial_delay_secs),
            ("retry.max_delay_secs", self.max_delay_secs),
        ] {
            if Duration::try_from_secs_f64(value).is_err() {
                return Err(WahaError::Config(format!(
                    "{} must be a non-negative number of seconds, got {}",
                    name, value
                )));
            }
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(WahaError::Config(format!(
                "retry.multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }
        if self.max_delay_secs < self.initial_delay_secs {
            return Err(WahaError::Config(
                "retry.max_delay_secs must not be smaller than retry.initial_delay_secs"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

impl GatewayConfig {
    /// Create a configuration with defaults for everything but the URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            base_url_env: None,
            api_key: None,
            api_key_env: None,
            session: default_session(),
            rate_limit: DEFAULT_RATE_LIMIT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry: RetryConfig::default(),
            default_recipients: Vec::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = session.into();
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: u32) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_default_recipients(mut self, recipients: Vec<String>) -> Self {
        self.default_recipients = recipients;
        self
    }

    /// Get the effective base URL (from env var if configured, otherwise default)
    pub fn get_base_url(&self) -> String {
        if let Some(env_var) = &self.base_url_env {
            if let Ok(url) = std::env::var(env_var) {
                return url;
            }
        }
        self.base_url.clone()
    }

    /// Get the effective API key; an explicit key wins over the env var
    pub fn get_api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        self.api_key_env
            .as_ref()
            .and_then(|env_var| std::env::var(env_var).ok())
            .filter(|key| !key.is_empty())
    }

    /// Request timeout for generic calls
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve env overrides and check every field.
    ///
    /// The returned copy has the effective base URL (trailing slashes
    /// stripped) and API key baked in, so it no longer depends on the
    /// environment.
    pub fn validated(&self) -> Result<Self> {
        let raw_url = self.get_base_url();
        let base_url = raw_url.trim().trim_end_matches('/').to_string();

        let parsed = Url::parse(&base_url)
            .map_err(|e| WahaError::Config(format!("Invalid URL '{}': {}", raw_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(WahaError::Config(format!(
                "Invalid URL '{}': expected an http(s) address",
                raw_url
            )));
        }

        validate_session(&self.session)?;

        if self.rate_limit == 0 {
            return Err(WahaError::Config(
                "rate_limit must be at least 1 message per minute".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(WahaError::Config(
                "timeout_secs must be at least 1".to_string(),
            ));
        }

        self.retry.validate()?;

        Ok(Self {
            base_url,
            base_url_env: None,
            api_key: self.get_api_key(),
            api_key_env: None,
            session: self.session.clone(),
            rate_limit: self.rate_limit,
            timeout_secs: self.timeout_secs,
            retry: self.retry.clone(),
            default_recipients: self.default_recipients.clone(),
        })
    }
}

fn validate_session(session: &str) -> Result<()> {
    let valid = !session.is_empty()
        && session
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(WahaError::Config(format!(
            "Invalid session name '{}': use letters, digits, '-' or '_'",
            session
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{ "base_url": "http://localhost:3000" }"#;

        let config: GatewayConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.session, "default");
        assert_eq!(config.rate_limit, 10);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.retry, RetryConfig::default());
        assert!(config.api_key.is_none());
        assert!(config.default_recipients.is_empty());
    }

    #[test]
    fn test_deserialize_session_name_alias() {
        let json = r#"{
            "base_url": "http://waha:3000",
            "session_name": "home-assistant",
            "rate_limit": 5,
            "retry": { "attempts": 5 }
        }"#;

        let config: GatewayConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.session, "home-assistant");
        assert_eq!(config.rate_limit, 5);
        assert_eq!(config.retry.attempts, 5);
        assert_eq!(config.retry.multiplier, 2.0);
    }

    #[test]
    fn test_validated_strips_trailing_slash() {
        let config = GatewayConfig::new("http://localhost:3000//")
            .validated()
            .unwrap();
        assert_eq!(config.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_rejects_zero_rate_limit() {
        let err = GatewayConfig::new("http://localhost:3000")
            .with_rate_limit(0)
            .validated()
            .unwrap_err();
        assert!(matches!(err, WahaError::Config(_)));
    }

    #[test]
    fn test_rejects_bad_urls() {
        assert!(GatewayConfig::new("not a url").validated().is_err());
        assert!(GatewayConfig::new("ftp://example.com").validated().is_err());
        assert!(GatewayConfig::new("").validated().is_err());
    }

    #[test]
    fn test_rejects_bad_session() {
        assert!(GatewayConfig::new("http://localhost:3000")
            .with_session("")
            .validated()
            .is_err());
        assert!(GatewayConfig::new("http://localhost:3000")
            .with_session("a/b")
            .validated()
            .is_err());
    }

    #[test]
    fn test_rejects_bad_retry() {
        let base = GatewayConfig::new("http://localhost:3000");

        let zero_attempts = RetryConfig {
            attempts: 0,
            ..Default::default()
        };
        assert!(base.clone().with_retry(zero_attempts).validated().is_err());

        let shrinking = RetryConfig {
            multiplier: 0.5,
            ..Default::default()
        };
        assert!(base.clone().with_retry(shrinking).validated().is_err());

        let inverted = RetryConfig {
            initial_delay_secs: 5.0,
            max_delay_secs: 1.0,
            ..Default::default()
        };
        assert!(base.with_retry(inverted).validated().is_err());
    }

    #[test]
    fn test_rejects_delays_out_of_duration_range() {
        let base = GatewayConfig::new("http://localhost:3000");

        for bad in [1e20, f64::INFINITY, f64::NAN, -1.0] {
            let retry = RetryConfig {
                initial_delay_secs: bad,
                max_delay_secs: bad,
                ..Default::default()
            };
            assert_eq!(retry.initial_delay(), Duration::ZERO);
            assert_eq!(retry.max_delay(), Duration::ZERO);

            match base.clone().with_retry(retry).validated() {
                Err(WahaError::Config(msg)) => assert!(msg.contains("delay_secs")),
                other => panic!("{} accepted: {:?}", bad, other.map(|c| c.retry)),
            }
        }
    }

    #[test]
    fn test_api_key_resolution() {
        std::env::set_var("WAHA_BRIDGE_TEST_KEY_RESOLUTION", "from-env");

        let mut config = GatewayConfig::new("http://localhost:3000");
        config.api_key_env = Some("WAHA_BRIDGE_TEST_KEY_RESOLUTION".to_string());
        assert_eq!(config.get_api_key().as_deref(), Some("from-env"));

        let config = config.with_api_key("explicit");
        assert_eq!(config.get_api_key().as_deref(), Some("explicit"));

        let resolved = config.validated().unwrap();
        assert_eq!(resolved.api_key.as_deref(), Some("explicit"));
        assert!(resolved.api_key_env.is_none());
    }

    #[test]
    fn test_base_url_env_override() {
        std::env::set_var("WAHA_BRIDGE_TEST_BASE_URL", "http://override:3000/");

        let mut config = GatewayConfig::new("http://localhost:3000");
        config.base_url_env = Some("WAHA_BRIDGE_TEST_BASE_URL".to_string());

        let resolved = config.validated().unwrap();
        assert_eq!(resolved.base_url, "http://override:3000");
    }
}
