//! WAHA Bridge Error Types
//!
//! Classified failures for gateway dispatch, configuration and inbound decoding.

/// Main error type for bridge operations
#[derive(Debug, thiserror::Error)]
pub enum WahaError {
    /// Configuration errors (invalid URL, zero rate limit, bad session name, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network-level failure: timeout, connection refused or reset
    #[error("Connection error: {0}")]
    Connection(String),

    /// Gateway rejected the credential (HTTP 401)
    #[error("Authentication failed: {0}. Check your API key.")]
    Auth(String),

    /// Gateway rejected the request with HTTP 429
    #[error("Rate limited by gateway: {0}")]
    RateLimited(String),

    /// Any other non-2xx response from the gateway
    #[error("Gateway returned status {status}: {body}")]
    Api { status: u16, body: String },

    /// Response body could not be decoded
    #[error("Response error: {0}")]
    Response(String),

    /// Message template could not be rendered
    #[error("Template error: {0}")]
    Template(String),

    /// Recipient could not be turned into a chat id
    #[error("Invalid phone number format: {0}")]
    InvalidRecipient(String),

    /// Message text was empty after rendering and trimming
    #[error("Cannot send an empty message")]
    EmptyMessage,

    /// No explicit targets and no default recipients configured
    #[error("No recipients provided and no default recipients configured")]
    NoRecipients,

    /// No client registered for a configuration entry
    #[error("No gateway configured for entry '{0}'")]
    EntryNotFound(String),

    /// The client was closed while the operation was pending
    #[error("Client closed")]
    Closed,
}

impl WahaError {
    /// Whether a retry of the same request may succeed.
    ///
    /// Authentication failures and server-side rate limiting are surfaced
    /// immediately; only transport failures and generic API errors are retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WahaError::Connection(_) | WahaError::Api { .. })
    }

    /// HTTP status carried by the error, if the gateway answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            WahaError::Auth(_) => Some(401),
            WahaError::RateLimited(_) => Some(429),
            WahaError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for WahaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            WahaError::Config(format!("Invalid request: {}", err))
        } else if err.is_decode() {
            WahaError::Response(format!("Failed to decode response: {}", err))
        } else if err.is_timeout() {
            WahaError::Connection(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            WahaError::Connection(format!("Connection failed: {}", err))
        } else {
            WahaError::Connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for WahaError {
    fn from(err: serde_json::Error) -> Self {
        WahaError::Response(format!("JSON parsing error: {}", err))
    }
}

impl From<std::io::Error> for WahaError {
    fn from(err: std::io::Error) -> Self {
        WahaError::Config(format!("IO error: {}", err))
    }
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, WahaError>;

/// Outcome of a single message send: success, or the classified failure
pub type SendOutcome = Result<()>;
