//! Gateway Dispatch Client
//!
//! Async HTTP client for the WAHA REST API with local rate limiting, retry
//! and error classification.

use crate::client::rate_limiter::RateLimiter;
use crate::client::retry::RetryPolicy;
use crate::client::session::SessionStatus;
use crate::config::GatewayConfig;
use crate::error::{Result, SendOutcome, WahaError};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Timeout for the version/health check
pub const CONNECTION_TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for message sends and webhook registration
pub const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// How much of a response body is kept in parse errors
const BODY_PREVIEW_LEN: usize = 500;

#[derive(Debug, Serialize)]
struct SendTextPayload<'a> {
    session: &'a str,
    #[serde(rename = "chatId")]
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    webhook: &'a str,
    session: &'a str,
}

#[derive(Debug, Serialize)]
struct SessionPayload<'a> {
    session: &'a str,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct QrResponse {
    qr: String,
}

/// Client for one gateway endpoint.
///
/// Owns its validated configuration and its rate-limit window. Ordinary
/// failures come back as classified errors or `None`/`false`; nothing here
/// panics on a bad response.
#[derive(Debug)]
pub struct WahaClient {
    /// Inner reqwest client, pooled and shared by every request
    client: Client,

    /// Validated, immutable configuration
    config: GatewayConfig,

    /// Outbound admission gate
    rate_limiter: Arc<RateLimiter>,

    /// Retry schedule for sends and webhook registration
    retry: RetryPolicy,

    /// Per-attempt timeout for sends and webhook registration
    send_timeout: Duration,
}

impl WahaClient {
    /// Validate `config` and build a client for it
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let config = config.validated()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(api_key) = &config.api_key {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| WahaError::Config(format!("Invalid API key format: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(CONNECTION_TEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| WahaError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit)?);
        let retry = RetryPolicy::from(&config.retry);

        Ok(Self {
            client,
            config,
            rate_limiter,
            retry,
            send_timeout: SEND_TIMEOUT,
        })
    }

    /// Override the per-attempt timeout for sends and webhook registration
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// The validated configuration
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Get the rate limiter
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Retry schedule applied to sends and webhook registration
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Check the gateway answers the version endpoint with a version string
    pub async fn test_connection(&self) -> bool {
        let url = self.url("/api/version");

        match self
            .get_once::<VersionResponse>("/api/version", &[], CONNECTION_TEST_TIMEOUT)
            .await
        {
            Ok(response) => {
                debug!(url = %url, version = %response.version, "Gateway reachable");
                true
            }
            Err(e) => {
                error!(url = %url, error = %e, "Gateway connection test failed");
                false
            }
        }
    }

    /// Send a text message to `chat_id`.
    ///
    /// Waits for a rate-limit slot first. The slot is consumed for the whole
    /// logical send, retries included, and is not refunded on failure.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> SendOutcome {
        if let Err(e) = self.rate_limiter.acquire().await {
            error!(recipient = chat_id, error = %e, "Message not sent");
            return Err(e);
        }

        let payload = SendTextPayload {
            session: &self.config.session,
            chat_id,
            text,
        };

        let result = self
            .retry
            .run(
                || self.post_once("/api/sendText", &payload, self.send_timeout),
                WahaError::is_retryable,
            )
            .await;

        match &result {
            Ok(()) => debug!(recipient = chat_id, "Message sent"),
            Err(e) => error!(
                recipient = chat_id,
                status = ?e.status(),
                error = %e,
                "Error sending message"
            ),
        }
        result
    }

    /// Register `webhook_url` for inbound messages on this session.
    ///
    /// Retried like a send, but does not take a rate-limit slot.
    pub async fn register_webhook(&self, webhook_url: &str) -> Result<()> {
        self.ensure_open()?;

        let payload = WebhookPayload {
            webhook: webhook_url,
            session: &self.config.session,
        };

        let result = self
            .retry
            .run(
                || self.post_once("/api/setWebhook", &payload, self.send_timeout),
                WahaError::is_retryable,
            )
            .await;

        match &result {
            Ok(()) => info!(webhook = webhook_url, "Webhook registered"),
            Err(e) => error!(
                webhook = webhook_url,
                status = ?e.status(),
                error = %e,
                "Error registering webhook"
            ),
        }
        result
    }

    /// Current session status, or `None` on any failure
    pub async fn session_status(&self) -> Option<SessionStatus> {
        if self.is_closed() {
            return None;
        }

        let path = format!("/api/sessions/{}", self.config.session);
        match self
            .get_once::<StatusResponse>(&path, &[], self.config.timeout())
            .await
        {
            Ok(response) => Some(SessionStatus::new(response.status)),
            Err(e) => {
                warn!(endpoint = %path, error = %e, "Failed to fetch session status");
                None
            }
        }
    }

    /// QR code for pairing the session, or `None` on any failure
    pub async fn qr_code(&self) -> Option<String> {
        if self.is_closed() {
            return None;
        }

        let query = [("session", self.config.session.as_str())];
        match self
            .get_once::<QrResponse>("/api/sessions/qr", &query, self.config.timeout())
            .await
        {
            Ok(response) => Some(response.qr),
            Err(e) => {
                warn!(endpoint = "/api/sessions/qr", error = %e, "Failed to fetch QR code");
                None
            }
        }
    }

    /// Log the session out of WhatsApp
    pub async fn logout(&self) -> bool {
        if self.is_closed() {
            return false;
        }

        let payload = SessionPayload {
            session: &self.config.session,
        };
        match self
            .post_once("/api/sessions/logout", &payload, self.config.timeout())
            .await
        {
            Ok(()) => {
                info!(session = %self.config.session, "Session logged out");
                true
            }
            Err(e) => {
                warn!(session = %self.config.session, error = %e, "Logout failed");
                false
            }
        }
    }

    /// Stop admitting sends and wake any task waiting for a slot
    pub fn close(&self) {
        self.rate_limiter.close();
    }

    /// Whether [`WahaClient::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.rate_limiter.is_closed()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(WahaError::Closed)
        } else {
            Ok(())
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Single POST attempt, classified
    async fn post_once<T: Serialize>(
        &self,
        path: &str,
        body: &T,
        timeout: Duration,
    ) -> Result<()> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .timeout(timeout)
            .send()
            .await?;

        check_status(response).await.map(|_| ())
    }

    /// Single GET attempt, classified and decoded
    async fn get_once<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<R> {
        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .timeout(timeout)
            .send()
            .await?;

        let body = check_status(response).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            WahaError::Response(format!(
                "Failed to parse response: {}. Body: {}",
                e,
                preview(&body)
            ))
        })
    }
}

/// Pass 2xx responses through, turn anything else into a classified error.
///
/// Every 2xx counts as success, not only 200: some gateway versions answer
/// `201 Created` to `sendText`, and retrying a delivered message would send
/// it twice.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status.as_u16(), body))
}

/// Map a non-success status and its body to an error
pub fn classify_status(status: u16, body: String) -> WahaError {
    match status {
        401 => WahaError::Auth(if body.is_empty() {
            "gateway answered 401".to_string()
        } else {
            body
        }),
        429 => WahaError::RateLimited(if body.is_empty() {
            "gateway answered 429".to_string()
        } else {
            body
        }),
        _ => WahaError::Api { status, body },
    }
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(BODY_PREVIEW_LEN) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
