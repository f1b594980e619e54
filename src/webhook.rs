//! Inbound Webhook Decoding
//!
//! Webhook-id scheme and payload decoding for messages the gateway pushes
//! back. Serving the HTTP route is left to the host platform.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

/// Event type fired for every inbound message
pub const EVENT_MESSAGE_RECEIVED: &str = "waha_message_received";

const WEBHOOK_ID_PREFIX: &str = "waha_";
const WEBHOOK_ID_SUFFIX: &str = "_webhook";

/// Why an inbound delivery was rejected
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("unknown webhook id: {0}")]
    UnknownWebhook(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

impl WebhookError {
    /// HTTP status the route should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            WebhookError::UnknownWebhook(_) => 403,
            WebhookError::InvalidPayload(_) | WebhookError::MissingField(_) => 400,
        }
    }
}

/// Webhook id for a configuration entry
pub fn webhook_id(entry_id: &str) -> String {
    format!("{}{}{}", WEBHOOK_ID_PREFIX, entry_id, WEBHOOK_ID_SUFFIX)
}

/// Configuration entry a webhook id belongs to, if it follows the scheme
pub fn entry_id_from_webhook_id(webhook_id: &str) -> Option<&str> {
    webhook_id
        .strip_prefix(WEBHOOK_ID_PREFIX)?
        .strip_suffix(WEBHOOK_ID_SUFFIX)
        .filter(|entry_id| !entry_id.is_empty())
}

/// Raw payload as posted by the gateway
#[derive(Debug, Clone, Deserialize)]
struct InboundPayload {
    sender: Option<String>,
    body: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    timestamp: Option<DateTime<Utc>>,
    session: Option<String>,
    id: Option<String>,
}

/// Event forwarded to the host platform for each inbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageReceived {
    pub sender: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl MessageReceived {
    pub fn event_type(&self) -> &'static str {
        EVENT_MESSAGE_RECEIVED
    }
}

/// Decode an inbound delivery body.
///
/// `sender` and `body` are required; everything else is optional.
pub fn decode_inbound(payload: &[u8]) -> Result<MessageReceived, WebhookError> {
    let raw: InboundPayload = serde_json::from_slice(payload).map_err(|e| {
        warn!(error = %e, "Failed to parse webhook payload");
        WebhookError::InvalidPayload(e.to_string())
    })?;

    let sender = raw.sender.ok_or(WebhookError::MissingField("sender"))?;
    let message = raw.body.ok_or(WebhookError::MissingField("body"))?;

    let event = MessageReceived {
        sender,
        message,
        timestamp: raw.timestamp,
        session: raw.session,
        message_id: raw.id,
    };
    debug!(
        sender = %event.sender,
        message_id = ?event.message_id,
        "Received WhatsApp webhook"
    );
    Ok(event)
}

/// Accept unix seconds (integer or float) or an RFC 3339 string
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(i64),
        Fractional(f64),
        Text(String),
    }

    let raw = Option::<Raw>::deserialize(deserializer)?;
    let parsed = match raw {
        None => None,
        Some(Raw::Seconds(secs)) => Utc.timestamp_opt(secs, 0).single(),
        Some(Raw::Fractional(secs)) => {
            let nanos = (secs.fract() * 1e9) as u32;
            Utc.timestamp_opt(secs.trunc() as i64, nanos).single()
        }
        Some(Raw::Text(text)) => DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                text.parse::<i64>()
                    .ok()
                    .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            }),
    };

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_id_round_trip() {
        let id = webhook_id("entryid123");
        assert_eq!(id, "waha_entryid123_webhook");
        assert_eq!(entry_id_from_webhook_id(&id), Some("entryid123"));
    }

    #[test]
    fn test_entry_id_rejects_foreign_ids() {
        assert_eq!(entry_id_from_webhook_id("invalid_entryid123_webhook"), None);
        assert_eq!(entry_id_from_webhook_id("waha_entryid123"), None);
        assert_eq!(entry_id_from_webhook_id("waha__webhook"), None);
    }

    #[test]
    fn test_decode_full_payload() {
        let payload = br#"{
            "sender": "+1234567890",
            "body": "Hello!",
            "timestamp": "2023-01-01T12:00:00Z",
            "session": "default",
            "id": "msgid123"
        }"#;

        let event = decode_inbound(payload).unwrap();
        assert_eq!(event.sender, "+1234567890");
        assert_eq!(event.message, "Hello!");
        assert_eq!(
            event.timestamp,
            Some(Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(event.session.as_deref(), Some("default"));
        assert_eq!(event.message_id.as_deref(), Some("msgid123"));
        assert_eq!(event.event_type(), "waha_message_received");
    }

    #[test]
    fn test_decode_unix_timestamp() {
        let event =
            decode_inbound(br#"{"sender":"a","body":"b","timestamp":1672574400}"#).unwrap();
        assert_eq!(
            event.timestamp,
            Some(Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        let err = decode_inbound(br#"{"sender":"+1234567890"}"#).unwrap_err();
        assert!(matches!(err, WebhookError::MissingField("body")));
        assert_eq!(err.status_code(), 400);

        let err = decode_inbound(br#"{"body":"hi"}"#).unwrap_err();
        assert!(matches!(err, WebhookError::MissingField("sender")));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_inbound(b"not json").unwrap_err();
        assert!(matches!(err, WebhookError::InvalidPayload(_)));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_event_serialization() {
        let event = decode_inbound(br#"{"sender":"a","body":"b","id":"x"}"#).unwrap();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "sender": "a", "message": "b", "message_id": "x" })
        );
    }
}
