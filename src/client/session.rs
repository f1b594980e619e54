//! Session Status
//!
//! Gateway-reported session state. The gateway owns the state machine; the
//! client only reports what it observes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse connection state of a WhatsApp session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Unknown,
    Connecting,
    Authenticated,
    Disconnected,
}

impl SessionState {
    /// Map a raw gateway status string
    pub fn from_gateway(status: &str) -> Self {
        match status.trim().to_ascii_uppercase().as_str() {
            "WORKING" | "AUTHENTICATED" | "CONNECTED" => SessionState::Authenticated,
            "STARTING" | "SCAN_QR_CODE" | "CONNECTING" => SessionState::Connecting,
            "STOPPED" | "FAILED" | "DISCONNECTED" => SessionState::Disconnected,
            _ => SessionState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Unknown => "unknown",
            SessionState::Connecting => "connecting",
            SessionState::Authenticated => "authenticated",
            SessionState::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session status as reported by the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    /// Status string exactly as the gateway sent it
    pub raw: String,

    /// Mapped state
    pub state: SessionState,
}

impl SessionStatus {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let state = SessionState::from_gateway(&raw);
        Self { raw, state }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_mapping() {
        assert_eq!(SessionState::from_gateway("WORKING"), SessionState::Authenticated);
        assert_eq!(SessionState::from_gateway("scan_qr_code"), SessionState::Connecting);
        assert_eq!(SessionState::from_gateway("STARTING"), SessionState::Connecting);
        assert_eq!(SessionState::from_gateway("FAILED"), SessionState::Disconnected);
        assert_eq!(SessionState::from_gateway("STOPPED"), SessionState::Disconnected);
        assert_eq!(SessionState::from_gateway("weird"), SessionState::Unknown);
    }

    #[test]
    fn test_status_keeps_raw_value() {
        let status = SessionStatus::new("WORKING");
        assert_eq!(status.raw, "WORKING");
        assert!(status.is_authenticated());
        assert_eq!(status.state.to_string(), "authenticated");
    }
}
