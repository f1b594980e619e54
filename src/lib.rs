//! WAHA Bridge
//!
//! Outbound dispatch client for a self-hosted WAHA WhatsApp HTTP gateway,
//! with a sliding-window rate limiter, bounded exponential-backoff retries
//! and classified errors, plus the glue a home-automation host needs around
//! it: per-entry client registry, notification fan-out and inbound webhook
//! decoding.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod notify;
pub mod phone;
pub mod webhook;

pub use client::{RateLimiter, RetryPolicy, SessionState, SessionStatus, WahaClient};
pub use config::{BridgeConfig, ConfigLoader, GatewayConfig, RetryConfig};
pub use error::{Result, SendOutcome, WahaError};
pub use notify::{Delivery, MessageContent, NotificationService, TemplateRenderer};
pub use webhook::{decode_inbound, MessageReceived, WebhookError};

/// Registry of gateway clients keyed by configuration-entry id.
///
/// Built once at startup and passed explicitly to whatever needs a client.
/// [`WahaBridge::shutdown`] closes every client, waking tasks still waiting
/// for a rate-limit slot.
#[derive(Debug, Default)]
pub struct WahaBridge {
    clients: RwLock<HashMap<String, Arc<WahaClient>>>,
}

impl WahaBridge {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from the default configuration locations
    pub fn load() -> Result<Self> {
        let loader = ConfigLoader::new()?;
        Self::from_config(loader.into_config())
    }

    /// Create a registry from a specific config file
    pub fn with_config_path(path: impl AsRef<Path>) -> Result<Self> {
        let loader = ConfigLoader::from_path(path)?;
        Self::from_config(loader.into_config())
    }

    /// Build one client per entry; fails on the first invalid entry
    pub fn from_config(config: BridgeConfig) -> Result<Self> {
        let mut clients = HashMap::with_capacity(config.entries.len());

        for (entry_id, gateway) in config.entries {
            let client = WahaClient::new(gateway).map_err(|e| match e {
                WahaError::Config(msg) => {
                    WahaError::Config(format!("entry '{}': {}", entry_id, msg))
                }
                other => other,
            })?;
            clients.insert(entry_id, Arc::new(client));
        }

        info!(entries = clients.len(), "Gateway clients ready");
        Ok(Self {
            clients: RwLock::new(clients),
        })
    }

    /// Add or replace the client for `entry_id`; a replaced client is closed
    pub fn insert(
        &self,
        entry_id: impl Into<String>,
        config: GatewayConfig,
    ) -> Result<Arc<WahaClient>> {
        let entry_id = entry_id.into();
        let client = Arc::new(WahaClient::new(config)?);

        let previous = self.clients.write().insert(entry_id.clone(), client.clone());
        if let Some(previous) = previous {
            info!(entry = %entry_id, "Replacing gateway client");
            previous.close();
        }

        Ok(client)
    }

    /// Remove and close the client for `entry_id`
    pub fn remove(&self, entry_id: &str) -> Option<Arc<WahaClient>> {
        let removed = self.clients.write().remove(entry_id);
        if let Some(client) = &removed {
            client.close();
        }
        removed
    }

    /// Client for `entry_id`
    pub fn client(&self, entry_id: &str) -> Option<Arc<WahaClient>> {
        self.clients.read().get(entry_id).cloned()
    }

    /// Registered entry ids
    pub fn entries(&self) -> Vec<String> {
        self.clients.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }

    /// Send through the client registered for `entry_id`
    pub async fn send(&self, entry_id: &str, recipient: &str, text: &str) -> SendOutcome {
        let client = self.client(entry_id).ok_or_else(|| {
            warn!(entry = entry_id, "No configured WAHA gateway found");
            WahaError::EntryNotFound(entry_id.to_string())
        })?;

        client.send_message(recipient, text).await
    }

    /// Connection status of an entry, as reported by its gateway
    pub async fn session_status(&self, entry_id: &str) -> Option<SessionStatus> {
        let client = self.client(entry_id)?;
        client.session_status().await
    }

    /// Point the entry's gateway at this host's inbound webhook route.
    ///
    /// `external_url` is the host's externally reachable base URL; the
    /// registered URL is `{external_url}/api/webhook/{webhook_id}` and is
    /// returned on success.
    pub async fn register_webhook(&self, entry_id: &str, external_url: &str) -> Result<String> {
        let client = self
            .client(entry_id)
            .ok_or_else(|| WahaError::EntryNotFound(entry_id.to_string()))?;

        let url = format!(
            "{}/api/webhook/{}",
            external_url.trim_end_matches('/'),
            webhook::webhook_id(entry_id)
        );
        client.register_webhook(&url).await?;
        Ok(url)
    }

    /// Resolve an inbound webhook id to its registered entry
    pub fn webhook_entry<'a>(
        &self,
        webhook_id: &'a str,
    ) -> std::result::Result<&'a str, WebhookError> {
        webhook::entry_id_from_webhook_id(webhook_id)
            .filter(|entry_id| self.clients.read().contains_key(*entry_id))
            .ok_or_else(|| {
                warn!(webhook_id, "Rejected webhook request for unknown entry");
                WebhookError::UnknownWebhook(webhook_id.to_string())
            })
    }

    /// Decode an inbound delivery addressed to `webhook_id`
    pub fn handle_inbound(
        &self,
        webhook_id: &str,
        payload: &[u8],
    ) -> std::result::Result<MessageReceived, WebhookError> {
        self.webhook_entry(webhook_id)?;
        decode_inbound(payload)
    }

    /// Close every client and empty the registry
    pub fn shutdown(&self) {
        let clients: Vec<_> = self.clients.write().drain().collect();
        for (entry_id, client) in &clients {
            client.close();
            info!(entry = %entry_id, "Gateway client closed");
        }
    }
}
