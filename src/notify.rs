//! Notification Fan-out
//!
//! Resolves message content to plain text and delivers it to one or more
//! recipients through a [`WahaClient`].

use crate::client::WahaClient;
use crate::error::{Result, SendOutcome, WahaError};
use crate::phone::chat_id;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Message body as handed over by the host platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text, sent as-is
    Literal(String),

    /// Template expression rendered by a [`TemplateRenderer`]
    Template(String),
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Literal(text.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Literal(text)
    }
}

/// Renders template expressions to plain text
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str) -> Result<String>;
}

impl<F> TemplateRenderer for F
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    fn render(&self, template: &str) -> Result<String> {
        self(template)
    }
}

impl MessageContent {
    /// Resolve to plain text; templates need a renderer
    pub fn resolve(&self, renderer: Option<&dyn TemplateRenderer>) -> Result<String> {
        match self {
            MessageContent::Literal(text) => Ok(text.clone()),
            MessageContent::Template(template) => match renderer {
                Some(renderer) => renderer.render(template),
                None => Err(WahaError::Template(format!(
                    "no renderer available for template '{}'",
                    template
                ))),
            },
        }
    }
}

/// Result of delivering to one recipient
#[derive(Debug)]
pub struct Delivery {
    /// Recipient as given by the caller
    pub recipient: String,

    pub outcome: SendOutcome,
}

/// Sends notifications to explicit targets or configured default recipients
pub struct NotificationService {
    client: Arc<WahaClient>,
    default_recipients: Vec<String>,
    renderer: Option<Arc<dyn TemplateRenderer>>,
}

impl NotificationService {
    /// Create a service using the client's configured default recipients
    pub fn new(client: Arc<WahaClient>) -> Self {
        let default_recipients = client.config().default_recipients.clone();
        Self {
            client,
            default_recipients,
            renderer: None,
        }
    }

    pub fn with_default_recipients(mut self, recipients: Vec<String>) -> Self {
        self.default_recipients = recipients;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn default_recipients(&self) -> &[String] {
        &self.default_recipients
    }

    /// Deliver `content` to `targets`, or to the default recipients when
    /// `targets` is empty.
    ///
    /// Fails up front if the content cannot be rendered, renders to empty
    /// text, or there is nobody to send to. Otherwise returns one
    /// [`Delivery`] per recipient, in input order.
    pub async fn send(
        &self,
        content: &MessageContent,
        targets: &[String],
    ) -> Result<Vec<Delivery>> {
        let rendered = content.resolve(self.renderer.as_deref())?;
        let text = rendered.trim();
        if text.is_empty() {
            error!("Cannot send empty message");
            return Err(WahaError::EmptyMessage);
        }

        let recipients = if targets.is_empty() {
            self.default_recipients.as_slice()
        } else {
            targets
        };
        if recipients.is_empty() {
            error!("No recipients provided and no default recipients configured");
            return Err(WahaError::NoRecipients);
        }

        let deliveries = join_all(recipients.iter().map(|r| self.deliver(r, text))).await;

        let sent = deliveries.iter().filter(|d| d.outcome.is_ok()).count();
        info!(sent, total = deliveries.len(), "Notification delivered");
        Ok(deliveries)
    }

    async fn deliver(&self, recipient: &str, text: &str) -> Delivery {
        let outcome = match chat_id(recipient) {
            Some(chat_id) => self.client.send_message(&chat_id, text).await,
            None => {
                error!(recipient, "Invalid phone number format");
                Err(WahaError::InvalidRecipient(recipient.to_string()))
            }
        };

        Delivery {
            recipient: recipient.to_string(),
            outcome,
        }
    }
}
