//! Webhook notifier.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use super::notifier::Notifier;
use super::{DeliveryError, DeliveryResult};
use crate::config::NotificationsConfig;
use crate::triage::Ticket;

/// Webhook authentication type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookAuth {
    None,
    Bearer { token: String },
}

/// Posts the ticket as JSON to the configured endpoint.
///
/// A 2xx response counts as delivered. Anything else, including a request
/// that outlives `timeout`, is a failed delivery.
pub struct WebhookNotifier {
    url: String,
    auth: WebhookAuth,
    timeout: Duration,
    client: Client,
}

impl WebhookNotifier {
    /// Create a new webhook notifier from config.
    pub fn new(config: &NotificationsConfig) -> Result<Self> {
        let auth = match config.auth_type.as_deref() {
            Some("bearer") => {
                let token_env = config.token_env.as_deref().unwrap_or("");
                let token = std::env::var(token_env).unwrap_or_default();
                if token.is_empty() && !token_env.is_empty() {
                    tracing::warn!(
                        env_var = token_env,
                        "Bearer token environment variable is not set or empty"
                    );
                }
                WebhookAuth::Bearer { token }
            }
            _ => WebhookAuth::None,
        };

        Self::with_auth(&config.url, auth, config.timeout())
    }

    pub fn with_auth(url: &str, auth: WebhookAuth, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build notification HTTP client")?;

        Ok(Self {
            url: url.to_string(),
            auth,
            timeout,
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn classify_error(&self, err: &reqwest::Error) -> DeliveryError {
        if err.is_timeout() {
            DeliveryError::Timeout(self.timeout)
        } else {
            DeliveryError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify(&self, ticket: &Ticket) -> DeliveryResult {
        let payload = match serde_json::to_value(ticket) {
            Ok(payload) => payload,
            Err(e) => return DeliveryResult::Failed(DeliveryError::Encode(e.to_string())),
        };

        let mut request = self.client.post(&self.url).json(&payload);
        if let WebhookAuth::Bearer { token } = &self.auth {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(
                    ticket_id = %ticket.ticket_id,
                    status = %response.status(),
                    "Webhook delivered successfully"
                );
                DeliveryResult::Delivered
            }
            Ok(response) => DeliveryResult::Failed(DeliveryError::Status(response.status().as_u16())),
            Err(e) => DeliveryResult::Failed(self.classify_error(&e)),
        }
    }
}
