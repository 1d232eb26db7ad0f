//! Best-effort delivery of tickets to an external notification endpoint.
//!
//! A [`Notifier`] makes one delivery attempt and reports the outcome as a
//! [`DeliveryResult`]. It never returns an error past its own boundary; the
//! caller decides how to record a failed delivery.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod log_notifier;
mod notifier;
mod webhook_notifier;

pub use log_notifier::LogNotifier;
pub use notifier::Notifier;
pub use webhook_notifier::{WebhookAuth, WebhookNotifier};

use crate::config::Config;

/// Upper bound for one delivery attempt when none is configured.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a delivery attempt failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("endpoint returned status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to encode payload: {0}")]
    Encode(String),
}

/// Outcome of a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    Delivered,
    Failed(DeliveryError),
}

impl DeliveryResult {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryResult::Delivered)
    }

    pub fn cause(&self) -> Option<&DeliveryError> {
        match self {
            DeliveryResult::Delivered => None,
            DeliveryResult::Failed(cause) => Some(cause),
        }
    }
}

/// Serializable record of a delivery attempt, stored alongside the ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRecord {
    pub notifier: String,
    pub delivered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

impl DeliveryRecord {
    pub fn new(notifier: impl Into<String>, result: &DeliveryResult) -> Self {
        Self {
            notifier: notifier.into(),
            delivered: result.is_delivered(),
            cause: result.cause().map(ToString::to_string),
            attempted_at: Utc::now(),
        }
    }
}

/// Notifier selected by configuration: the webhook when notifications are
/// enabled, the log notifier otherwise.
pub fn notifier_from_config(config: &Config) -> Result<Arc<dyn Notifier>> {
    if config.notifications.enabled {
        Ok(Arc::new(WebhookNotifier::new(&config.notifications)?))
    } else {
        tracing::debug!("Notifications disabled, tickets will only be logged");
        Ok(Arc::new(LogNotifier::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_record_from_failure() {
        let result = DeliveryResult::Failed(DeliveryError::Status(503));
        let record = DeliveryRecord::new("webhook", &result);

        assert!(!record.delivered);
        assert_eq!(record.cause.as_deref(), Some("endpoint returned status 503"));
        assert_eq!(record.notifier, "webhook");
    }

    #[test]
    fn test_delivery_record_serializes_without_cause() {
        let record = DeliveryRecord::new("log", &DeliveryResult::Delivered);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["delivered"], true);
        assert!(json.get("cause").is_none());
        assert!(json["attemptedAt"].is_string());
    }

    #[test]
    fn test_notifier_from_config() {
        let mut config = Config::default();
        assert_eq!(notifier_from_config(&config).unwrap().name(), "webhook");

        config.notifications.enabled = false;
        assert_eq!(notifier_from_config(&config).unwrap().name(), "log");
    }
}
