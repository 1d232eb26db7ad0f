//! Ticket records and the factory that builds them.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::classifier::{PlanTier, Priority};

/// Source recorded on tickets when none is configured.
pub const DEFAULT_SOURCE: &str = "ai-agent";

/// Process-wide sequence shared by every factory.
static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Provenance of a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketMetadata {
    pub created_at: DateTime<Utc>,
    pub source: String,
    pub plan: PlanTier,
}

/// A support ticket. Built once by [`TicketFactory::build`], never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub ticket_id: String,
    pub status: String,
    pub priority: Priority,
    pub assigned_to: String,
    pub estimated_response: String,
    pub customer_id: String,
    pub description: String,
    pub metadata: TicketMetadata,
}

impl Ticket {
    pub fn created_at(&self) -> DateTime<Utc> {
        self.metadata.created_at
    }

    pub fn plan(&self) -> &PlanTier {
        &self.metadata.plan
    }
}

/// Builds tickets from a classified description and account data.
#[derive(Debug, Clone)]
pub struct TicketFactory {
    source: String,
}

impl TicketFactory {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn build(
        &self,
        description: &str,
        priority: Priority,
        customer_id: &str,
        plan: &PlanTier,
    ) -> Ticket {
        let created_at = Utc::now();
        Ticket {
            ticket_id: next_ticket_id(created_at),
            status: "created".to_string(),
            priority,
            assigned_to: priority.assignee().to_string(),
            estimated_response: priority.estimated_response().to_string(),
            customer_id: customer_id.to_string(),
            description: description.to_string(),
            metadata: TicketMetadata {
                created_at,
                source: self.source.clone(),
                plan: plan.clone(),
            },
        }
    }
}

impl Default for TicketFactory {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE)
    }
}

/// `T-<unix millis>-<sequence>`. The sequence alone is unique per process;
/// the timestamp keeps ids roughly sortable across restarts.
fn next_ticket_id(now: DateTime<Utc>) -> String {
    let seq = NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("T-{}-{:06}", now.timestamp_millis(), seq)
}
