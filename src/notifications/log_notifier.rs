//! Log-only notifier, used when no endpoint is configured.

use async_trait::async_trait;

use super::notifier::Notifier;
use super::DeliveryResult;
use crate::triage::Ticket;

/// Writes the ticket to the operator log instead of an external service.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, ticket: &Ticket) -> DeliveryResult {
        tracing::info!(
            ticket_id = %ticket.ticket_id,
            priority = %ticket.priority,
            assigned_to = %ticket.assigned_to,
            customer_id = %ticket.customer_id,
            "Ticket created"
        );
        DeliveryResult::Delivered
    }
}
