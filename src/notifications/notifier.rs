//! Notifier trait definition.

use async_trait::async_trait;

use super::DeliveryResult;
use crate::triage::Ticket;

/// Delivers a ticket to somewhere an operator will see it.
///
/// Implementations make exactly one attempt, bound their own waiting, and
/// report every failure through [`DeliveryResult::Failed`].
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Notifier name (for logging and delivery records)
    fn name(&self) -> &str;

    async fn notify(&self, ticket: &Ticket) -> DeliveryResult;
}
