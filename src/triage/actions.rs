//! The standard triage actions.
//!
//! `getCustomerInfo` and `getSubscriptionStatus` lift account data out of the
//! initial state; `createTicket` depends on both, classifies the request,
//! builds the ticket and attempts one notification.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::classifier::{Classifier, PlanTier};
use super::ticket::{Ticket, TicketFactory};
use crate::error::ActionError;
use crate::notifications::{
    DeliveryError, DeliveryRecord, DeliveryResult, Notifier, DEFAULT_DELIVERY_TIMEOUT,
};
use crate::pipeline::{Action, ActionContext};

pub const GET_CUSTOMER_INFO: &str = "getCustomerInfo";
pub const GET_SUBSCRIPTION_STATUS: &str = "getSubscriptionStatus";
pub const CREATE_TICKET: &str = "createTicket";

/// Initial-state key holding the customer id
pub const CUSTOMER_ID_KEY: &str = "customerId";
/// Initial-state key holding the plan tier
pub const PLAN_KEY: &str = "plan";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub customer_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionStatus {
    pub plan: PlanTier,
}

/// Result recorded by `createTicket`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketCreated {
    pub ticket: Ticket,
    pub delivery: DeliveryRecord,
}

fn to_result<T: Serialize>(action: &str, value: &T) -> Result<Value, ActionError> {
    serde_json::to_value(value).map_err(|e| ActionError::invalid_value(action, e))
}

#[derive(Debug, Default)]
pub struct GetCustomerInfo;

#[async_trait]
impl Action for GetCustomerInfo {
    fn name(&self) -> &str {
        GET_CUSTOMER_INFO
    }

    async fn run(&self, ctx: ActionContext<'_>) -> Result<Value, ActionError> {
        let customer_id = ctx.state_str(CUSTOMER_ID_KEY)?.trim();
        if customer_id.is_empty() {
            return Err(ActionError::invalid_value(CUSTOMER_ID_KEY, "must not be empty"));
        }

        to_result(
            GET_CUSTOMER_INFO,
            &CustomerInfo {
                customer_id: customer_id.to_string(),
            },
        )
    }
}

#[derive(Debug, Default)]
pub struct GetSubscriptionStatus;

#[async_trait]
impl Action for GetSubscriptionStatus {
    fn name(&self) -> &str {
        GET_SUBSCRIPTION_STATUS
    }

    async fn run(&self, ctx: ActionContext<'_>) -> Result<Value, ActionError> {
        let plan = ctx.state_str(PLAN_KEY)?.trim();
        if plan.is_empty() {
            return Err(ActionError::invalid_value(PLAN_KEY, "must not be empty"));
        }

        to_result(
            GET_SUBSCRIPTION_STATUS,
            &SubscriptionStatus {
                plan: PlanTier::from(plan),
            },
        )
    }
}

/// Classifies the request, builds a ticket and attempts delivery.
///
/// A failed delivery is logged and recorded next to the ticket; it never
/// fails the action. The delivery attempt is bounded by `notify_timeout`,
/// which must stay below the action's own timeout.
pub struct CreateTicket {
    classifier: Arc<Classifier>,
    factory: TicketFactory,
    notifier: Arc<dyn Notifier>,
    notify_timeout: Duration,
}

impl CreateTicket {
    pub fn new(
        classifier: Arc<Classifier>,
        factory: TicketFactory,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            classifier,
            factory,
            notifier,
            notify_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }

    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }
}

#[async_trait]
impl Action for CreateTicket {
    fn name(&self) -> &str {
        CREATE_TICKET
    }

    fn depends_on(&self) -> Vec<String> {
        vec![
            GET_CUSTOMER_INFO.to_string(),
            GET_SUBSCRIPTION_STATUS.to_string(),
        ]
    }

    async fn run(&self, ctx: ActionContext<'_>) -> Result<Value, ActionError> {
        let customer: CustomerInfo = ctx.dependency_as(GET_CUSTOMER_INFO)?;
        let subscription: SubscriptionStatus = ctx.dependency_as(GET_SUBSCRIPTION_STATUS)?;

        let description = ctx.input();
        let priority = self.classifier.classify(description, &subscription.plan);
        let ticket = self.factory.build(
            description,
            priority,
            &customer.customer_id,
            &subscription.plan,
        );

        let result =
            match tokio::time::timeout(self.notify_timeout, self.notifier.notify(&ticket)).await {
                Ok(result) => result,
                Err(_) => DeliveryResult::Failed(DeliveryError::Timeout(self.notify_timeout)),
            };
        match &result {
            DeliveryResult::Delivered => tracing::info!(
                run_id = %ctx.run_id(),
                ticket_id = %ticket.ticket_id,
                notifier = self.notifier.name(),
                "Notification delivered"
            ),
            DeliveryResult::Failed(cause) => tracing::warn!(
                run_id = %ctx.run_id(),
                ticket_id = %ticket.ticket_id,
                notifier = self.notifier.name(),
                error = %cause,
                "Notification failed, ticket kept"
            ),
        }

        let delivery = DeliveryRecord::new(self.notifier.name(), &result);
        to_result(CREATE_TICKET, &TicketCreated { ticket, delivery })
    }
}

impl std::fmt::Debug for CreateTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateTicket")
            .field("factory", &self.factory)
            .field("notifier", &self.notifier.name())
            .field("notify_timeout", &self.notify_timeout)
            .finish_non_exhaustive()
    }
}
