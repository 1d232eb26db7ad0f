//! Support-ticket triage: classification, ticket construction and the
//! standard pipeline that ties them to notification delivery.

mod actions;
mod classifier;
mod service;
mod ticket;

pub use actions::{
    CreateTicket, CustomerInfo, GetCustomerInfo, GetSubscriptionStatus, SubscriptionStatus,
    TicketCreated, CREATE_TICKET, CUSTOMER_ID_KEY, GET_CUSTOMER_INFO, GET_SUBSCRIPTION_STATUS,
    PLAN_KEY,
};
pub use classifier::{classify, Classifier, PlanTier, Priority, DEFAULT_KEYWORDS};
pub use service::{TriageFailure, TriageOutcome, TriageRequest, TriageService, TRIAGE_PIPELINE};
pub use ticket::{Ticket, TicketFactory, TicketMetadata, DEFAULT_SOURCE};
