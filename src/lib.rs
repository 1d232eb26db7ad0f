//! Support-ticket triage built on a dependency-ordered action pipeline.
//!
//! [`pipeline`] runs named actions in dependency order over a shared context
//! store. [`triage`] supplies the classifier, the ticket factory and the
//! standard actions; [`notifications`] delivers the resulting ticket.

pub mod config;
pub mod error;
pub mod logging;
pub mod notifications;
pub mod pipeline;
pub mod triage;
