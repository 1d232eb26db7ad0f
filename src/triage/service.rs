//! Triage service: the standard pipeline wired from configuration.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::actions::{
    CreateTicket, GetCustomerInfo, GetSubscriptionStatus, TicketCreated, CREATE_TICKET,
    CUSTOMER_ID_KEY, PLAN_KEY,
};
use super::classifier::Classifier;
use super::ticket::{Ticket, TicketFactory};
use crate::config::Config;
use crate::error::{ConfigurationError, PipelineError};
use crate::notifications::{notifier_from_config, DeliveryRecord, Notifier};
use crate::pipeline::{Pipeline, PipelineRun};

/// Name of the standard triage pipeline
pub const TRIAGE_PIPELINE: &str = "support-triage";

/// One support request to triage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageRequest {
    pub description: String,
    pub customer_id: String,
    pub plan: String,
}

impl TriageRequest {
    pub fn new(
        description: impl Into<String>,
        customer_id: impl Into<String>,
        plan: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            customer_id: customer_id.into(),
            plan: plan.into(),
        }
    }

    /// Initial state handed to the pipeline.
    pub fn initial_state(&self) -> Map<String, Value> {
        let mut state = Map::new();
        state.insert(CUSTOMER_ID_KEY.to_string(), Value::from(self.customer_id.clone()));
        state.insert(PLAN_KEY.to_string(), Value::from(self.plan.clone()));
        state
    }
}

/// A ticket that was created, with its delivery record and the full run.
#[derive(Debug, Clone)]
pub struct TriageOutcome {
    pub ticket: Ticket,
    pub delivery: DeliveryRecord,
    pub run: PipelineRun,
}

/// A run that ended without a ticket.
///
/// Carries the attributed error together with the run itself, so results
/// recorded before the failure and the per-action reports stay available.
#[derive(Error, Debug, Clone)]
#[error("triage run {} did not complete", .run.run_id)]
pub struct TriageFailure {
    #[source]
    pub error: PipelineError,
    pub run: Box<PipelineRun>,
}

impl TriageFailure {
    /// Action the failure is attributed to, if any.
    pub fn action(&self) -> Option<&str> {
        self.error.action()
    }
}

pub struct TriageService {
    pipeline: Pipeline,
}

impl TriageService {
    /// Build the service with the notifier selected by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let notifier = notifier_from_config(config)?;
        Ok(Self::with_notifier(config, notifier)?)
    }

    pub fn with_notifier(
        config: &Config,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ConfigurationError> {
        let pipeline = Pipeline::builder(TRIAGE_PIPELINE)
            .mode(config.pipeline.mode)
            .action_timeout(config.pipeline.action_timeout())
            .add_action(GetCustomerInfo)
            .add_action(GetSubscriptionStatus)
            .add_action(
                CreateTicket::new(
                    Arc::new(Classifier::default()),
                    TicketFactory::new(config.tickets.source.clone()),
                    notifier,
                )
                .with_notify_timeout(config.notifications.timeout()),
            )
            .build()?;

        Ok(Self { pipeline })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Run the pipeline for one request.
    ///
    /// Returns the ticket whenever `createTicket` succeeded, regardless of
    /// delivery. Any other terminal state is returned as a [`TriageFailure`]
    /// holding the attributed error and the partial run.
    pub async fn triage(
        &self,
        request: &TriageRequest,
        cancel: &CancellationToken,
    ) -> Result<TriageOutcome, TriageFailure> {
        let run = self
            .pipeline
            .run_until_cancelled(&request.description, request.initial_state(), cancel)
            .await;

        if let Some(error) = run.error() {
            return Err(TriageFailure {
                error,
                run: Box::new(run),
            });
        }

        match run.context.result_as::<TicketCreated>(CREATE_TICKET) {
            Ok(created) => Ok(TriageOutcome {
                ticket: created.ticket,
                delivery: created.delivery,
                run,
            }),
            Err(source) => Err(TriageFailure {
                error: PipelineError::ActionFailed {
                    action: CREATE_TICKET.to_string(),
                    source,
                },
                run: Box::new(run),
            }),
        }
    }
}

impl std::fmt::Debug for TriageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriageService")
            .field("pipeline", &self.pipeline)
            .finish()
    }
}
