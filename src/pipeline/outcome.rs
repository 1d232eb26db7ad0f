//! What a pipeline run reports back to its caller.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::context::ContextStore;
use crate::error::{ActionError, PipelineError};

/// How a run treats results produced before a failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Keep results of actions that completed before the failure
    #[default]
    PartialSuccess,
    /// Return no results at all when any action fails
    AllOrNothing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    Succeeded,
    Failed,
    /// Never invoked because an earlier action failed or the run was cancelled
    Skipped,
}

/// Outcome of one action within a run.
#[derive(Debug, Clone, Serialize)]
pub struct ActionReport {
    pub name: String,
    pub state: ActionState,
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionReport {
    pub fn succeeded(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            state: ActionState::Succeeded,
            duration,
            error: None,
        }
    }

    pub fn failed(name: impl Into<String>, error: &ActionError, duration: Duration) -> Self {
        Self {
            name: name.into(),
            state: ActionState::Failed,
            duration,
            error: Some(error.to_string()),
        }
    }

    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ActionState::Skipped,
            duration: Duration::ZERO,
            error: None,
        }
    }
}

/// Terminal state of a run that passed configuration validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// `failed_action` failed with `cause`; `skipped` never ran
    PartiallyCompleted {
        failed_action: String,
        cause: ActionError,
        skipped: Vec<String>,
    },
    /// The caller cancelled the run; `skipped` never ran
    Cancelled { skipped: Vec<String> },
}

/// Everything a finished run hands back.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub run_id: String,
    pub pipeline: String,
    pub context: ContextStore,
    pub status: RunStatus,
    pub reports: Vec<ActionReport>,
    pub duration: Duration,
}

impl PipelineRun {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// The structured error for this run, if it did not complete.
    pub fn error(&self) -> Option<PipelineError> {
        match &self.status {
            RunStatus::Completed => None,
            RunStatus::PartiallyCompleted {
                failed_action,
                cause,
                ..
            } => Some(PipelineError::ActionFailed {
                action: failed_action.clone(),
                source: cause.clone(),
            }),
            RunStatus::Cancelled { skipped } => Some(PipelineError::Cancelled {
                next: skipped.first().cloned().unwrap_or_default(),
            }),
        }
    }

    /// Split into the final context and the error, if any.
    pub fn into_parts(self) -> (ContextStore, Option<PipelineError>) {
        let error = self.error();
        (self.context, error)
    }

    /// The final context for a completed run, the error otherwise.
    pub fn into_result(self) -> Result<ContextStore, PipelineError> {
        match self.into_parts() {
            (context, None) => Ok(context),
            (_, Some(err)) => Err(err),
        }
    }

    pub fn report(&self, action: &str) -> Option<&ActionReport> {
        self.reports.iter().find(|r| r.name == action)
    }

    pub fn executed(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.state != ActionState::Skipped)
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.state == ActionState::Skipped)
            .count()
    }

    pub fn failed_action(&self) -> Option<&ActionReport> {
        self.reports.iter().find(|r| r.state == ActionState::Failed)
    }
}
