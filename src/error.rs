//! Error types shared by the pipeline executor and the triage actions.

use std::time::Duration;

use thiserror::Error;

/// Problems with the shape of a pipeline, detected before any action runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("action name must not be empty")]
    EmptyName,

    #[error("action '{0}' is registered more than once")]
    DuplicateAction(String),

    #[error("action '{action}' depends on unregistered action '{dependency}'")]
    MissingDependency { action: String, dependency: String },

    #[error("dependency cycle among actions: {}", members.join(", "))]
    Cycle { members: Vec<String> },
}

/// Failure of a single action while it runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("action '{action}' read result of '{dependency}' without declaring it as a dependency")]
    UndeclaredDependency { action: String, dependency: String },

    #[error("no result recorded for dependency '{0}'")]
    MissingResult(String),

    #[error("required input '{0}' is missing from the initial state")]
    MissingInput(String),

    #[error("value under '{key}' is invalid: {message}")]
    InvalidValue { key: String, message: String },

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("result for '{0}' has already been recorded")]
    AlreadyRecorded(String),

    #[error("{0}")]
    Failed(String),
}

impl ActionError {
    pub fn invalid_value(key: impl Into<String>, message: impl ToString) -> Self {
        ActionError::InvalidValue {
            key: key.into(),
            message: message.to_string(),
        }
    }
}

/// Error surfaced to the caller of a pipeline.
///
/// Each variant maps onto one terminal state of a run: `Configuration` is
/// `ConfigInvalid`, `ActionFailed` is `PartiallyCompleted`, and `Cancelled`
/// is a run stopped by its caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("invalid pipeline configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("action '{action}' failed: {source}")]
    ActionFailed {
        action: String,
        #[source]
        source: ActionError,
    },

    #[error("pipeline cancelled before '{next}' could run")]
    Cancelled { next: String },
}

impl PipelineError {
    /// Name of the action the error is attributed to, if any.
    pub fn action(&self) -> Option<&str> {
        match self {
            PipelineError::ActionFailed { action, .. } => Some(action),
            PipelineError::Cancelled { next } => Some(next),
            PipelineError::Configuration(_) => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, PipelineError::Configuration(_))
    }
}
