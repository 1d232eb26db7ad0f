//! Dependency-ordered execution of named actions over a shared context.
//!
//! Actions declare the actions they depend on. [`PipelineBuilder::build`]
//! turns those declarations into a validated graph and a fixed topological
//! order; [`Pipeline::run`] invokes each action once in that order, records
//! each result in the [`ContextStore`] under the action's name, and stops at
//! the first failure.

mod action;
mod context;
mod executor;
mod graph;
mod outcome;

pub use action::Action;
pub use context::{ActionContext, ContextStore};
pub use executor::{Pipeline, PipelineBuilder, DEFAULT_ACTION_TIMEOUT};
pub use graph::DependencyGraph;
pub use outcome::{ActionReport, ActionState, PipelineRun, RunMode, RunStatus};
