//! Dependency-ordered pipeline executor.

use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use super::action::{Action, RegisteredAction};
use super::context::{ActionContext, ContextStore};
use super::graph::DependencyGraph;
use super::outcome::{ActionReport, PipelineRun, RunMode, RunStatus};
use crate::error::{ActionError, ConfigurationError};

/// Default upper bound for one action when neither the pipeline nor the
/// action sets one.
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// A validated set of actions with a fixed execution order.
///
/// # Example
/// ```ignore
/// let pipeline = Pipeline::builder("triage")
///     .add_action(GetCustomerInfo)
///     .add_action(CreateTicket::new(factory, notifier))
///     .build()?;
///
/// let run = pipeline.run("the dashboard is broken", state).await;
/// ```
pub struct Pipeline {
    name: String,
    actions: Vec<RegisteredAction>,
    graph: DependencyGraph,
    order: Vec<usize>,
    mode: RunMode,
    action_timeout: Duration,
}

impl Pipeline {
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Action names in the order they will run.
    pub fn execution_order(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(|&i| self.actions[i].name.as_str())
            .collect()
    }

    /// Run every action once against a fresh context store.
    pub async fn run(&self, input: impl Into<String>, state: Map<String, Value>) -> PipelineRun {
        self.run_until_cancelled(input, state, &CancellationToken::new())
            .await
    }

    /// Like [`Pipeline::run`], stopping before the next action once `cancel` fires.
    ///
    /// An action already in flight is allowed to finish so the context store
    /// is never left with a half-written result.
    pub async fn run_until_cancelled(
        &self,
        input: impl Into<String>,
        state: Map<String, Value>,
        cancel: &CancellationToken,
    ) -> PipelineRun {
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut context = ContextStore::new(input, state);
        let started = Instant::now();

        tracing::info!(
            pipeline = %self.name,
            run_id = %run_id,
            actions = self.actions.len(),
            "Starting pipeline"
        );

        let mut reports = Vec::with_capacity(self.actions.len());
        let mut status = RunStatus::Completed;

        for (position, &index) in self.order.iter().enumerate() {
            let entry = &self.actions[index];

            if cancel.is_cancelled() {
                let skipped = self.remaining(position);
                tracing::warn!(
                    pipeline = %self.name,
                    run_id = %run_id,
                    next = %entry.name,
                    skipped = skipped.len(),
                    "Pipeline cancelled"
                );
                reports.extend(skipped.iter().map(ActionReport::skipped));
                status = RunStatus::Cancelled { skipped };
                break;
            }

            tracing::debug!(
                pipeline = %self.name,
                run_id = %run_id,
                action = %entry.name,
                step = position + 1,
                of = self.order.len(),
                "Executing action"
            );

            let action_started = Instant::now();
            let result = self.invoke(entry, &run_id, &context).await;
            let duration = action_started.elapsed();

            match result.and_then(|value| context.record(&entry.name, value)) {
                Ok(()) => {
                    tracing::info!(
                        pipeline = %self.name,
                        run_id = %run_id,
                        action = %entry.name,
                        elapsed_ms = duration.as_millis() as u64,
                        "Action completed"
                    );
                    reports.push(ActionReport::succeeded(&entry.name, duration));
                }
                Err(cause) => {
                    let skipped = self.remaining(position + 1);
                    let dependents = self.graph.dependents_of(index).len();
                    tracing::error!(
                        pipeline = %self.name,
                        run_id = %run_id,
                        action = %entry.name,
                        error = %cause,
                        dependents,
                        skipped = skipped.len(),
                        "Action failed"
                    );
                    reports.push(ActionReport::failed(&entry.name, &cause, duration));
                    reports.extend(skipped.iter().map(ActionReport::skipped));
                    status = RunStatus::PartiallyCompleted {
                        failed_action: entry.name.clone(),
                        cause,
                        skipped,
                    };
                    break;
                }
            }
        }

        if self.mode == RunMode::AllOrNothing && status != RunStatus::Completed {
            tracing::debug!(
                pipeline = %self.name,
                run_id = %run_id,
                discarded = context.len(),
                "Discarding partial results"
            );
            context = context.without_results();
        }

        let duration = started.elapsed();
        if status == RunStatus::Completed {
            tracing::info!(
                pipeline = %self.name,
                run_id = %run_id,
                elapsed_ms = duration.as_millis() as u64,
                "Pipeline completed"
            );
        }

        PipelineRun {
            run_id,
            pipeline: self.name.clone(),
            context,
            status,
            reports,
            duration,
        }
    }

    async fn invoke(
        &self,
        entry: &RegisteredAction,
        run_id: &str,
        context: &ContextStore,
    ) -> Result<Value, ActionError> {
        let ctx = ActionContext::new(&entry.name, run_id, context, &entry.allowed);
        let limit = entry.timeout.unwrap_or(self.action_timeout);

        match tokio::time::timeout(limit, entry.action.run(ctx)).await {
            Ok(result) => result,
            Err(_) => Err(ActionError::TimedOut(limit)),
        }
    }

    /// Names of actions from `position` onward in execution order.
    fn remaining(&self, position: usize) -> Vec<String> {
        self.order[position..]
            .iter()
            .map(|&i| self.actions[i].name.clone())
            .collect()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("order", &self.execution_order())
            .field("mode", &self.mode)
            .field("action_timeout", &self.action_timeout)
            .finish()
    }
}

/// Builder for constructing pipelines
pub struct PipelineBuilder {
    name: String,
    actions: Vec<Box<dyn Action>>,
    mode: RunMode,
    action_timeout: Duration,
}

impl PipelineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
            mode: RunMode::default(),
            action_timeout: DEFAULT_ACTION_TIMEOUT,
        }
    }

    /// Register an action. Registration order breaks ties in execution order.
    pub fn add_action<A: Action + 'static>(mut self, action: A) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    pub fn add_boxed_action(mut self, action: Box<dyn Action>) -> Self {
        self.actions.push(action);
        self
    }

    pub fn mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// Default timeout for actions that don't set their own.
    pub fn action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    /// Validate the dependency graph and fix the execution order.
    ///
    /// Fails on duplicate names, unregistered dependencies and cycles; no
    /// action is invoked in that case.
    pub fn build(self) -> Result<Pipeline, ConfigurationError> {
        let actions: Vec<RegisteredAction> =
            self.actions.into_iter().map(RegisteredAction::new).collect();

        let graph = DependencyGraph::new(
            actions
                .iter()
                .map(|a| (a.name.as_str(), a.depends_on.as_slice())),
        )?;

        let order = match graph.order() {
            Ok(order) => order,
            Err(err) => {
                tracing::error!(pipeline = %self.name, error = %err, "Invalid pipeline");
                return Err(err);
            }
        };

        Ok(Pipeline {
            name: self.name,
            actions,
            graph,
            order,
            mode: self.mode,
            action_timeout: self.action_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ActionState;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Records its name into a shared log and returns it.
    struct Step {
        name: String,
        deps: Vec<String>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Step {
        fn new(name: &str, deps: &[&str], log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name: name.into(),
                deps: deps.iter().map(|d| (*d).to_string()).collect(),
                log: log.clone(),
            }
        }
    }

    #[async_trait]
    impl Action for Step {
        fn name(&self) -> &str {
            &self.name
        }

        fn depends_on(&self) -> Vec<String> {
            self.deps.clone()
        }

        async fn run(&self, ctx: ActionContext<'_>) -> Result<Value, ActionError> {
            for dep in &self.deps {
                ctx.dependency(dep)?;
            }
            self.log.lock().unwrap().push(self.name.clone());
            Ok(json!(self.name))
        }
    }

    struct Fail(&'static str, Vec<String>);

    #[async_trait]
    impl Action for Fail {
        fn name(&self) -> &str {
            self.0
        }

        fn depends_on(&self) -> Vec<String> {
            self.1.clone()
        }

        async fn run(&self, _ctx: ActionContext<'_>) -> Result<Value, ActionError> {
            Err(ActionError::Failed("boom".into()))
        }
    }

    struct Counting(&'static str, Vec<String>, Arc<AtomicUsize>);

    #[async_trait]
    impl Action for Counting {
        fn name(&self) -> &str {
            self.0
        }

        fn depends_on(&self) -> Vec<String> {
            self.1.clone()
        }

        async fn run(&self, _ctx: ActionContext<'_>) -> Result<Value, ActionError> {
            self.2.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        }
    }

    struct Slow(Duration);

    #[async_trait]
    impl Action for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn run(&self, _ctx: ActionContext<'_>) -> Result<Value, ActionError> {
            tokio::time::sleep(self.0).await;
            Ok(Value::Null)
        }
    }

    /// Reads a result it never declared.
    struct Snoop;

    #[async_trait]
    impl Action for Snoop {
        fn name(&self) -> &str {
            "snoop"
        }

        async fn run(&self, ctx: ActionContext<'_>) -> Result<Value, ActionError> {
            ctx.dependency("a").cloned()
        }
    }

    fn log() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[tokio::test]
    async fn test_pipeline_runs_in_dependency_order() {
        let log = log();
        let pipeline = Pipeline::builder("test")
            .add_action(Step::new("c", &["a", "b"], &log))
            .add_action(Step::new("b", &["a"], &log))
            .add_action(Step::new("a", &[], &log))
            .build()
            .unwrap();

        let run = pipeline.run("input", Map::new()).await;

        assert!(run.is_completed());
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(run.context.completed(), &["a", "b", "c"]);
        assert_eq!(run.context.result("c"), Some(&json!("c")));
    }

    #[tokio::test]
    async fn test_failure_halts_dependents_and_keeps_earlier_results() {
        let log = log();
        let pipeline = Pipeline::builder("test")
            .add_action(Step::new("a", &[], &log))
            .add_action(Fail("b", vec!["a".into()]))
            .add_action(Step::new("c", &["b"], &log))
            .build()
            .unwrap();

        let run = pipeline.run("input", Map::new()).await;

        assert_eq!(
            run.status,
            RunStatus::PartiallyCompleted {
                failed_action: "b".into(),
                cause: ActionError::Failed("boom".into()),
                skipped: vec!["c".into()],
            }
        );
        assert!(run.context.has_result("a"));
        assert!(!run.context.has_result("b"));
        assert!(!run.context.has_result("c"));
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
        assert_eq!(run.skipped(), 1);
    }

    #[tokio::test]
    async fn test_all_or_nothing_discards_results() {
        let log = log();
        let pipeline = Pipeline::builder("test")
            .add_action(Step::new("a", &[], &log))
            .add_action(Fail("b", vec![]))
            .mode(RunMode::AllOrNothing)
            .build()
            .unwrap();

        let run = pipeline.run("input", Map::new()).await;

        assert!(!run.is_completed());
        assert!(run.context.is_empty());
        assert_eq!(run.context.input(), "input");
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_cycle_rejected_before_any_action_runs() {
        let counter = Arc::new(AtomicUsize::new(0));
        let result = Pipeline::builder("test")
            .add_action(Counting("free", vec![], counter.clone()))
            .add_action(Counting("a", vec!["b".into()], counter.clone()))
            .add_action(Counting("b", vec!["a".into()], counter.clone()))
            .build();

        assert!(matches!(result, Err(ConfigurationError::Cycle { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_dependency_rejected() {
        let counter = Arc::new(AtomicUsize::new(0));
        let err = Pipeline::builder("test")
            .add_action(Counting("a", vec!["ghost".into()], counter.clone()))
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            ConfigurationError::MissingDependency {
                action: "a".into(),
                dependency: "ghost".into(),
            }
        );
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_undeclared_read_fails_the_action() {
        let log = log();
        let pipeline = Pipeline::builder("test")
            .add_action(Step::new("a", &[], &log))
            .add_action(Snoop)
            .build()
            .unwrap();

        let run = pipeline.run("input", Map::new()).await;

        assert_eq!(
            run.error(),
            Some(crate::error::PipelineError::ActionFailed {
                action: "snoop".into(),
                source: ActionError::UndeclaredDependency {
                    action: "snoop".into(),
                    dependency: "a".into(),
                },
            })
        );
    }

    #[tokio::test]
    async fn test_action_timeout_becomes_failure() {
        let pipeline = Pipeline::builder("test")
            .add_action(Slow(Duration::from_secs(5)))
            .action_timeout(Duration::from_millis(20))
            .build()
            .unwrap();

        let run = pipeline.run("input", Map::new()).await;

        assert_eq!(
            run.status,
            RunStatus::PartiallyCompleted {
                failed_action: "slow".into(),
                cause: ActionError::TimedOut(Duration::from_millis(20)),
                skipped: vec![],
            }
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let counter = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::builder("test")
            .add_action(Counting("a", vec![], counter.clone()))
            .add_action(Counting("b", vec![], counter.clone()))
            .build()
            .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let run = pipeline
            .run_until_cancelled("input", Map::new(), &cancel)
            .await;

        assert_eq!(
            run.status,
            RunStatus::Cancelled {
                skipped: vec!["a".into(), "b".into()],
            }
        );
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    /// Fires the token while it is running, then finishes normally.
    struct CancelsMidRun(CancellationToken);

    #[async_trait]
    impl Action for CancelsMidRun {
        fn name(&self) -> &str {
            "first"
        }

        async fn run(&self, _ctx: ActionContext<'_>) -> Result<Value, ActionError> {
            self.0.cancel();
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(json!("done"))
        }
    }

    #[tokio::test]
    async fn test_cancel_during_action_lets_it_finish() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let pipeline = Pipeline::builder("test")
            .add_action(CancelsMidRun(cancel.clone()))
            .add_action(Counting("second", vec!["first".into()], counter.clone()))
            .build()
            .unwrap();

        let run = pipeline
            .run_until_cancelled("input", Map::new(), &cancel)
            .await;

        assert_eq!(
            run.status,
            RunStatus::Cancelled {
                skipped: vec!["second".into()],
            }
        );
        assert_eq!(run.context.result("first"), Some(&json!("done")));
        assert_eq!(
            run.report("first").map(|r| r.state),
            Some(ActionState::Succeeded)
        );
        assert_eq!(
            run.report("second").map(|r| r.state),
            Some(ActionState::Skipped)
        );
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(
            run.error(),
            Some(crate::error::PipelineError::Cancelled {
                next: "second".into(),
            })
        );
    }

    #[test]
    fn test_execution_order_is_stable() {
        let log = log();
        let build = || {
            Pipeline::builder("test")
                .add_action(Step::new("x", &[], &log))
                .add_action(Step::new("z", &["y"], &log))
                .add_action(Step::new("y", &[], &log))
                .build()
                .unwrap()
        };

        assert_eq!(build().execution_order(), vec!["x", "y", "z"]);
        assert_eq!(build().execution_order(), build().execution_order());
    }
}
