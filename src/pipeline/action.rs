//! The unit of work run by a pipeline.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::context::ActionContext;
use crate::error::ActionError;

/// A named step that depends on other steps and produces one result.
///
/// The executor records the returned value in the context store under
/// [`Action::name`]. An action only sees results of the actions listed in
/// [`Action::depends_on`].
#[async_trait]
pub trait Action: Send + Sync {
    /// Unique name within a pipeline
    fn name(&self) -> &str;

    /// Names of the actions that must succeed before this one runs.
    fn depends_on(&self) -> Vec<String> {
        Vec::new()
    }

    /// Upper bound for a single run, overriding the pipeline default.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn run(&self, ctx: ActionContext<'_>) -> Result<Value, ActionError>;
}

/// An action as captured at registration time.
///
/// Name and dependencies are read once here and never again, so an action
/// cannot change its declared shape after the pipeline is built.
pub(crate) struct RegisteredAction {
    pub(crate) name: String,
    pub(crate) depends_on: Vec<String>,
    /// Result keys this action may read
    pub(crate) allowed: BTreeSet<String>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) action: Box<dyn Action>,
}

impl RegisteredAction {
    pub(crate) fn new(action: Box<dyn Action>) -> Self {
        let name = action.name().to_string();
        let mut depends_on = Vec::new();
        for dep in action.depends_on() {
            if !depends_on.contains(&dep) {
                depends_on.push(dep);
            }
        }
        let allowed = depends_on.iter().cloned().collect();
        let timeout = action.timeout();

        Self {
            name,
            depends_on,
            allowed,
            timeout,
            action,
        }
    }
}

impl std::fmt::Debug for RegisteredAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredAction")
            .field("name", &self.name)
            .field("depends_on", &self.depends_on)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Declared;

    #[async_trait]
    impl Action for Declared {
        fn name(&self) -> &str {
            "declared"
        }

        fn depends_on(&self) -> Vec<String> {
            vec!["a".into(), "b".into(), "a".into()]
        }

        async fn run(&self, _ctx: ActionContext<'_>) -> Result<Value, ActionError> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn test_registration_snapshots_declaration() {
        let registered = RegisteredAction::new(Box::new(Declared));
        assert_eq!(registered.name, "declared");
        assert_eq!(registered.depends_on, vec!["a".to_string(), "b".to_string()]);
        assert!(registered.allowed.contains("a"));
        assert!(registered.allowed.contains("b"));
        assert!(registered.timeout.is_none());
    }
}
