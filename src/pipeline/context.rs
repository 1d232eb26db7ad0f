//! Per-run shared state and the scoped view handed to each action.

use std::collections::{BTreeSet, HashMap};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ActionError;

/// State shared by every action of a single pipeline run.
///
/// `input` and `state` are fixed when the run starts. `results` maps an
/// action name to that action's output; entries are written once by the
/// executor and never replaced or removed during the run.
#[derive(Debug, Clone, Serialize)]
pub struct ContextStore {
    input: String,
    state: Map<String, Value>,
    results: HashMap<String, Value>,
    /// Action names in the order their results were recorded
    order: Vec<String>,
}

impl ContextStore {
    pub fn new(input: impl Into<String>, state: Map<String, Value>) -> Self {
        Self {
            input: input.into(),
            state,
            results: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// The original free-text request.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// The caller-supplied initial state.
    pub fn state(&self) -> &Map<String, Value> {
        &self.state
    }

    pub fn result(&self, action: &str) -> Option<&Value> {
        self.results.get(action)
    }

    /// Deserialize the result recorded for `action`.
    pub fn result_as<T: DeserializeOwned>(&self, action: &str) -> Result<T, ActionError> {
        let value = self
            .result(action)
            .ok_or_else(|| ActionError::MissingResult(action.to_string()))?;
        serde_json::from_value(value.clone()).map_err(|e| ActionError::invalid_value(action, e))
    }

    pub fn has_result(&self, action: &str) -> bool {
        self.results.contains_key(action)
    }

    /// Names of actions with a recorded result, in completion order.
    pub fn completed(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Record an action's output. Fails if a result already exists.
    pub(crate) fn record(&mut self, action: &str, value: Value) -> Result<(), ActionError> {
        if self.results.contains_key(action) {
            return Err(ActionError::AlreadyRecorded(action.to_string()));
        }
        self.results.insert(action.to_string(), value);
        self.order.push(action.to_string());
        Ok(())
    }

    /// A copy of this store holding only the input and the initial state.
    pub(crate) fn without_results(&self) -> Self {
        Self::new(self.input.clone(), self.state.clone())
    }
}

/// Read-only view of the [`ContextStore`] granted to one action.
///
/// Only results of the action's declared dependencies are reachable; asking
/// for anything else fails with [`ActionError::UndeclaredDependency`].
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    action: &'a str,
    run_id: &'a str,
    store: &'a ContextStore,
    allowed: &'a BTreeSet<String>,
}

impl<'a> ActionContext<'a> {
    pub(crate) fn new(
        action: &'a str,
        run_id: &'a str,
        store: &'a ContextStore,
        allowed: &'a BTreeSet<String>,
    ) -> Self {
        Self {
            action,
            run_id,
            store,
            allowed,
        }
    }

    /// Name of the action this view belongs to.
    pub fn action(&self) -> &str {
        self.action
    }

    pub fn run_id(&self) -> &str {
        self.run_id
    }

    pub fn input(&self) -> &'a str {
        self.store.input()
    }

    /// Look up a key in the initial state.
    pub fn state_value(&self, key: &str) -> Option<&'a Value> {
        self.store.state().get(key)
    }

    /// Look up a required string in the initial state.
    pub fn state_str(&self, key: &str) -> Result<&'a str, ActionError> {
        match self.state_value(key) {
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(ActionError::invalid_value(
                key,
                format!("expected a string, found {other}"),
            )),
            None => Err(ActionError::MissingInput(key.to_string())),
        }
    }

    /// Result of a declared dependency.
    pub fn dependency(&self, name: &str) -> Result<&'a Value, ActionError> {
        if !self.allowed.contains(name) {
            return Err(ActionError::UndeclaredDependency {
                action: self.action.to_string(),
                dependency: name.to_string(),
            });
        }
        self.store
            .result(name)
            .ok_or_else(|| ActionError::MissingResult(name.to_string()))
    }

    /// Deserialize the result of a declared dependency.
    pub fn dependency_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, ActionError> {
        let value = self.dependency(name)?;
        serde_json::from_value(value.clone()).map_err(|e| ActionError::invalid_value(name, e))
    }
}
