//! Per-run mutable state threaded through every step.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A JSON object keyed by string, used for both state data and metadata.
pub type Data = Map<String, Value>;

/// Metadata keys written by the execution engine.
pub mod meta {
    /// Identifier of the run that owns the state.
    pub const RUN_ID: &str = "run_id";
    /// `true` when the run ended because no next step was resolved.
    pub const COMPLETED: &str = "completed";
    /// Number of successful step executions the run consumed.
    pub const ITERATIONS_USED: &str = "iterations_used";
}

/// Mutable container for one run.
///
/// `data` is the working payload every step reads and rewrites. `metadata` holds
/// engine bookkeeping. `iteration` belongs to step logic: the engine reads it for
/// the execution log but never changes it, and it has nothing to do with the
/// engine's own step count (exposed as [`meta::ITERATIONS_USED`]).
///
/// # Examples
///
/// ```
/// use kairo_core::WorkflowState;
/// use serde_json::json;
///
/// let mut state = WorkflowState::default();
/// state.set("count", 1);
/// state.update(json!({"count": 2, "name": "demo"}).as_object().cloned().unwrap_or_default());
///
/// assert_eq!(state.get("count"), Some(&json!(2)));
/// assert_eq!(state.get_as::<String>("name"), Some("demo".to_string()));
/// assert_eq!(state.get_or("missing", "fallback"), json!("fallback"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    data: Data,
    metadata: Data,
    iteration: u32,
}

impl WorkflowState {
    /// Creates a state seeded with `data` and empty metadata.
    pub fn new(data: Data) -> Self {
        Self {
            data,
            metadata: Data::new(),
            iteration: 0,
        }
    }

    /// Creates a state seeded with `data` and a `run_id` metadata entry.
    pub fn for_run(data: Data, run_id: impl Into<String>) -> Self {
        let mut state = Self::new(data);
        state.set_metadata(meta::RUN_ID, run_id.into());
        state
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Returns a copy of the value under `key`, or `default` when absent.
    pub fn get_or(&self, key: &str, default: impl Into<Value>) -> Value {
        self.data.get(key).cloned().unwrap_or_else(|| default.into())
    }

    /// Deserializes the value under `key`.
    ///
    /// Returns `None` if the key is absent or the value has a different shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data.get(key).and_then(|v| T::deserialize(v).ok())
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Shallow-merges `updates` into the data. Existing keys are overwritten.
    pub fn update(&mut self, updates: Data) {
        self.data.extend(updates);
    }

    /// Removes and returns the value under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Returns `true` if the data contains `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Returns the whole data object.
    pub fn data(&self) -> &Data {
        &self.data
    }

    /// Returns the whole metadata object.
    pub fn metadata(&self) -> &Data {
        &self.metadata
    }

    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Returns the step-owned iteration counter.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Increments the step-owned iteration counter and returns the new value.
    pub fn increment_iteration(&mut self) -> u32 {
        self.iteration = self.iteration.saturating_add(1);
        self.iteration
    }

    pub fn set_iteration(&mut self, iteration: u32) {
        self.iteration = iteration;
    }

    /// Returns the run id seeded by the engine.
    pub fn run_id(&self) -> Option<&str> {
        self.metadata.get(meta::RUN_ID).and_then(Value::as_str)
    }

    /// Returns whether the run ended with no pending step.
    ///
    /// `None` until the engine has finished the run.
    pub fn completed(&self) -> Option<bool> {
        self.metadata.get(meta::COMPLETED).and_then(Value::as_bool)
    }

    /// Returns the engine's count of successful step executions.
    ///
    /// `None` until the engine has finished the run.
    pub fn iterations_used(&self) -> Option<u32> {
        self.metadata
            .get(meta::ITERATIONS_USED)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
    }

    /// Splits the state into its data and metadata objects.
    pub fn into_parts(self) -> (Data, Data) {
        (self.data, self.metadata)
    }
}
