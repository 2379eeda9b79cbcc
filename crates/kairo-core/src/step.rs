//! Step type, the transform trait, and related types.

use crate::error::WorkflowError;
use crate::state::WorkflowState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Debug};
use std::sync::Arc;
use tracing::debug;

/// Type-safe step name wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepName(String);

impl StepName {
    /// Creates a new StepName.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the step name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StepName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StepName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&StepName> for StepName {
    fn from(s: &StepName) -> Self {
        s.clone()
    }
}

impl AsRef<str> for StepName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for StepName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for StepName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for StepName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// What a transform hands back to its step.
///
/// A non-empty JSON object is merged into the state's data. `None`, an empty
/// object, or any non-object value is dropped.
pub type TransformResult = Result<Option<Value>, WorkflowError>;

/// The work a step performs.
///
/// Implement this directly for asynchronous work. Synchronous closures can be
/// adapted with [`transform_fn`].
///
/// # Examples
///
/// ```
/// use kairo_core::{Transform, TransformResult, WorkflowState};
/// use async_trait::async_trait;
/// use serde_json::json;
///
/// #[derive(Debug)]
/// struct FetchScore;
///
/// #[async_trait]
/// impl Transform for FetchScore {
///     async fn apply(&self, state: &mut WorkflowState) -> TransformResult {
///         let attempts = state.get_as::<u32>("attempts").unwrap_or(0);
///         Ok(Some(json!({"score": 80, "attempts": attempts + 1})))
///     }
/// }
/// ```
#[async_trait]
pub trait Transform: Send + Sync {
    /// Runs the transform against the state.
    ///
    /// The state may be mutated directly; the returned object is merged afterwards.
    async fn apply(&self, state: &mut WorkflowState) -> TransformResult;
}

/// Adapter that lets a synchronous closure act as a [`Transform`].
pub struct FnTransform<F>(F);

impl<F> Debug for FnTransform<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTransform").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> Transform for FnTransform<F>
where
    F: Fn(&mut WorkflowState) -> TransformResult + Send + Sync,
{
    async fn apply(&self, state: &mut WorkflowState) -> TransformResult {
        (self.0)(state)
    }
}

/// Wraps a synchronous closure as a [`Transform`].
///
/// ```
/// use kairo_core::{transform_fn, WorkflowState};
/// use serde_json::json;
///
/// let increment = transform_fn(|state: &mut WorkflowState| {
///     let count = state.get_as::<i64>("count").unwrap_or(0);
///     Ok(Some(json!({"count": count + 1})))
/// });
/// # let _ = increment;
/// ```
pub fn transform_fn<F>(f: F) -> FnTransform<F>
where
    F: Fn(&mut WorkflowState) -> TransformResult + Send + Sync,
{
    FnTransform(f)
}

/// Decides whether a step runs against the current state.
pub type Predicate = Arc<dyn Fn(&WorkflowState) -> bool + Send + Sync>;

/// A named transform with an optional execution predicate.
///
/// Steps are immutable once built and cheap to clone.
#[derive(Clone)]
pub struct Step {
    name: StepName,
    transform: Arc<dyn Transform>,
    predicate: Option<Predicate>,
}

impl Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("has_predicate", &self.predicate.is_some())
            .finish()
    }
}

impl Step {
    /// Creates a step that always executes.
    pub fn new<T: Transform + 'static>(name: impl Into<StepName>, transform: T) -> Self {
        Self {
            name: name.into(),
            transform: Arc::new(transform),
            predicate: None,
        }
    }

    /// Attaches an execution predicate.
    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&WorkflowState) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn name(&self) -> &StepName {
        &self.name
    }

    /// Runs the transform and merges its update into `state`.
    ///
    /// Mutations made before a failure are kept.
    pub async fn execute(&self, state: &mut WorkflowState) -> Result<(), WorkflowError> {
        match self.transform.apply(state).await? {
            Some(Value::Object(updates)) if !updates.is_empty() => state.update(updates),
            Some(Value::Object(_)) | None => {}
            Some(other) => {
                debug!(step = %self.name, value = %other, "Discarding non-object update");
            }
        }
        Ok(())
    }

    /// Returns the predicate's verdict, or `true` when none is registered.
    pub fn should_execute(&self, state: &WorkflowState) -> bool {
        self.predicate.as_ref().map_or(true, |predicate| predicate(state))
    }
}
