//! Graph definition and its builder.

use crate::engine::{ExecutionEngine, RunOutcome};
use kairo_core::{Data, Step, StepName, Transform, WorkflowError, WorkflowState};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Successful step executions a run may perform unless configured otherwise.
pub const DEFAULT_ITERATION_CAP: u32 = 50;

/// Computes the next step from the state left by a successful execution.
///
/// `Ok(None)` ends the run. An `Err` aborts the whole run and is returned to the
/// caller instead of being logged.
pub type Resolver =
    Arc<dyn Fn(&WorkflowState) -> Result<Option<StepName>, WorkflowError> + Send + Sync>;

/// An immutable graph of steps, edges, and resolvers.
///
/// Built with [`GraphBuilder`]. A definition can be shared behind an [`Arc`] and
/// run by any number of concurrent runs.
pub struct GraphDefinition {
    id: String,
    steps: HashMap<StepName, Step>,
    edges: HashMap<StepName, StepName>,
    branches: HashMap<StepName, Resolver>,
    start: Option<StepName>,
    iteration_cap: u32,
}

impl fmt::Debug for GraphDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut steps = self.steps.keys().collect::<Vec<_>>();
        steps.sort();
        f.debug_struct("GraphDefinition")
            .field("id", &self.id)
            .field("steps", &steps)
            .field("edges", &self.edges)
            .field("branches", &self.branches.keys().collect::<Vec<_>>())
            .field("start", &self.start)
            .field("iteration_cap", &self.iteration_cap)
            .finish()
    }
}

impl GraphDefinition {
    /// Creates a new graph builder.
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the step a run begins at, if any step was registered.
    pub fn start(&self) -> Option<&StepName> {
        self.start.as_ref()
    }

    pub fn iteration_cap(&self) -> u32 {
        self.iteration_cap
    }

    /// Returns the step registered under `name`.
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.get(name)
    }

    /// Returns the static successor of `name`.
    pub fn edge(&self, name: &str) -> Option<&StepName> {
        self.edges.get(name)
    }

    /// Returns the resolver registered for `name`.
    pub fn resolver(&self, name: &str) -> Option<&Resolver> {
        self.branches.get(name)
    }

    /// Returns an iterator over all registered step names.
    pub fn step_names(&self) -> impl Iterator<Item = &StepName> {
        self.steps.keys()
    }

    /// Returns `true` if a step with the given name exists.
    pub fn has_step(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    /// Returns the number of registered steps.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Runs this graph with a default [`ExecutionEngine`].
    pub async fn run(
        &self,
        initial: Data,
        run_id: Option<String>,
    ) -> Result<RunOutcome, WorkflowError> {
        ExecutionEngine::new().run(self, initial, run_id).await
    }
}

/// Builder for constructing [`GraphDefinition`] instances.
///
/// The first registered step becomes the start step unless [`set_start`] picks
/// another one.
///
/// [`set_start`]: GraphBuilder::set_start
pub struct GraphBuilder {
    id: Option<String>,
    steps: HashMap<StepName, Step>,
    edges: HashMap<StepName, StepName>,
    branches: HashMap<StepName, Resolver>,
    start: Option<StepName>,
    iteration_cap: u32,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    /// Creates a new empty graph builder.
    pub fn new() -> Self {
        Self {
            id: None,
            steps: HashMap::new(),
            edges: HashMap::new(),
            branches: HashMap::new(),
            start: None,
            iteration_cap: DEFAULT_ITERATION_CAP,
        }
    }

    /// Sets the graph id. A random UUID is used otherwise.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Adds a step that always executes.
    pub fn add_step<T: Transform + 'static>(self, name: impl Into<StepName>, transform: T) -> Self {
        self.add(Step::new(name, transform))
    }

    /// Adds a step that executes only while `predicate` holds.
    pub fn add_step_when<T, P>(self, name: impl Into<StepName>, transform: T, predicate: P) -> Self
    where
        T: Transform + 'static,
        P: Fn(&WorkflowState) -> bool + Send + Sync + 'static,
    {
        self.add(Step::new(name, transform).with_predicate(predicate))
    }

    /// Adds a prebuilt step, replacing any step with the same name.
    pub fn add(mut self, step: Step) -> Self {
        let name = step.name().clone();
        if self.start.is_none() {
            self.start = Some(name.clone());
        }
        self.steps.insert(name, step);
        self
    }

    /// Sets the static successor of `from`, replacing any earlier one.
    pub fn add_edge(mut self, from: impl Into<StepName>, to: impl Into<StepName>) -> Self {
        self.edges.insert(from.into(), to.into());
        self
    }

    /// Routes the successor of `from` through `resolver`.
    ///
    /// The resolver wins over a static edge after a successful execution. It is
    /// never consulted when the step is skipped.
    pub fn add_conditional_edge<R>(self, from: impl Into<StepName>, resolver: R) -> Self
    where
        R: Fn(&WorkflowState) -> Option<StepName> + Send + Sync + 'static,
    {
        self.add_fallible_conditional_edge(from, move |state| Ok(resolver(state)))
    }

    /// Like [`add_conditional_edge`](Self::add_conditional_edge), for resolvers that can fail.
    pub fn add_fallible_conditional_edge<R>(mut self, from: impl Into<StepName>, resolver: R) -> Self
    where
        R: Fn(&WorkflowState) -> Result<Option<StepName>, WorkflowError> + Send + Sync + 'static,
    {
        self.branches.insert(from.into(), Arc::new(resolver));
        self
    }

    /// Sets the start step by name.
    pub fn set_start(mut self, name: impl Into<StepName>) -> Self {
        self.start = Some(name.into());
        self
    }

    /// Caps the number of successful step executions per run.
    pub fn iteration_cap(mut self, cap: u32) -> Self {
        self.iteration_cap = cap;
        self
    }

    /// Builds the graph.
    ///
    /// Edges and start may name steps that were never registered; a run that
    /// reaches one simply ends.
    pub fn build(self) -> Result<GraphDefinition, WorkflowError> {
        if self.iteration_cap == 0 {
            return Err(WorkflowError::Configuration(
                "Iteration cap must be greater than 0".to_string(),
            ));
        }

        Ok(GraphDefinition {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            steps: self.steps,
            edges: self.edges,
            branches: self.branches,
            start: self.start,
            iteration_cap: self.iteration_cap,
        })
    }
}
