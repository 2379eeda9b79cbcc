//! Workflow error types.

use crate::step::StepName;
use thiserror::Error;

/// Errors that can occur while building or running a graph.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WorkflowError {
    /// A step failed during execution and reported its own name.
    #[error("Step failed: {step_name}, details: {details}")]
    StepError {
        /// The name of the step that failed.
        step_name: StepName,
        /// Details about the failure.
        details: String,
    },

    /// A transform body failed with a plain message.
    #[error("{0}")]
    Transform(String),

    /// A conditional-edge resolver failed while choosing the next step.
    #[error("Resolver failed in step '{step_name}': {details}")]
    Resolver {
        /// The step whose resolver failed.
        step_name: StepName,
        /// Details about the failure.
        details: String,
    },

    /// The graph or workflow configuration is invalid.
    #[error("Invalid workflow configuration: {0}")]
    Configuration(String),

    /// No workflow factory is registered under this kind.
    #[error("Unknown workflow type: {0}")]
    UnknownWorkflow(String),

    /// The store holds no graph with this id.
    #[error("Graph not found: {0}")]
    GraphNotFound(String),

    /// The store holds no run with this id.
    #[error("Run not found: {0}")]
    RunNotFound(String),
}

impl WorkflowError {
    /// Shorthand for [`WorkflowError::Transform`].
    pub fn transform(details: impl Into<String>) -> Self {
        Self::Transform(details.into())
    }
}
