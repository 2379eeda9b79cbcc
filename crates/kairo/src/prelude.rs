//! Commonly used types and traits

pub use crate::engine::{ExecutionEngine, RunOutcome, Termination};
pub use crate::graph::{GraphBuilder, GraphDefinition};
pub use kairo_core::{
    transform_fn, Data, ExecutionRecord, Step, StepName, StepStatus, Transform, TransformResult,
    WorkflowError, WorkflowState,
};
