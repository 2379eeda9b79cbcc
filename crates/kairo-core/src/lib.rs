//! Core types for the kairo graph engine.
//!
//! This crate holds the pieces step libraries need without pulling in the
//! execution engine.
//!
//! # Core Types
//!
//! - [`WorkflowState`] - Per-run data, metadata, and step-owned iteration counter
//! - [`Step`] - A named [`Transform`] with an optional predicate
//! - [`ExecutionRecord`] - One entry of a run's execution log
//! - [`WorkflowError`] - Error types for graph construction and execution

mod error;
mod record;
mod state;
mod step;

pub use error::WorkflowError;
pub use record::{ExecutionRecord, StepStatus};
pub use state::{meta, Data, WorkflowState};
pub use step::{
    transform_fn, FnTransform, Predicate, Step, StepName, Transform, TransformResult,
};
