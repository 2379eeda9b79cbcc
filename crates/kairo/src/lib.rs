//! A state-graph execution engine.
//!
//! A [`GraphDefinition`] names a set of steps, the static edges between them,
//! and resolvers that pick a successor from the current state. The
//! [`ExecutionEngine`] walks the graph over a fresh [`WorkflowState`], one step at
//! a time, until no successor is left, a step fails, or the iteration cap is hit.
//!
//! # Example
//!
//! ```rust
//! use kairo::prelude::*;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), WorkflowError> {
//! let graph = GraphDefinition::builder()
//!     .add_step("increment", transform_fn(|state| {
//!         let counter = state.get_as::<i64>("counter").unwrap_or(0);
//!         Ok(Some(json!({"counter": counter + 1})))
//!     }))
//!     .add_conditional_edge("increment", |state| {
//!         (state.get_as::<i64>("counter").unwrap_or(0) < 5).then(|| StepName::new("increment"))
//!     })
//!     .build()?;
//!
//! let outcome = graph.run(Data::new(), None).await?;
//!
//! assert_eq!(outcome.state.get("counter"), Some(&json!(5)));
//! assert_eq!(outcome.log.len(), 5);
//! assert!(outcome.is_completed());
//! # Ok(())
//! # }
//! ```
//!
//! # Outcomes
//!
//! A run only returns `Err` when a resolver fails. Every other ending is
//! reported through the log and [`Termination`]:
//!
//! - [`Termination::Finished`] - no successor was resolved
//! - [`Termination::Halted`] - a step failed; its `error` entry is the last in the log
//! - [`Termination::Exhausted`] - the iteration cap stopped a run that still had a step pending

mod engine;
mod graph;
pub mod prelude;
pub mod review;
mod store;

// Re-export core types
pub use kairo_core::*;

pub use engine::{ExecutionEngine, RunOutcome, Termination};
pub use graph::{GraphBuilder, GraphDefinition, Resolver, DEFAULT_ITERATION_CAP};
pub use store::{BackgroundRun, RunRecord, RunStatus, RunStore};
