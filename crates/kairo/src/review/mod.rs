//! Code-review step library and its graph factory.

pub mod tools;
mod workflow;

pub use workflow::{code_review_graph, ReviewConfig, WorkflowKind};
