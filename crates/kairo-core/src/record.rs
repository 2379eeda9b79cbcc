//! Execution log entries.

use crate::step::StepName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of visiting one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Error,
    Skipped,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Success => write!(f, "success"),
            StepStatus::Error => write!(f, "error"),
            StepStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// One entry in a run's execution log.
///
/// `iteration` is the state's step-owned counter at the time of logging, not the
/// engine's step count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub node: StepName,
    pub status: StepStatus,
    pub iteration: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionRecord {
    pub fn success(node: StepName, iteration: u32) -> Self {
        Self::new(node, StepStatus::Success, iteration, None)
    }

    pub fn skipped(node: StepName, iteration: u32) -> Self {
        Self::new(node, StepStatus::Skipped, iteration, None)
    }

    pub fn error(node: StepName, iteration: u32, error: impl Into<String>) -> Self {
        Self::new(node, StepStatus::Error, iteration, Some(error.into()))
    }

    fn new(node: StepName, status: StepStatus, iteration: u32, error: Option<String>) -> Self {
        Self {
            node,
            status,
            iteration,
            timestamp: Utc::now(),
            error,
        }
    }
}
