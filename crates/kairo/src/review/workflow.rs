//! The code-review graph: extract, analyze, detect, suggest, and loop until the
//! quality score clears the threshold.

use super::tools::{
    calculate_quality_score, check_complexity, detect_issues, extract_functions,
    suggest_improvements, ComplexityReport, ComplexityScore, FunctionInfo, Issue,
};
use crate::graph::{GraphBuilder, GraphDefinition};
use async_trait::async_trait;
use kairo_core::{StepName, Transform, TransformResult, WorkflowError, WorkflowState};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

const DEFAULT_QUALITY_THRESHOLD: f64 = 70.0;
const DEFAULT_MAX_PASSES: u32 = 3;

/// Options accepted when creating a code-review graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Overrides the graph's iteration cap.
    pub max_iterations: Option<u32>,
}

impl ReviewConfig {
    /// Reads the config from a JSON object. `null` yields the defaults.
    pub fn from_value(config: &Value) -> Result<Self, WorkflowError> {
        if config.is_null() {
            return Ok(Self::default());
        }
        Self::deserialize(config).map_err(|e| WorkflowError::Configuration(e.to_string()))
    }
}

#[derive(Debug)]
struct ExtractStep;

#[async_trait]
impl Transform for ExtractStep {
    async fn apply(&self, state: &mut WorkflowState) -> TransformResult {
        let code = state.get_as::<String>("code").unwrap_or_default();
        let functions = extract_functions(&code)?;
        Ok(Some(json!({
            "function_count": functions.len(),
            "functions": functions,
        })))
    }
}

#[derive(Debug)]
struct AnalyzeStep;

#[async_trait]
impl Transform for AnalyzeStep {
    async fn apply(&self, state: &mut WorkflowState) -> TransformResult {
        let functions = state
            .get_as::<Vec<FunctionInfo>>("functions")
            .unwrap_or_default();
        let report = check_complexity(&functions);
        Ok(Some(json!({
            "complexity_scores": report.scores,
            "average_complexity": report.average,
            "high_complexity_funcs": report.high_complexity,
        })))
    }
}

#[derive(Debug)]
struct DetectStep;

#[async_trait]
impl Transform for DetectStep {
    async fn apply(&self, state: &mut WorkflowState) -> TransformResult {
        let code = state.get_as::<String>("code").unwrap_or_default();
        let functions = state
            .get_as::<Vec<FunctionInfo>>("functions")
            .unwrap_or_default();
        let issues = detect_issues(&code, &functions);
        Ok(Some(json!({
            "issue_count": issues.len(),
            "issues": issues,
        })))
    }
}

#[derive(Debug)]
struct SuggestStep;

#[async_trait]
impl Transform for SuggestStep {
    async fn apply(&self, state: &mut WorkflowState) -> TransformResult {
        let complexity = ComplexityReport {
            scores: Vec::new(),
            average: state.get_as::<f64>("average_complexity").unwrap_or(0.0),
            high_complexity: state
                .get_as::<Vec<ComplexityScore>>("high_complexity_funcs")
                .unwrap_or_default(),
        };
        let issues = state.get_as::<Vec<Issue>>("issues").unwrap_or_default();

        let suggestions = suggest_improvements(&complexity, &issues);
        let quality_score = calculate_quality_score(&complexity, &issues);
        let pass = state.increment_iteration();
        debug!(pass, quality_score, "Review pass scored");

        Ok(Some(json!({
            "suggestion_count": suggestions.len(),
            "suggestions": suggestions,
            "quality_score": quality_score,
        })))
    }
}

fn review_again(state: &WorkflowState) -> Option<StepName> {
    let threshold = state
        .get_as::<f64>("quality_threshold")
        .unwrap_or(DEFAULT_QUALITY_THRESHOLD);
    let score = state.get_as::<f64>("quality_score").unwrap_or(0.0);
    let max_passes = state
        .get_as::<u32>("max_iterations")
        .unwrap_or(DEFAULT_MAX_PASSES);

    if score >= threshold || state.iteration() >= max_passes {
        return None;
    }
    Some(StepName::new("extract"))
}

/// Builds the code-review graph.
///
/// Reads `code`, and optionally `quality_threshold` and `max_iterations`, from
/// the run's data.
pub fn code_review_graph(
    builder: GraphBuilder,
    config: &ReviewConfig,
) -> Result<GraphDefinition, WorkflowError> {
    let mut builder = builder
        .add_step("extract", ExtractStep)
        .add_step("analyze", AnalyzeStep)
        .add_step("detect", DetectStep)
        .add_step("suggest", SuggestStep)
        .add_edge("extract", "analyze")
        .add_edge("analyze", "detect")
        .add_edge("detect", "suggest")
        .add_conditional_edge("suggest", review_again)
        .set_start("extract");

    if let Some(cap) = config.max_iterations {
        builder = builder.iteration_cap(cap);
    }

    builder.build()
}

/// Workflow types that can be created by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowKind {
    CodeReview,
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::CodeReview => "code_review",
        }
    }

    /// Builds a graph of this kind with the given id and JSON config.
    pub fn build(
        self,
        id: impl Into<String>,
        config: &Value,
    ) -> Result<GraphDefinition, WorkflowError> {
        let builder = GraphDefinition::builder().id(id);
        match self {
            WorkflowKind::CodeReview => {
                code_review_graph(builder, &ReviewConfig::from_value(config)?)
            }
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkflowKind {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code_review" => Ok(WorkflowKind::CodeReview),
            other => Err(WorkflowError::UnknownWorkflow(other.to_string())),
        }
    }
}
