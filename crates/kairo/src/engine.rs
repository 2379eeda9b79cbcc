//! The run loop that walks a graph from its start step.

use crate::graph::GraphDefinition;
use kairo_core::{meta, Data, ExecutionRecord, StepName, WorkflowError, WorkflowState};
use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    /// No next step was resolved.
    Finished,
    /// A step failed; nothing ran after it.
    Halted {
        /// The failing step.
        step: StepName,
        /// The failure message recorded in the log.
        error: String,
    },
    /// The iteration cap was reached while a step was still pending.
    Exhausted,
}

/// Final state, execution log, and termination of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub state: WorkflowState,
    pub log: Vec<ExecutionRecord>,
    pub termination: Termination,
}

impl RunOutcome {
    /// Returns `true` if the run ended because no next step was resolved.
    pub fn is_completed(&self) -> bool {
        self.state.completed().unwrap_or(false)
    }

    /// Returns the engine's count of successful step executions.
    pub fn iterations_used(&self) -> u32 {
        self.state.iterations_used().unwrap_or(0)
    }
}

/// Executes [`GraphDefinition`]s.
///
/// The engine holds no per-run state, so one instance can drive any number of
/// concurrent runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionEngine;

impl ExecutionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Runs `graph` against a fresh state seeded with `initial`.
    ///
    /// Step failures end the run and are reported through the log and
    /// [`Termination::Halted`]. Only a resolver failure makes this return `Err`.
    pub async fn run(
        &self,
        graph: &GraphDefinition,
        initial: Data,
        run_id: Option<String>,
    ) -> Result<RunOutcome, WorkflowError> {
        let run_id = run_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let span = info_span!("run", run_id = %run_id, graph_id = %graph.id());
        let state = WorkflowState::for_run(initial, run_id);

        self.drive(graph, state).instrument(span).await
    }

    async fn drive(
        &self,
        graph: &GraphDefinition,
        mut state: WorkflowState,
    ) -> Result<RunOutcome, WorkflowError> {
        let mut log = Vec::new();
        let mut current = graph.start().cloned();
        let mut step_count: u32 = 0;
        let mut halted = None;

        while step_count < graph.iteration_cap() {
            let Some(name) = current.clone() else {
                break;
            };

            // Unknown names end the run as if no successor had been resolved.
            let Some(step) = graph.step(name.as_str()) else {
                warn!(step = %name, "Step not registered, ending run");
                current = None;
                break;
            };

            if !step.should_execute(&state) {
                debug!(step = %name, "Step skipped");
                log.push(ExecutionRecord::skipped(name.clone(), state.iteration()));
                current = graph.edge(name.as_str()).cloned();
                continue;
            }

            match step.execute(&mut state).await {
                Ok(()) => {
                    info!(step = %name, "Step completed successfully");
                    log.push(ExecutionRecord::success(name.clone(), state.iteration()));
                    current = self.next_step(graph, &name, &state)?;
                    step_count += 1;
                }
                Err(e) => {
                    let error = e.to_string();
                    warn!(step = %name, error = %error, "Step failed, halting run");
                    log.push(ExecutionRecord::error(
                        name.clone(),
                        state.iteration(),
                        error.clone(),
                    ));
                    halted = Some((name, error));
                    break;
                }
            }
        }

        let completed = current.is_none();
        state.set_metadata(meta::ITERATIONS_USED, step_count);
        state.set_metadata(meta::COMPLETED, completed);

        let termination = match halted {
            Some((step, error)) => Termination::Halted { step, error },
            None if completed => Termination::Finished,
            None => {
                warn!(
                    cap = graph.iteration_cap(),
                    pending = ?current,
                    "Iteration cap reached"
                );
                Termination::Exhausted
            }
        };

        info!(
            iterations_used = step_count,
            completed,
            entries = log.len(),
            "Run finished"
        );

        Ok(RunOutcome {
            state,
            log,
            termination,
        })
    }

    fn next_step(
        &self,
        graph: &GraphDefinition,
        name: &StepName,
        state: &WorkflowState,
    ) -> Result<Option<StepName>, WorkflowError> {
        match graph.resolver(name.as_str()) {
            Some(resolver) => resolver(state).map_err(|e| match e {
                WorkflowError::Resolver { .. } => e,
                other => WorkflowError::Resolver {
                    step_name: name.clone(),
                    details: other.to_string(),
                },
            }),
            None => Ok(graph.edge(name.as_str()).cloned()),
        }
    }
}
