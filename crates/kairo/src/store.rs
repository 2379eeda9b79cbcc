//! In-memory registry of graphs and run results.
//!
//! Everything lives for as long as some clone of the [`RunStore`] handle does.
//! There is no eviction.

use crate::engine::{ExecutionEngine, RunOutcome};
use crate::graph::GraphDefinition;
use crate::review::WorkflowKind;
use kairo_core::{Data, ExecutionRecord, WorkflowError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// Lifecycle of a stored run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// What the store keeps for each run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub graph_id: String,
    pub status: RunStatus,
    pub state: Data,
    pub metadata: Data,
    pub log: Vec<ExecutionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunRecord {
    fn running(run_id: &str, graph_id: &str) -> Self {
        Self::empty(run_id, graph_id, RunStatus::Running, None)
    }

    fn failed(run_id: &str, graph_id: &str, error: String) -> Self {
        Self::empty(run_id, graph_id, RunStatus::Failed, Some(error))
    }

    fn completed(run_id: &str, graph_id: &str, outcome: RunOutcome) -> Self {
        let (state, metadata) = outcome.state.into_parts();
        Self {
            run_id: run_id.to_string(),
            graph_id: graph_id.to_string(),
            status: RunStatus::Completed,
            state,
            metadata,
            log: outcome.log,
            error: None,
        }
    }

    fn empty(run_id: &str, graph_id: &str, status: RunStatus, error: Option<String>) -> Self {
        Self {
            run_id: run_id.to_string(),
            graph_id: graph_id.to_string(),
            status,
            state: Data::new(),
            metadata: Data::new(),
            log: Vec::new(),
            error,
        }
    }
}

/// A run started by [`RunStore::run_async`].
#[derive(Debug)]
pub struct BackgroundRun {
    run_id: String,
    handle: JoinHandle<()>,
}

impl BackgroundRun {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Waits until the run's final record has been stored.
    pub async fn finished(self) {
        if let Err(e) = self.handle.await {
            warn!(run_id = %self.run_id, "Background run task failed: {}", e);
        }
    }
}

/// Shared handle to the graph and run registry.
///
/// Clones share the same maps. Construct one per process (or per test) and pass
/// it to whatever needs it.
#[derive(Debug, Clone, Default)]
pub struct RunStore {
    graphs: Arc<RwLock<HashMap<String, Arc<GraphDefinition>>>>,
    runs: Arc<RwLock<HashMap<String, RunRecord>>>,
    engine: ExecutionEngine,
}

impl RunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph of the named workflow kind and stores it under a fresh id.
    pub async fn create_graph(&self, kind: &str, config: &Value) -> Result<String, WorkflowError> {
        let kind: WorkflowKind = kind.parse()?;
        let graph = kind.build(Uuid::new_v4().to_string(), config)?;
        info!(graph_id = %graph.id(), kind = %kind, "Graph created");
        Ok(self.insert_graph(graph).await)
    }

    /// Stores a prebuilt graph under its own id and returns that id.
    pub async fn insert_graph(&self, graph: GraphDefinition) -> String {
        let id = graph.id().to_string();
        self.graphs.write().await.insert(id.clone(), Arc::new(graph));
        id
    }

    pub async fn graph(&self, graph_id: &str) -> Option<Arc<GraphDefinition>> {
        self.graphs.read().await.get(graph_id).cloned()
    }

    /// Returns all graph ids, sorted.
    pub async fn list_graphs(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.graphs.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn require_graph(&self, graph_id: &str) -> Result<Arc<GraphDefinition>, WorkflowError> {
        self.graph(graph_id)
            .await
            .ok_or_else(|| WorkflowError::GraphNotFound(graph_id.to_string()))
    }

    /// Runs a stored graph to its end and records the result.
    ///
    /// A resolver failure is recorded as a failed run and also returned.
    pub async fn run(&self, graph_id: &str, initial: Data) -> Result<RunRecord, WorkflowError> {
        let graph = self.require_graph(graph_id).await?;
        let run_id = Uuid::new_v4().to_string();
        self.execute(graph, initial, run_id).await
    }

    /// Starts a stored graph on the tokio runtime and returns immediately.
    ///
    /// The run is recorded as `running` until the task stores its final record.
    pub async fn run_async(
        &self,
        graph_id: &str,
        initial: Data,
    ) -> Result<BackgroundRun, WorkflowError> {
        let graph = self.require_graph(graph_id).await?;
        let run_id = Uuid::new_v4().to_string();
        self.put_run(RunRecord::running(&run_id, graph_id)).await;

        let store = self.clone();
        let task_run_id = run_id.clone();
        let handle = tokio::spawn(async move {
            // The failed record is already stored by `execute`.
            let _ = store.execute(graph, initial, task_run_id).await;
        });

        Ok(BackgroundRun { run_id, handle })
    }

    async fn execute(
        &self,
        graph: Arc<GraphDefinition>,
        initial: Data,
        run_id: String,
    ) -> Result<RunRecord, WorkflowError> {
        match self.engine.run(&graph, initial, Some(run_id.clone())).await {
            Ok(outcome) => {
                let record = RunRecord::completed(&run_id, graph.id(), outcome);
                self.put_run(record.clone()).await;
                Ok(record)
            }
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "Run failed");
                self.put_run(RunRecord::failed(&run_id, graph.id(), e.to_string()))
                    .await;
                Err(e)
            }
        }
    }

    async fn put_run(&self, record: RunRecord) {
        self.runs.write().await.insert(record.run_id.clone(), record);
    }

    pub async fn run_record(&self, run_id: &str) -> Option<RunRecord> {
        self.runs.read().await.get(run_id).cloned()
    }

    /// Returns the stored data and metadata of a run.
    pub async fn state(&self, run_id: &str) -> Result<(Data, Data), WorkflowError> {
        self.run_record(run_id)
            .await
            .map(|record| (record.state, record.metadata))
            .ok_or_else(|| WorkflowError::RunNotFound(run_id.to_string()))
    }

    /// Returns all run ids, sorted.
    pub async fn list_runs(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.runs.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}
