use async_trait::async_trait;
use kairo::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn data(value: Value) -> Data {
    match value {
        Value::Object(map) => map,
        _ => Data::new(),
    }
}

fn entries(outcome: &RunOutcome) -> Vec<(&str, StepStatus)> {
    outcome
        .log
        .iter()
        .map(|r| (r.node.as_str(), r.status))
        .collect()
}

fn noop() -> impl Transform {
    transform_fn(|_| Ok(None))
}

#[tokio::test]
async fn test_linear_graph() {
    let graph = GraphDefinition::builder()
        .add_step("n1", noop())
        .add_step("n2", noop())
        .add_step("n3", noop())
        .add_edge("n1", "n2")
        .add_edge("n2", "n3")
        .build()
        .expect("valid graph");

    let outcome = graph.run(Data::new(), None).await.expect("run succeeds");

    assert_eq!(
        entries(&outcome),
        vec![
            ("n1", StepStatus::Success),
            ("n2", StepStatus::Success),
            ("n3", StepStatus::Success),
        ]
    );
    assert!(outcome.is_completed());
    assert_eq!(outcome.iterations_used(), 3);
    assert_eq!(outcome.termination, Termination::Finished);
}

#[tokio::test]
async fn test_bounded_loop() {
    let graph = GraphDefinition::builder()
        .add_step(
            "loop",
            transform_fn(|state| {
                let count = state.get_as::<i64>("count").unwrap_or(0);
                Ok(Some(json!({"count": count + 1})))
            }),
        )
        .add_conditional_edge("loop", |_| Some(StepName::new("loop")))
        .iteration_cap(10)
        .build()
        .expect("valid graph");

    let outcome = graph
        .run(data(json!({"count": 0})), None)
        .await
        .expect("run succeeds");

    assert_eq!(outcome.log.len(), 10);
    assert!(outcome.log.iter().all(|r| r.status == StepStatus::Success));
    assert_eq!(outcome.iterations_used(), 10);
    assert!(!outcome.is_completed());
    assert_eq!(outcome.termination, Termination::Exhausted);
    assert_eq!(outcome.state.get("count"), Some(&json!(10)));
    // The engine never touches the step-owned counter.
    assert_eq!(outcome.state.iteration(), 0);
}

#[tokio::test]
async fn test_fatal_step_halts_run() {
    let graph = GraphDefinition::builder()
        .add_step(
            "fail",
            transform_fn(|state| {
                state.set("attempted", true);
                Err(WorkflowError::transform("Intentional error"))
            }),
        )
        .add_step("ok", transform_fn(|_| Ok(Some(json!({"success": true})))))
        .add_edge("fail", "ok")
        .build()
        .expect("valid graph");

    let outcome = graph.run(Data::new(), None).await.expect("run succeeds");

    assert_eq!(entries(&outcome), vec![("fail", StepStatus::Error)]);
    let error = outcome.log[0].error.as_deref().unwrap_or_default();
    assert!(error.contains("Intentional error"));
    assert!(outcome.state.get("success").is_none());
    assert_eq!(outcome.state.get("attempted"), Some(&json!(true)));
    assert!(!outcome.is_completed());
}

#[tokio::test]
async fn test_skip_then_run() {
    let graph = GraphDefinition::builder()
        .add_step_when(
            "gate",
            transform_fn(|_| Ok(Some(json!({"gated": true})))),
            |_| false,
        )
        .add_step("next", transform_fn(|_| Ok(Some(json!({"next": true})))))
        .add_edge("gate", "next")
        .build()
        .expect("valid graph");

    let outcome = graph.run(Data::new(), None).await.expect("run succeeds");

    assert_eq!(
        entries(&outcome),
        vec![("gate", StepStatus::Skipped), ("next", StepStatus::Success)]
    );
    assert!(outcome.state.get("gated").is_none());
    assert_eq!(outcome.iterations_used(), 1);
    assert!(outcome.is_completed());
}

#[tokio::test]
async fn test_skip_never_consults_resolver() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let graph = GraphDefinition::builder()
        .add_step_when("gate", noop(), |_| false)
        .add_step("static_next", noop())
        .add_step("branch_next", noop())
        .add_edge("gate", "static_next")
        .add_conditional_edge("gate", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(StepName::new("branch_next"))
        })
        .build()
        .expect("valid graph");

    let outcome = graph.run(Data::new(), None).await.expect("run succeeds");

    assert_eq!(
        entries(&outcome),
        vec![
            ("gate", StepStatus::Skipped),
            ("static_next", StepStatus::Success)
        ]
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_skipped_step_without_edge_ends_run() {
    let graph = GraphDefinition::builder()
        .add_step_when("gate", noop(), |_| false)
        .build()
        .expect("valid graph");

    let outcome = graph.run(Data::new(), None).await.expect("run succeeds");

    assert_eq!(entries(&outcome), vec![("gate", StepStatus::Skipped)]);
    assert_eq!(outcome.iterations_used(), 0);
    assert!(outcome.is_completed());
}

#[tokio::test]
async fn test_predicate_reads_current_state() {
    let graph = GraphDefinition::builder()
        .add_step("check", transform_fn(|_| Ok(Some(json!({"value": 3})))))
        .add_step_when(
            "high",
            transform_fn(|_| Ok(Some(json!({"path": "high"})))),
            |state| state.get_as::<i64>("value").unwrap_or(0) > 5,
        )
        .add_step("done", noop())
        .add_edge("check", "high")
        .add_edge("high", "done")
        .build()
        .expect("valid graph");

    let outcome = graph.run(Data::new(), None).await.expect("run succeeds");

    assert_eq!(
        entries(&outcome),
        vec![
            ("check", StepStatus::Success),
            ("high", StepStatus::Skipped),
            ("done", StepStatus::Success),
        ]
    );
    assert!(outcome.state.get("path").is_none());
}

#[tokio::test]
async fn test_loop_until_condition() {
    let graph = GraphDefinition::builder()
        .add_step(
            "increment",
            transform_fn(|state| {
                state.increment_iteration();
                let counter = state.get_as::<i64>("counter").unwrap_or(0);
                Ok(Some(json!({"counter": counter + 1})))
            }),
        )
        .add_conditional_edge("increment", |state| {
            (state.get_as::<i64>("counter").unwrap_or(0) < 5).then(|| StepName::new("increment"))
        })
        .build()
        .expect("valid graph");

    let outcome = graph
        .run(data(json!({"counter": 0})), None)
        .await
        .expect("run succeeds");

    assert_eq!(outcome.state.get("counter"), Some(&json!(5)));
    assert_eq!(outcome.log.len(), 5);
    let iterations: Vec<u32> = outcome.log.iter().map(|r| r.iteration).collect();
    assert_eq!(iterations, vec![1, 2, 3, 4, 5]);
    assert_eq!(outcome.state.iteration(), 5);
    assert!(outcome.is_completed());
}

#[tokio::test]
async fn test_error_is_always_last_entry() {
    let graph = GraphDefinition::builder()
        .add_step("a", noop())
        .add_step("b", transform_fn(|_| Err(WorkflowError::transform("b broke"))))
        .add_step("c", noop())
        .add_edge("a", "b")
        .add_conditional_edge("b", |_| Some(StepName::new("c")))
        .build()
        .expect("valid graph");

    let outcome = graph.run(Data::new(), None).await.expect("run succeeds");

    let first_error = outcome
        .log
        .iter()
        .position(|r| r.status == StepStatus::Error);
    assert_eq!(first_error, Some(outcome.log.len() - 1));
    assert_eq!(outcome.iterations_used(), 1);
    assert!(matches!(
        outcome.termination,
        Termination::Halted { ref step, .. } if step.as_str() == "b"
    ));
}

#[derive(Debug)]
struct SlowIncrement {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl Transform for SlowIncrement {
    async fn apply(&self, state: &mut WorkflowState) -> TransformResult {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let total = state.get_as::<u32>("total").unwrap_or(0);
        Ok(Some(json!({"total": total + 1, "last_call": call})))
    }
}

#[tokio::test]
async fn test_async_transform_is_awaited() {
    let calls = Arc::new(AtomicU32::new(0));
    let graph = GraphDefinition::builder()
        .add_step(
            "slow",
            SlowIncrement {
                calls: calls.clone(),
            },
        )
        .add_step("after", transform_fn(|state| {
            Ok(Some(json!({"seen_total": state.get_or("total", 0)})))
        }))
        .add_edge("slow", "after")
        .build()
        .expect("valid graph");

    let outcome = graph.run(Data::new(), None).await.expect("run succeeds");

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.state.get("seen_total"), Some(&json!(1)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_runs_share_definition() {
    let graph = Arc::new(
        GraphDefinition::builder()
            .add_step(
                "double",
                transform_fn(|state| {
                    let n = state.get_as::<i64>("n").unwrap_or(0);
                    Ok(Some(json!({"n": n * 2})))
                }),
            )
            .add_conditional_edge("double", |state| {
                (state.get_as::<i64>("n").unwrap_or(0) < 1000).then(|| StepName::new("double"))
            })
            .build()
            .expect("valid graph"),
    );

    let handles: Vec<_> = (1..=8)
        .map(|seed| {
            let graph = graph.clone();
            tokio::spawn(async move {
                graph
                    .run(data(json!({"n": seed})), Some(format!("run-{}", seed)))
                    .await
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let seed = i as i64 + 1;
        let outcome = handle
            .await
            .expect("task joins")
            .expect("run succeeds");

        let mut expected = seed;
        let mut steps = 0;
        while expected < 1000 {
            expected *= 2;
            steps += 1;
        }
        assert_eq!(outcome.state.run_id(), Some(format!("run-{}", seed).as_str()));
        assert_eq!(outcome.state.get("n"), Some(&json!(expected)));
        assert_eq!(outcome.iterations_used(), steps);
    }
}

#[test]
fn test_blocking_run() {
    let graph = GraphDefinition::builder()
        .add_step("only", transform_fn(|_| Ok(Some(json!({"done": true})))))
        .build()
        .expect("valid graph");

    let outcome = tokio_test::block_on(graph.run(Data::new(), Some("sync".to_string())))
        .expect("run succeeds");

    assert_eq!(outcome.state.run_id(), Some("sync"));
    assert_eq!(outcome.state.get("done"), Some(&json!(true)));
}

#[test]
fn test_outcome_serializes() {
    let graph = GraphDefinition::builder()
        .add_step("fail", transform_fn(|_| Err(WorkflowError::transform("nope"))))
        .build()
        .expect("valid graph");

    let outcome = tokio_test::block_on(graph.run(Data::new(), Some("r".to_string())))
        .expect("run succeeds");
    let value = serde_json::to_value(&outcome).expect("serializable");

    assert_eq!(value["state"]["metadata"]["run_id"], "r");
    assert_eq!(value["state"]["metadata"]["completed"], false);
    assert_eq!(value["state"]["metadata"]["iterations_used"], 0);
    assert_eq!(value["log"][0]["status"], "error");
    assert_eq!(value["log"][0]["error"], "nope");
    assert_eq!(value["termination"]["kind"], "halted");
}
