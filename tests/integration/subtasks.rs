//! Subtask execution tests.
//!
//! These tests verify that a task split into subtasks runs them on the inner
//! pool, respects their dependencies, isolates their failures and combines
//! exactly once.

use serde_json::{json, Value};
use std::sync::Arc;

use weft::{Project, ProjectRunner, RunEvent, SplitWorker, Task, TaskRunner, WorkerContext};

use crate::fixtures::{ChunkWorker, ExecLog};

fn project_with(worker: Arc<ChunkWorker>) -> (Project, Task) {
    let task = Task::new("split", "chunks").with_parallel_subtasks(true);
    let project = Project::new("subtasks")
        .with_worker("chunks", worker)
        .with_task(task.clone());
    (project, task)
}

/// Test: All subtasks run before a single combine
/// Given a task split into 5 independent subtasks
/// When the task runs
/// Then 5 subtasks executed, combine ran once after all of them
#[test]
fn test_subtasks_execute_then_combine_once() {
    let log = ExecLog::new();
    let worker = Arc::new(ChunkWorker::new(&log, 5));
    let (project, task) = project_with(worker.clone());

    let output = TaskRunner::new(&task, &project)
        .with_subtask_workers(3)
        .run(json!({}))
        .unwrap();

    assert_eq!(log.len(), 5);
    let combines = worker.combine_calls();
    assert_eq!(combines.len(), 1);
    assert!(log.spans().iter().all(|s| s.end <= combines[0]));
    assert_eq!(
        output,
        json!(["part_1", "part_2", "part_3", "part_4", "part_5"])
    );
}

/// Test: Subtasks run concurrently on the inner pool
/// Given 4 independent subtasks and 4 subtask workers
/// When the task runs
/// Then at least two subtasks overlap
#[test]
fn test_subtasks_run_concurrently() {
    let log = ExecLog::new();
    let worker = Arc::new(ChunkWorker::new(&log, 4));
    let (project, task) = project_with(worker);

    TaskRunner::new(&task, &project)
        .with_subtask_workers(4)
        .run(json!({}))
        .unwrap();

    let spans = log.spans();
    let overlapping = spans
        .iter()
        .enumerate()
        .any(|(i, a)| spans.iter().skip(i + 1).any(|b| a.overlaps(b)));
    assert!(overlapping);
}

/// Test: Chained subtasks respect their dependencies
/// Given subtasks part_1 -> part_2 -> part_3
/// When the task runs with ample workers
/// Then they execute in order, each after its predecessor finished
#[test]
fn test_chained_subtasks_in_order() {
    let log = ExecLog::new();
    let worker = Arc::new(ChunkWorker::new(&log, 3).chained());
    let (project, task) = project_with(worker);

    TaskRunner::new(&task, &project)
        .with_subtask_workers(4)
        .run(json!({}))
        .unwrap();

    assert_eq!(log.names(), vec!["part_1", "part_2", "part_3"]);
    assert!(log.span("part_1").end <= log.span("part_2").start);
    assert!(log.span("part_2").end <= log.span("part_3").start);
}

/// Test: A failing subtask does not fail its task
/// Given 3 subtasks where part_2 fails
/// When the task runs
/// Then the others complete and the combined output carries the error
#[test]
fn test_subtask_failure_isolated() {
    let log = ExecLog::new();
    let worker = Arc::new(ChunkWorker::new(&log, 3).failing("part_2"));
    let (project, task) = project_with(worker.clone());

    let output = TaskRunner::new(&task, &project).run(json!({})).unwrap();

    assert_eq!(log.len(), 3);
    assert_eq!(worker.combine_calls().len(), 1);
    // Mixed arrays and an error object: combined as numbered entries.
    assert_eq!(output["subtask_1_result"], json!(["part_1"]));
    assert_eq!(output["subtask_2_result"], json!({"error": "part_2 failed"}));
    assert_eq!(output["subtask_3_result"], json!(["part_3"]));
}

/// Test: A panicking subtask is contained like a failing one
/// Given 3 subtasks where part_2 panics
/// When the project runs
/// Then the run succeeds and the combined output carries the panic message
#[test]
fn test_subtask_panic_isolated() {
    let log = ExecLog::new();
    let worker = Arc::new(ChunkWorker::new(&log, 3).panicking("part_2"));
    let (project, _task) = project_with(worker.clone());

    let results = ProjectRunner::new(&project, true, 2)
        .with_subtask_workers(2)
        .run(json!({}))
        .unwrap();

    assert_eq!(log.len(), 3);
    assert_eq!(worker.combine_calls().len(), 1);
    let output = results.data("split").unwrap();
    assert_eq!(output["subtask_1_result"], json!(["part_1"]));
    assert_eq!(
        output["subtask_2_result"],
        json!({"error": "panicked: part_2 panicked"})
    );
    assert_eq!(output["subtask_3_result"], json!(["part_3"]));
}

/// Test: Subtasks sharing an id fall back to the plain path
/// Given a worker returning 3 clones of one subtask
/// When the task runs
/// Then no subtask executes, combine never runs, and execute's output is returned
#[test]
fn test_reused_subtask_ids_run_directly() {
    let log = ExecLog::new();
    let worker = Arc::new(ChunkWorker::new(&log, 3).reusing_ids());
    let (project, task) = project_with(worker.clone());

    let output = TaskRunner::new(&task, &project)
        .with_subtask_workers(3)
        .run(json!({"doc": "x"}))
        .unwrap();

    assert_eq!(log.len(), 0);
    assert!(worker.combine_calls().is_empty());
    assert_eq!(output, json!({"doc": "x"}));
}

/// Test: A failed subtask still unblocks its dependents
/// Given part_1 -> part_2 -> part_3 where part_1 fails
/// When the task runs
/// Then part_2 and part_3 still execute
#[test]
fn test_failed_subtask_counts_as_finished() {
    let log = ExecLog::new();
    let worker = Arc::new(ChunkWorker::new(&log, 3).chained().failing("part_1"));
    let (project, task) = project_with(worker);

    TaskRunner::new(&task, &project).run(json!({})).unwrap();

    assert_eq!(log.names(), vec!["part_1", "part_2", "part_3"]);
}

/// Test: Subtask events flow through the project runner
/// Given a project whose only task splits into 2 subtasks, one failing
/// When the project runs with an event channel
/// Then two SubtaskFinished events arrive, one marked failed
#[test]
fn test_subtask_events_through_project() {
    let log = ExecLog::new();
    let worker = Arc::new(ChunkWorker::new(&log, 2).failing("part_2"));
    let (project, _task) = project_with(worker);
    let (tx, rx) = crossbeam_channel::unbounded();

    let results = ProjectRunner::new(&project, true, 2)
        .with_subtask_workers(2)
        .with_events(tx)
        .run(json!({}))
        .unwrap();

    assert!(results.contains("split"));
    let finished: Vec<(String, bool)> = rx
        .try_iter()
        .filter_map(|e| match e {
            RunEvent::SubtaskFinished { subtask, failed, .. } => Some((subtask, failed)),
            _ => None,
        })
        .collect();
    assert_eq!(finished.len(), 2);
    assert!(finished.contains(&("part_1".to_string(), false)));
    assert!(finished.contains(&("part_2".to_string(), true)));
}

/// Test: SplitWorker splits a list across a project run
/// Given a task over [1..=8] with a splitter squaring each chunk
/// When the project runs
/// Then the output is every square, in order
#[test]
fn test_split_worker_in_project() {
    let splitter = SplitWorker::new(|subtask, _ctx: &WorkerContext| {
        let items = subtask.input_data.as_array().cloned().unwrap_or_default();
        Ok(Value::Array(
            items
                .iter()
                .map(|v| {
                    let n = v.as_i64().unwrap_or_default();
                    json!(n * n)
                })
                .collect(),
        ))
    })
    .with_num_subtasks(4);
    let project = Project::new("squares")
        .with_worker("split", Arc::new(splitter))
        .with_task(
            Task::new("square", "split")
                .with_input_key("numbers")
                .with_parallel_subtasks(true),
        );

    let results = ProjectRunner::new(&project, true, 1)
        .with_subtask_workers(4)
        .run(json!({"numbers": [1, 2, 3, 4, 5, 6, 7, 8]}))
        .unwrap();

    assert_eq!(
        results.data("square"),
        Some(&json!([1, 4, 9, 16, 25, 36, 49, 64]))
    );
}
