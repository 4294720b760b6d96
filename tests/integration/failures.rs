//! Failure propagation tests.
//!
//! A failing task aborts the run: nothing downstream starts and no partial
//! results come back.

use serde_json::json;
use std::sync::Arc;

use weft::{Error, Project, ProjectRunner, RunEvent, Task};

use crate::fixtures::{ExecLog, FailingWorker, RecordingWorker};

/// Test: A failing root aborts the run
/// Given A (fails) -> B
/// When the project runs
/// Then the error names A, carries its message, and B never runs
#[test]
fn test_task_failure_aborts_run() {
    let log = ExecLog::new();
    let project = Project::new("abort")
        .with_worker("ok", RecordingWorker::new(&log, 0))
        .with_worker("bad", FailingWorker::new("model unavailable"))
        .with_task(Task::new("A", "bad"))
        .with_task(Task::new("B", "ok").depends_on(&["A"]));

    let err = ProjectRunner::new(&project, true, 4).run(json!({})).unwrap_err();

    assert!(matches!(err, Error::WorkerExecution { .. }));
    assert_eq!(err.task(), Some("A"));
    assert!(err.to_string().contains("model unavailable"));
    assert_eq!(log.len(), 0);
}

/// Test: Failure in a later round
/// Given A -> B (fails) -> C
/// When the project runs
/// Then A ran, C did not, and the error names B
#[test]
fn test_mid_chain_failure() {
    let log = ExecLog::new();
    let project = Project::new("mid")
        .with_worker("ok", RecordingWorker::new(&log, 0))
        .with_worker("bad", FailingWorker::new("bad output"))
        .with_task(Task::new("A", "ok"))
        .with_task(Task::new("B", "bad").depends_on(&["A"]))
        .with_task(Task::new("C", "ok").depends_on(&["B"]));

    let err = ProjectRunner::new(&project, true, 2).run(json!({})).unwrap_err();

    assert_eq!(err.task(), Some("B"));
    assert_eq!(log.names(), vec!["A"]);
}

/// Test: Siblings already running finish, nothing new starts
/// Given A (fails) and slow B in one round, C depending on B
/// When the project runs with 2 workers
/// Then B completes, C never starts, and the failure is reported
#[test]
fn test_running_siblings_drain_before_abort() {
    let log = ExecLog::new();
    let project = Project::new("drain")
        .with_worker("slow", RecordingWorker::new(&log, 50))
        // A fails only once B has been picked up by the second worker.
        .with_worker("bad", FailingWorker::after("boom", 20))
        .with_task(Task::new("A", "bad"))
        .with_task(Task::new("B", "slow"))
        .with_task(Task::new("C", "slow").depends_on(&["B"]));
    let (tx, rx) = crossbeam_channel::unbounded();

    let err = ProjectRunner::new(&project, true, 2)
        .with_events(tx)
        .run(json!({}))
        .unwrap_err();

    assert_eq!(err.task(), Some("A"));
    assert_eq!(log.names(), vec!["B"]);

    let events: Vec<RunEvent> = rx.try_iter().collect();
    assert!(events.iter().any(|e| matches!(e, RunEvent::TaskFailed { task, .. } if task == "A")));
    assert!(events
        .iter()
        .any(|e| matches!(e, RunEvent::TaskCompleted { task, .. } if task == "B")));
    assert!(!events.contains(&RunEvent::TaskStarted { task: "C".into() }));
    assert!(!events.contains(&RunEvent::AllTasksComplete));
}

/// Test: A panicking worker fails its task instead of the process
/// Given A (panics) -> B
/// When the project runs
/// Then run returns a WorkerExecution error naming A and B never runs
#[test]
fn test_worker_panic_becomes_error() {
    use serde_json::Value;
    use weft::{FnWorker, WorkerContext};

    let log = ExecLog::new();
    let project = Project::new("panic")
        .with_worker("ok", RecordingWorker::new(&log, 0))
        .with_worker(
            "panics",
            Arc::new(FnWorker::new(
                |_input: &Value, _ctx: &WorkerContext| -> anyhow::Result<Value> {
                    panic!("unexpected response shape")
                },
            )),
        )
        .with_task(Task::new("A", "panics"))
        .with_task(Task::new("B", "ok").depends_on(&["A"]));

    let err = ProjectRunner::new(&project, true, 2).run(json!({})).unwrap_err();

    assert!(matches!(err, Error::WorkerExecution { .. }));
    assert_eq!(err.task(), Some("A"));
    assert!(err.to_string().contains("unexpected response shape"));
    assert_eq!(log.len(), 0);
}

/// Test: Unknown worker fails the task, not validation
/// Given a task bound to an unregistered worker
/// When the project runs
/// Then a WorkerNotFound error is returned
#[test]
fn test_unknown_worker() {
    let project = Project::new("ghost").with_task(Task::new("A", "nobody"));

    let err = ProjectRunner::new(&project, true, 1).run(json!({})).unwrap_err();

    assert!(!err.is_configuration());
    match err {
        Error::WorkerNotFound { task, worker } => {
            assert_eq!(task, "A");
            assert_eq!(worker, "nobody");
        }
        other => panic!("expected WorkerNotFound, got {:?}", other),
    }
}

/// Test: Subtask creation failure fails the task
/// Given a splitting worker whose create_subtasks errors
/// When the task's project runs
/// Then a SubtaskCreation error names the task
#[test]
fn test_subtask_creation_failure() {
    use serde_json::Value;
    use weft::{SubTask, SubtaskWorker, Worker, WorkerContext};

    struct NoSplit;

    impl Worker for NoSplit {
        fn execute(&self, input: &Value, _ctx: &WorkerContext) -> anyhow::Result<Value> {
            Ok(input.clone())
        }

        fn as_subtask_worker(&self) -> Option<&dyn SubtaskWorker> {
            Some(self)
        }
    }

    impl SubtaskWorker for NoSplit {
        fn create_subtasks(
            &self,
            _input: &Value,
            _ctx: &WorkerContext,
        ) -> anyhow::Result<Vec<SubTask>> {
            anyhow::bail!("cannot plan")
        }

        fn execute_subtask(
            &self,
            _subtask: &SubTask,
            _ctx: &WorkerContext,
        ) -> anyhow::Result<Value> {
            Ok(Value::Null)
        }
    }

    let project = Project::new("plan")
        .with_worker("nosplit", Arc::new(NoSplit))
        .with_task(Task::new("plan", "nosplit").with_parallel_subtasks(true));

    let err = ProjectRunner::new(&project, true, 1).run(json!({})).unwrap_err();

    assert!(matches!(err, Error::SubtaskCreation { ref task, .. } if task == "plan"));
    assert!(err.to_string().contains("cannot plan"));
}
