//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - Workers that record when they ran
//! - A subtask-capable worker with configurable splitting
//! - Predefined project shapes

use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use weft::{Project, SubTask, SubtaskWorker, Task, Worker, WorkerContext};

/// When one unit of work ran.
#[derive(Debug, Clone)]
pub struct Span {
    pub name: String,
    pub start: Instant,
    pub end: Instant,
}

impl Span {
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Shared, thread-safe record of spans.
#[derive(Debug, Clone, Default)]
pub struct ExecLog {
    spans: Arc<Mutex<Vec<Span>>>,
}

impl ExecLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &str, start: Instant) {
        self.spans.lock().unwrap().push(Span {
            name: name.to_string(),
            start,
            end: Instant::now(),
        });
    }

    pub fn spans(&self) -> Vec<Span> {
        self.spans.lock().unwrap().clone()
    }

    pub fn span(&self, name: &str) -> Span {
        self.spans()
            .into_iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("no span recorded for '{}'", name))
    }

    /// Names in completion order.
    pub fn names(&self) -> Vec<String> {
        self.spans().into_iter().map(|s| s.name).collect()
    }

    pub fn len(&self) -> usize {
        self.spans.lock().unwrap().len()
    }
}

/// A worker that sleeps, records its span under the task name, and returns
/// `{"task": <name>, "input": <input>}`.
pub struct RecordingWorker {
    log: ExecLog,
    delay: Duration,
}

impl RecordingWorker {
    pub fn new(log: &ExecLog, delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            log: log.clone(),
            delay: Duration::from_millis(delay_ms),
        })
    }
}

impl Worker for RecordingWorker {
    fn execute(&self, input: &Value, ctx: &WorkerContext) -> anyhow::Result<Value> {
        let start = Instant::now();
        thread::sleep(self.delay);
        self.log.record(&ctx.task, start);
        Ok(json!({"task": ctx.task, "input": input}))
    }
}

/// A worker that always fails, optionally after a delay.
pub struct FailingWorker {
    message: String,
    delay: Duration,
}

impl FailingWorker {
    pub fn new(message: &str) -> Arc<Self> {
        Self::after(message, 0)
    }

    pub fn after(message: &str, delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            message: message.to_string(),
            delay: Duration::from_millis(delay_ms),
        })
    }
}

impl Worker for FailingWorker {
    fn execute(&self, _input: &Value, _ctx: &WorkerContext) -> anyhow::Result<Value> {
        thread::sleep(self.delay);
        anyhow::bail!("{}", self.message)
    }
}

/// A subtask worker splitting its task into `count` numbered subtasks.
///
/// Subtasks named in `failing` return an error and those in `panicking`
/// panic. With `chained`, each subtask depends on the previous one; with
/// `reusing_ids`, every subtask is a clone of the first. Every subtask sleeps
/// briefly and returns `[<name>]`, so the default combine concatenates names.
pub struct ChunkWorker {
    pub log: ExecLog,
    count: usize,
    chained: bool,
    failing: Vec<String>,
    panicking: Vec<String>,
    reusing_ids: bool,
    delay: Duration,
    combines: Mutex<Vec<Instant>>,
}

impl ChunkWorker {
    pub fn new(log: &ExecLog, count: usize) -> Self {
        Self {
            log: log.clone(),
            count,
            chained: false,
            failing: Vec::new(),
            panicking: Vec::new(),
            reusing_ids: false,
            delay: Duration::from_millis(20),
            combines: Mutex::new(Vec::new()),
        }
    }

    pub fn chained(mut self) -> Self {
        self.chained = true;
        self
    }

    pub fn failing(mut self, name: &str) -> Self {
        self.failing.push(name.to_string());
        self
    }

    pub fn panicking(mut self, name: &str) -> Self {
        self.panicking.push(name.to_string());
        self
    }

    pub fn reusing_ids(mut self) -> Self {
        self.reusing_ids = true;
        self
    }

    /// When each combine call started.
    pub fn combine_calls(&self) -> Vec<Instant> {
        self.combines.lock().unwrap().clone()
    }
}

impl Worker for ChunkWorker {
    fn execute(&self, input: &Value, _ctx: &WorkerContext) -> anyhow::Result<Value> {
        Ok(input.clone())
    }

    fn as_subtask_worker(&self) -> Option<&dyn SubtaskWorker> {
        Some(self)
    }
}

impl SubtaskWorker for ChunkWorker {
    fn create_subtasks(&self, input: &Value, _ctx: &WorkerContext) -> anyhow::Result<Vec<SubTask>> {
        let mut subtasks: Vec<SubTask> = Vec::new();
        for i in 1..=self.count {
            // Parent left empty: the task runner fills it in.
            let mut subtask = SubTask::new("", &format!("part_{}", i), "", input.clone());
            if self.reusing_ids {
                if let Some(first) = subtasks.first() {
                    subtask = first.clone();
                }
            }
            if self.chained {
                if let Some(prev) = subtasks.last() {
                    subtask = subtask.depends_on(&[prev.id]);
                }
            }
            subtasks.push(subtask);
        }
        Ok(subtasks)
    }

    fn execute_subtask(&self, subtask: &SubTask, _ctx: &WorkerContext) -> anyhow::Result<Value> {
        let start = Instant::now();
        thread::sleep(self.delay);
        self.log.record(&subtask.name, start);
        if subtask.parent_task_name.is_empty() {
            anyhow::bail!("subtask '{}' has no parent", subtask.name);
        }
        if self.failing.contains(&subtask.name) {
            anyhow::bail!("{} failed", subtask.name);
        }
        if self.panicking.contains(&subtask.name) {
            panic!("{} panicked", subtask.name);
        }
        Ok(json!([subtask.name]))
    }

    fn combine_subtask_results(
        &self,
        subtasks: &[SubTask],
        original_input: &Value,
        _ctx: &WorkerContext,
    ) -> anyhow::Result<Value> {
        self.combines.lock().unwrap().push(Instant::now());
        Ok(weft::combine_results(subtasks, original_input))
    }
}

/// `n` independent tasks named `t1..tn`, all bound to `worker`.
pub fn independent_project(n: usize, worker: Arc<dyn Worker>) -> Project {
    let mut project = Project::new("independent").with_worker("w", worker);
    for i in 1..=n {
        project.add_task(Task::new(&format!("t{}", i), "w"));
    }
    project
}

/// A -> B -> C.
pub fn chain_project(worker: Arc<dyn Worker>) -> Project {
    Project::new("chain")
        .with_worker("w", worker)
        .with_task(Task::new("A", "w"))
        .with_task(Task::new("B", "w").depends_on(&["A"]))
        .with_task(Task::new("C", "w").depends_on(&["B"]))
}

/// A, B -> C.
pub fn join_project(worker: Arc<dyn Worker>) -> Project {
    Project::new("join")
        .with_worker("w", worker)
        .with_task(Task::new("A", "w"))
        .with_task(Task::new("B", "w"))
        .with_task(Task::new("C", "w").depends_on(&["A", "B"]))
}
