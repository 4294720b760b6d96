//! Worker capability contract.
//!
//! Workers are the pluggable collaborators tasks are bound to. Every worker
//! implements [`Worker`]; workers that can split a task into independently
//! schedulable pieces also implement [`SubtaskWorker`] and expose it through
//! [`Worker::as_subtask_worker`].

mod closure;
pub mod history;
mod splitter;

pub use closure::FnWorker;
pub use splitter::SplitWorker;

use crate::core::task::SubTask;
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Per-call context handed to workers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerContext {
    /// Project being run.
    pub project: String,
    /// Task being executed.
    pub task: String,
    /// Where workers that write files should put them.
    pub output_dir: Option<PathBuf>,
}

impl WorkerContext {
    pub fn new(project: &str, task: &str) -> Self {
        Self {
            project: project.to_string(),
            task: task.to_string(),
            output_dir: None,
        }
    }

    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.output_dir = dir;
        self
    }
}

/// A unit of execution a task is bound to.
pub trait Worker: Send + Sync {
    /// Produce the task output from its extracted input.
    fn execute(&self, input: &Value, ctx: &WorkerContext) -> anyhow::Result<Value>;

    /// Rewrite the task's full input before key extraction.
    ///
    /// Workers whose input grows with every iteration override this to bound it
    /// (see [`history::compact_history`]).
    fn prepare_input(&self, input: Value) -> Value {
        input
    }

    /// Rewrite the worker's result before it is stored.
    ///
    /// Applied on both the plain and the subtask path, before `output_key`.
    fn prepare_output(&self, output: Value) -> Value {
        output
    }

    /// The subtask interface, for workers that implement it.
    fn as_subtask_worker(&self) -> Option<&dyn SubtaskWorker> {
        None
    }
}

/// A worker that can split one task into subtasks.
pub trait SubtaskWorker: Worker {
    /// Split the task input. An empty list means "run the plain path".
    fn create_subtasks(&self, input: &Value, ctx: &WorkerContext) -> anyhow::Result<Vec<SubTask>>;

    /// Run one subtask. Errors are captured into that subtask's result.
    fn execute_subtask(&self, subtask: &SubTask, ctx: &WorkerContext) -> anyhow::Result<Value>;

    /// Fold finished subtasks into the task output. Called exactly once.
    fn combine_subtask_results(
        &self,
        subtasks: &[SubTask],
        original_input: &Value,
        _ctx: &WorkerContext,
    ) -> anyhow::Result<Value> {
        Ok(combine_results(subtasks, original_input))
    }
}

/// Default subtask combination.
///
/// Null results are skipped. All arrays are concatenated, all objects merged
/// (later keys win), all strings concatenated. Anything else yields the
/// original input (when it is an object) plus one `subtask_<n>_result` entry
/// per subtask, numbered from 1.
pub fn combine_results(subtasks: &[SubTask], original_input: &Value) -> Value {
    let results: Vec<&Value> = subtasks
        .iter()
        .map(|s| s.result.as_ref().unwrap_or(&Value::Null))
        .collect();
    let present: Vec<&Value> = results.iter().copied().filter(|r| !r.is_null()).collect();

    if present.iter().all(|r| r.is_array()) {
        let combined: Vec<Value> = present
            .iter()
            .filter_map(|r| r.as_array())
            .flatten()
            .cloned()
            .collect();
        return Value::Array(combined);
    }

    if present.iter().all(|r| r.is_object()) {
        let mut combined = Map::new();
        for result in present.iter().filter_map(|r| r.as_object()) {
            for (key, value) in result {
                combined.insert(key.clone(), value.clone());
            }
        }
        return Value::Object(combined);
    }

    if present.iter().all(|r| r.is_string()) {
        let combined: String = present.iter().filter_map(|r| r.as_str()).collect();
        return Value::String(combined);
    }

    let mut combined = original_input.as_object().cloned().unwrap_or_default();
    for (i, result) in results.iter().enumerate() {
        combined.insert(format!("subtask_{}_result", i + 1), (*result).clone());
    }
    Value::Object(combined)
}
