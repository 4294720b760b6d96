//! Accumulated task outputs for one project run.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Key under which the initial run input is exposed in flattened results.
pub const INPUT_KEY: &str = "input";

/// What one task produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutput {
    pub data: Value,
    /// The producing task's declared `output_key`, used for routing.
    pub output_key: Option<String>,
    pub duration: Duration,
}

impl TaskOutput {
    pub fn new(data: Value, output_key: Option<String>, duration: Duration) -> Self {
        Self {
            data,
            output_key,
            duration,
        }
    }
}

/// Results accumulated while a run is in progress.
///
/// Entries are only ever added; a task's output is never replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultMap {
    initial_input: Value,
    entries: BTreeMap<String, TaskOutput>,
}

impl ResultMap {
    pub fn new(initial_input: Value) -> Self {
        Self {
            initial_input,
            entries: BTreeMap::new(),
        }
    }

    /// Record a task's output. Returns false if the task already has one.
    pub fn insert(&mut self, task: &str, output: TaskOutput) -> bool {
        if self.entries.contains_key(task) {
            return false;
        }
        self.entries.insert(task.to_string(), output);
        true
    }

    pub fn get(&self, task: &str) -> Option<&TaskOutput> {
        self.entries.get(task)
    }

    pub fn data(&self, task: &str) -> Option<&Value> {
        self.entries.get(task).map(|o| &o.data)
    }

    pub fn contains(&self, task: &str) -> bool {
        self.entries.contains_key(task)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn initial_input(&self) -> &Value {
        &self.initial_input
    }

    /// `{ "input": initial, <task>: data, ... }`.
    ///
    /// A task literally named `input` shadows the initial input.
    pub fn flatten(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(INPUT_KEY.to_string(), self.initial_input.clone());
        for (name, output) in &self.entries {
            map.insert(name.clone(), output.data.clone());
        }
        map
    }

    pub fn into_results(self) -> RunResults {
        RunResults {
            input: self.initial_input,
            tasks: self.entries,
        }
    }
}

/// The outcome of a completed (or stalled) project run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResults {
    input: Value,
    tasks: BTreeMap<String, TaskOutput>,
}

impl RunResults {
    pub fn input(&self) -> &Value {
        &self.input
    }

    pub fn get(&self, task: &str) -> Option<&TaskOutput> {
        self.tasks.get(task)
    }

    pub fn data(&self, task: &str) -> Option<&Value> {
        self.tasks.get(task).map(|o| &o.data)
    }

    pub fn duration(&self, task: &str) -> Option<Duration> {
        self.tasks.get(task).map(|o| o.duration)
    }

    pub fn contains(&self, task: &str) -> bool {
        self.tasks.contains_key(task)
    }

    /// Names of the tasks that produced output, sorted.
    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Sum of per-task durations.
    pub fn total_duration(&self) -> Duration {
        self.tasks.values().map(|o| o.duration).sum()
    }

    /// Task name to output data, plus the initial input under `"input"`.
    pub fn into_map(self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(INPUT_KEY.to_string(), self.input);
        for (name, output) in self.tasks {
            map.insert(name, output.data);
        }
        map
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.clone().into_map())
    }
}
