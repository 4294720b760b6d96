//! Task and subtask data model.
//!
//! Tasks are static work-unit declarations bound to a worker by name. Subtasks
//! are created by a worker during one task execution and live only as long as
//! that execution.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

/// Where a task takes its input from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputKey {
    /// Use the full input.
    #[default]
    None,
    /// Use the value under one key.
    Single(String),
    /// Collect the values under several keys into an object.
    Many(Vec<String>),
}

impl InputKey {
    pub fn is_none(&self) -> bool {
        matches!(self, InputKey::None)
    }

    /// All keys named by this binding, in declaration order.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            InputKey::None => Vec::new(),
            InputKey::Single(key) => vec![key.as_str()],
            InputKey::Many(keys) => keys.iter().map(String::as_str).collect(),
        }
    }
}

impl std::fmt::Display for InputKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputKey::None => write!(f, "<all>"),
            InputKey::Single(key) => write!(f, "{}", key),
            InputKey::Many(keys) => write!(f, "[{}]", keys.join(", ")),
        }
    }
}

/// Task status within one run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum TaskStatus {
    /// Waiting for dependencies or a free round.
    #[default]
    Pending,
    /// Submitted to the pool in the current round.
    InFlight,
    /// Output committed to the result map.
    Done,
    /// Worker failed; the run aborts.
    Failed {
        /// Error message describing the failure.
        error: String,
    },
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InFlight => write!(f, "in_flight"),
            TaskStatus::Done => write!(f, "done"),
            TaskStatus::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

/// A named unit of work bound to one worker.
///
/// Declared once when a project is assembled and never mutated while a run is
/// in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique name within the project.
    pub name: String,
    /// Name of the worker that executes this task.
    pub worker: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Input binding.
    #[serde(default, skip_serializing_if = "InputKey::is_none")]
    pub input_key: InputKey,
    /// Key the result is written under when the input is an object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
    /// Names of tasks that must finish first.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Let a subtask-capable worker split this task.
    #[serde(default)]
    pub parallel_subtasks: bool,
}

impl Task {
    pub fn new(name: &str, worker: &str) -> Self {
        Self {
            name: name.to_string(),
            worker: worker.to_string(),
            description: String::new(),
            input_key: InputKey::None,
            output_key: None,
            depends_on: Vec::new(),
            parallel_subtasks: false,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_input_key(mut self, key: &str) -> Self {
        self.input_key = InputKey::Single(key.to_string());
        self
    }

    pub fn with_input_keys(mut self, keys: &[&str]) -> Self {
        self.input_key = InputKey::Many(keys.iter().map(|k| k.to_string()).collect());
        self
    }

    pub fn with_output_key(mut self, key: &str) -> Self {
        self.output_key = Some(key.to_string());
        self
    }

    pub fn depends_on(mut self, deps: &[&str]) -> Self {
        self.depends_on = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn with_parallel_subtasks(mut self, enabled: bool) -> Self {
        self.parallel_subtasks = enabled;
        self
    }
}

/// Unique identifier for a subtask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubTaskId(pub Uuid);

impl SubTaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for SubTaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubTaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SubTaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A piece of one task's work, produced by `SubtaskWorker::create_subtasks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTask {
    pub id: SubTaskId,
    /// Owning task. Filled in by the task runner when left empty.
    pub parent_task_name: String,
    pub name: String,
    pub description: String,
    pub input_data: Value,
    /// Sibling subtasks that must finish (successfully or not) first.
    #[serde(default)]
    pub depends_on: Vec<SubTaskId>,
    pub result: Option<Value>,
    pub duration: Option<Duration>,
}

impl SubTask {
    pub fn new(parent_task_name: &str, name: &str, description: &str, input_data: Value) -> Self {
        Self {
            id: SubTaskId::new(),
            parent_task_name: parent_task_name.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            input_data,
            depends_on: Vec::new(),
            result: None,
            duration: None,
        }
    }

    pub fn depends_on(mut self, ids: &[SubTaskId]) -> Self {
        self.depends_on = ids.to_vec();
        self
    }

    pub fn record_success(&mut self, result: Value, duration: Duration) {
        self.result = Some(result);
        self.duration = Some(duration);
    }

    /// Capture a failure as this subtask's result.
    pub fn record_failure(&mut self, message: &str) {
        self.result = Some(serde_json::json!({ "error": message }));
        self.duration = Some(Duration::ZERO);
    }

    pub fn is_finished(&self) -> bool {
        self.duration.is_some()
    }

    pub fn is_failed(&self) -> bool {
        self.is_finished()
            && self
                .result
                .as_ref()
                .and_then(|r| r.as_object())
                .is_some_and(|r| r.len() == 1 && r.contains_key("error"))
    }
}
