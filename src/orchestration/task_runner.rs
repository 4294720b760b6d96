//! Single-task execution.
//!
//! Resolves the task's worker, prepares and extracts its input, then either
//! hands the work to the [`SubtaskEngine`] or calls the worker directly and
//! attaches the result under the task's `output_key`.

use crate::core::project::Project;
use crate::core::task::{InputKey, SubTask, SubTaskId, Task};
use crate::error::{Error, Result};
use crate::log::task_log;
use crate::orchestration::scheduler::RunEvent;
use crate::orchestration::subtasks::SubtaskEngine;
use crate::worker::WorkerContext;
use crate::{wlog_debug, wlog_trace, wlog_warn};
use crossbeam_channel::Sender;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::PathBuf;

const DEFAULT_SUBTASK_WORKERS: usize = 4;

pub struct TaskRunner<'a> {
    task: &'a Task,
    project: &'a Project,
    subtask_workers: usize,
    output_dir: Option<PathBuf>,
    events: Option<Sender<RunEvent>>,
}

impl<'a> TaskRunner<'a> {
    pub fn new(task: &'a Task, project: &'a Project) -> Self {
        Self {
            task,
            project,
            subtask_workers: DEFAULT_SUBTASK_WORKERS,
            output_dir: None,
            events: None,
        }
    }

    /// Bound on concurrently running subtasks of this task.
    pub fn with_subtask_workers(mut self, n: usize) -> Self {
        self.subtask_workers = n.max(1);
        self
    }

    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.output_dir = dir;
        self
    }

    pub fn with_events(mut self, events: Option<Sender<RunEvent>>) -> Self {
        self.events = events;
        self
    }

    pub fn context(&self) -> WorkerContext {
        WorkerContext::new(&self.project.name, &self.task.name)
            .with_output_dir(self.output_dir.clone())
    }

    /// Run the task on `input` and return its output.
    pub fn run(&self, input: Value) -> Result<Value> {
        let task = self.task;
        let worker = self
            .project
            .worker(&task.worker)
            .ok_or_else(|| Error::WorkerNotFound {
                task: task.name.clone(),
                worker: task.worker.clone(),
            })?;
        let ctx = self.context();

        task_log(&task.name, "start", &format!("worker '{}'", task.worker));

        let input = worker.prepare_input(input);
        let task_input = extract_input(task, &input);
        wlog_trace!("Task '{}': input {}", task.name, task_input);

        if task.parallel_subtasks {
            match worker.as_subtask_worker() {
                Some(splitter) => {
                    let mut subtasks = splitter
                        .create_subtasks(&task_input, &ctx)
                        .map_err(|source| Error::SubtaskCreation {
                            task: task.name.clone(),
                            source,
                        })?;
                    for subtask in subtasks.iter_mut().filter(|s| s.parent_task_name.is_empty()) {
                        subtask.parent_task_name = task.name.clone();
                    }

                    let malformed = malformed_subtasks(&subtasks);
                    if subtasks.is_empty() {
                        wlog_debug!("Task '{}': no subtasks created, running directly", task.name);
                    } else if let Some(reason) = malformed {
                        wlog_warn!("Task '{}': {}, running directly", task.name, reason);
                    } else {
                        task_log(
                            &task.name,
                            "subtasks",
                            &format!("{} subtasks", subtasks.len()),
                        );
                        let combined = SubtaskEngine::new(splitter, &ctx, self.subtask_workers)
                            .with_events(self.events.clone())
                            .run(subtasks, &task_input)?;
                        return Ok(worker.prepare_output(combined));
                    }
                }
                None => {
                    wlog_debug!(
                        "Task '{}': worker '{}' cannot split work, running directly",
                        task.name,
                        task.worker
                    );
                }
            }
        }

        let result = worker
            .execute(&task_input, &ctx)
            .map_err(|source| Error::WorkerExecution {
                task: task.name.clone(),
                source,
            })?;
        let result = worker.prepare_output(result);

        Ok(attach_output(task, input, result))
    }
}

/// Narrow the prepared input to the task's `input_key`.
///
/// Falls back to the full input (with a warning) when no key is present.
fn extract_input(task: &Task, input: &Value) -> Value {
    match &task.input_key {
        InputKey::None => input.clone(),
        InputKey::Single(key) => match input.get(key) {
            Some(value) => value.clone(),
            None => {
                wlog_warn!(
                    "Task '{}': input key '{}' not found, using full input",
                    task.name,
                    key
                );
                input.clone()
            }
        },
        InputKey::Many(keys) => {
            let selected: Map<String, Value> = keys
                .iter()
                .filter_map(|k| input.get(k).map(|v| (k.clone(), v.clone())))
                .collect();
            if selected.is_empty() {
                wlog_warn!(
                    "Task '{}': none of input keys [{}] found, using full input",
                    task.name,
                    keys.join(", ")
                );
                input.clone()
            } else {
                Value::Object(selected)
            }
        }
    }
}

/// Place the worker result under `output_key`, keeping the input's other
/// fields when the input is an object.
fn attach_output(task: &Task, input: Value, result: Value) -> Value {
    let Some(key) = &task.output_key else {
        return result;
    };
    let mut output = match input {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    output.insert(key.clone(), result);
    Value::Object(output)
}

/// Why a subtask list cannot be scheduled: a reused id or a dependency on an
/// id outside the list.
fn malformed_subtasks(subtasks: &[SubTask]) -> Option<String> {
    let mut ids: HashSet<SubTaskId> = HashSet::with_capacity(subtasks.len());
    if let Some(dup) = subtasks.iter().find(|s| !ids.insert(s.id)) {
        return Some(format!("subtask '{}' reuses id {}", dup.name, dup.id.short()));
    }
    subtasks
        .iter()
        .find(|s| s.depends_on.iter().any(|d| !ids.contains(d)))
        .map(|s| format!("subtask '{}' depends on an unknown subtask", s.name))
}
