//! Project scheduler.
//!
//! The `ProjectRunner` drives a whole project: it validates the task graph,
//! then repeatedly dispatches every ready task to a bounded pool, waits for
//! the round to drain, and records outputs so the next round can route them.
//! The first task failure aborts the run.

use crate::config::RunnerConfig;
use crate::core::project::Project;
use crate::core::task::{Task, TaskStatus};
use crate::error::{Error, Result};
use crate::log::{project_log, task_log};
use crate::orchestration::pool::WorkerPool;
use crate::orchestration::results::{ResultMap, RunResults, TaskOutput};
use crate::orchestration::routing::{route_input, InputWiring, WiringContext};
use crate::orchestration::task_runner::TaskRunner;
use crate::{wlog_debug, wlog_error, wlog_warn};
use crossbeam_channel::Sender;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Events emitted while a project runs.
///
/// Observers subscribe with [`ProjectRunner::with_events`]. Delivery is best
/// effort: a dropped receiver never affects the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// Validation passed and the first round is about to start.
    RunStarted { project: String, tasks: usize },
    /// A round of ready tasks was dispatched.
    RoundStarted { round: usize, tasks: Vec<String> },
    TaskStarted { task: String },
    TaskCompleted { task: String, duration: Duration },
    TaskFailed { task: String, error: String },
    /// One subtask of a task finished, successfully or not.
    SubtaskFinished {
        task: String,
        subtask: String,
        failed: bool,
    },
    /// No task could become ready; the run returned partial results.
    Stalled { pending: Vec<String> },
    AllTasksComplete,
}

pub(crate) fn emit(events: &Option<Sender<RunEvent>>, event: RunEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

/// Runs a project's tasks in dependency rounds.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use weft::{FnWorker, Project, ProjectRunner, Task};
///
/// let project = Project::new("demo")
///     .with_worker(
///         "double",
///         Arc::new(FnWorker::new(|v, _ctx| Ok(json!(v.as_i64().unwrap_or(0) * 2)))),
///     )
///     .with_task(
///         Task::new("double", "double")
///             .with_input_key("x")
///             .with_output_key("doubled"),
///     );
///
/// let results = ProjectRunner::new(&project, true, 4).run(json!({"x": 5}))?;
/// assert_eq!(results.data("double").unwrap()["doubled"], 10);
/// ```
pub struct ProjectRunner<'a> {
    project: &'a Project,
    parallel: bool,
    pool: WorkerPool,
    max_subtask_workers: usize,
    output_dir: Option<PathBuf>,
    wiring: HashMap<String, InputWiring>,
    events: Option<Sender<RunEvent>>,
}

impl<'a> ProjectRunner<'a> {
    /// Create a runner. Sequential mode is a pool of one.
    pub fn new(project: &'a Project, parallel: bool, max_workers: usize) -> Self {
        let size = if parallel { max_workers } else { 1 };
        Self {
            project,
            parallel,
            pool: WorkerPool::new(size),
            max_subtask_workers: RunnerConfig::default().max_subtask_workers,
            output_dir: None,
            wiring: HashMap::new(),
            events: None,
        }
    }

    pub fn from_config(project: &'a Project, config: &RunnerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(project, config.parallel, config.max_workers)
            .with_subtask_workers(config.max_subtask_workers)
            .with_output_dir(config.output_dir()))
    }

    pub fn with_subtask_workers(mut self, n: usize) -> Self {
        self.max_subtask_workers = n.max(1);
        self
    }

    /// Route `task`'s input through `wiring` before the generic rules.
    pub fn with_input_wiring(
        mut self,
        task: &str,
        wiring: impl Fn(&WiringContext<'_>) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.wiring.insert(task.to_string(), Box::new(wiring));
        self
    }

    pub fn with_events(mut self, events: Sender<RunEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.output_dir = dir;
        self
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Number of tasks that may run at once.
    pub fn workers(&self) -> usize {
        self.pool.size()
    }

    /// Execute every task and return their outputs.
    ///
    /// Fails before running anything if the graph is invalid. A task failure
    /// stops the run: tasks of the same round that had not started are
    /// skipped, no later round starts, and no partial results are returned.
    pub fn run(&self, initial_input: Value) -> Result<RunResults> {
        let project = self.project;
        let graph = project.graph()?;

        project_log(
            &project.name,
            "start",
            &format!(
                "{} tasks, {} workers{}",
                graph.task_count(),
                self.pool.size(),
                if self.parallel { "" } else { " (sequential)" }
            ),
        );
        emit(
            &self.events,
            RunEvent::RunStarted {
                project: project.name.clone(),
                tasks: graph.task_count(),
            },
        );

        let mut status: BTreeMap<String, TaskStatus> = project
            .task_names()
            .into_iter()
            .map(|name| (name.to_string(), TaskStatus::Pending))
            .collect();
        let mut results = ResultMap::new(initial_input);
        let mut round = 0;

        loop {
            let completed = names_with(&status, |s| matches!(s, TaskStatus::Done));
            if graph.all_complete(&completed) {
                break;
            }

            let in_flight = names_with(&status, |s| matches!(s, TaskStatus::InFlight));
            let ready = graph.ready(&completed, &in_flight);
            if ready.is_empty() {
                let pending: Vec<String> = graph
                    .execution_order()
                    .iter()
                    .filter(|name| !completed.contains(*name))
                    .cloned()
                    .collect();
                wlog_warn!(
                    "Project '{}': no task can become ready, {} pending: {}",
                    project.name,
                    pending.len(),
                    pending.join(", ")
                );
                emit(&self.events, RunEvent::Stalled { pending });
                return Ok(results.into_results());
            }

            round += 1;
            wlog_debug!(
                "Project '{}': round {} dispatching [{}]",
                project.name,
                round,
                ready.join(", ")
            );
            emit(
                &self.events,
                RunEvent::RoundStarted {
                    round,
                    tasks: ready.clone(),
                },
            );

            let jobs: Vec<(&Task, Value)> = ready
                .iter()
                .filter_map(|name| project.task(name))
                .map(|task| {
                    let input = route_input(task, &results, self.wiring.get(&task.name));
                    (task, input)
                })
                .collect();
            for (task, _) in &jobs {
                status.insert(task.name.clone(), TaskStatus::InFlight);
            }

            let outcomes = self.pool.run_batch_until(
                jobs,
                |(task, input)| (task, self.run_task(task, input)),
                failed,
            );

            let mut failure: Option<Error> = None;
            for (_, (task, outcome)) in outcomes {
                match outcome {
                    Ok(output) => {
                        task_log(
                            &task.name,
                            "complete",
                            &format!("{}ms", output.duration.as_millis()),
                        );
                        emit(
                            &self.events,
                            RunEvent::TaskCompleted {
                                task: task.name.clone(),
                                duration: output.duration,
                            },
                        );
                        status.insert(task.name.clone(), TaskStatus::Done);
                        results.insert(&task.name, output);
                    }
                    Err(e) => {
                        wlog_error!("Task '{}' failed: {:#}", task.name, e);
                        task_log(&task.name, "failed", &e.to_string());
                        emit(
                            &self.events,
                            RunEvent::TaskFailed {
                                task: task.name.clone(),
                                error: e.to_string(),
                            },
                        );
                        status.insert(
                            task.name.clone(),
                            TaskStatus::Failed {
                                error: e.to_string(),
                            },
                        );
                        if failure.is_none() {
                            failure = Some(e);
                        }
                    }
                }
            }

            if let Some(e) = failure {
                let skipped = names_with(&status, |s| {
                    matches!(s, TaskStatus::InFlight | TaskStatus::Pending)
                });
                project_log(
                    &project.name,
                    "aborted",
                    &format!("round {}: {} ({} tasks not run)", round, e, skipped.len()),
                );
                return Err(e);
            }
        }

        project_log(
            &project.name,
            "complete",
            &format!("{} tasks in {} rounds", results.len(), round),
        );
        emit(&self.events, RunEvent::AllTasksComplete);
        Ok(results.into_results())
    }

    fn run_task(&self, task: &Task, input: Value) -> Result<TaskOutput> {
        emit(
            &self.events,
            RunEvent::TaskStarted {
                task: task.name.clone(),
            },
        );
        let start = Instant::now();
        let runner = TaskRunner::new(task, self.project)
            .with_subtask_workers(self.max_subtask_workers)
            .with_output_dir(self.output_dir.clone())
            .with_events(self.events.clone());
        // A panicking worker fails its task like any other worker error.
        let data = panic::catch_unwind(AssertUnwindSafe(|| runner.run(input)))
            .unwrap_or_else(|payload| Err(Error::worker_panic(&task.name, payload.as_ref())))?;
        Ok(TaskOutput::new(data, task.output_key.clone(), start.elapsed()))
    }
}

type Outcome<'t> = (&'t Task, Result<TaskOutput>);

fn failed(outcome: &Outcome<'_>) -> bool {
    outcome.1.is_err()
}

fn names_with(
    status: &BTreeMap<String, TaskStatus>,
    pred: impl Fn(&TaskStatus) -> bool,
) -> HashSet<String> {
    status
        .iter()
        .filter(|(_, s)| pred(s))
        .map(|(name, _)| name.clone())
        .collect()
}
