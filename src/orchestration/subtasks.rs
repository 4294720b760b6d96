//! Subtask engine.
//!
//! Runs one task's subtasks in dependency rounds on a bounded pool. A failing
//! subtask never aborts the others: its error is captured as the subtask's
//! result and counts as finished for dependency purposes. The worker's combine
//! step runs once, after every round has drained.

use crate::core::task::{SubTask, SubTaskId};
use crate::error::{panic_message, Error, Result};
use crate::orchestration::pool::WorkerPool;
use crate::orchestration::scheduler::{emit, RunEvent};
use crate::worker::{SubtaskWorker, WorkerContext};
use crate::{wlog, wlog_debug, wlog_warn};
use crossbeam_channel::Sender;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

pub struct SubtaskEngine<'a> {
    worker: &'a dyn SubtaskWorker,
    ctx: &'a WorkerContext,
    pool: WorkerPool,
    events: Option<Sender<RunEvent>>,
}

impl<'a> SubtaskEngine<'a> {
    pub fn new(worker: &'a dyn SubtaskWorker, ctx: &'a WorkerContext, max_workers: usize) -> Self {
        Self {
            worker,
            ctx,
            pool: WorkerPool::new(max_workers),
            events: None,
        }
    }

    pub fn with_events(mut self, events: Option<Sender<RunEvent>>) -> Self {
        self.events = events;
        self
    }

    /// Execute every subtask, then combine their results.
    ///
    /// Subtask ids must be unique within `subtasks`.
    pub fn run(&self, subtasks: Vec<SubTask>, original_input: &Value) -> Result<Value> {
        let order: Vec<SubTaskId> = subtasks.iter().map(|s| s.id).collect();
        let total = order.len();
        let mut pending: HashMap<SubTaskId, SubTask> =
            subtasks.into_iter().map(|s| (s.id, s)).collect();
        let mut finished: HashMap<SubTaskId, SubTask> = HashMap::new();
        let mut completed: HashSet<SubTaskId> = HashSet::new();
        let mut round = 0;

        while completed.len() < total {
            let ready: Vec<SubTaskId> = order
                .iter()
                .filter(|id| {
                    pending
                        .get(*id)
                        .is_some_and(|s| s.depends_on.iter().all(|d| completed.contains(d)))
                })
                .copied()
                .collect();

            if ready.is_empty() {
                wlog_warn!(
                    "Task '{}': {} subtasks can never become ready, combining partial results",
                    self.ctx.task,
                    total - completed.len()
                );
                break;
            }

            round += 1;
            wlog_debug!(
                "Task '{}': subtask round {} with {} subtasks",
                self.ctx.task,
                round,
                ready.len()
            );

            let jobs: Vec<SubTask> = ready.iter().filter_map(|id| pending.remove(id)).collect();
            let outcomes = self.pool.run_batch(jobs, |subtask| self.execute_one(subtask));

            for (_, subtask) in outcomes {
                emit(
                    &self.events,
                    RunEvent::SubtaskFinished {
                        task: self.ctx.task.clone(),
                        subtask: subtask.name.clone(),
                        failed: subtask.is_failed(),
                    },
                );
                completed.insert(subtask.id);
                finished.insert(subtask.id, subtask);
            }
        }

        // Unfinished subtasks (after a stall) keep a `None` result.
        let all: Vec<SubTask> = order
            .iter()
            .filter_map(|id| finished.remove(id).or_else(|| pending.remove(id)))
            .collect();
        wlog!(
            "Task '{}': combining {} subtasks ({} failed) after {} rounds",
            self.ctx.task,
            all.len(),
            all.iter().filter(|s| s.is_failed()).count(),
            round
        );

        self.worker
            .combine_subtask_results(&all, original_input, self.ctx)
            .map_err(|source| Error::WorkerExecution {
                task: self.ctx.task.clone(),
                source,
            })
    }

    fn execute_one(&self, mut subtask: SubTask) -> SubTask {
        let start = Instant::now();
        // A panicking subtask is a failed subtask, not a failed task.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.worker.execute_subtask(&subtask, self.ctx)
        }))
        .unwrap_or_else(|payload| {
            Err(anyhow::anyhow!("panicked: {}", panic_message(payload.as_ref())))
        });
        match outcome {
            Ok(result) => {
                wlog_debug!(
                    "Task '{}': subtask '{}' finished",
                    self.ctx.task,
                    subtask.name
                );
                subtask.record_success(result, start.elapsed());
            }
            Err(e) => {
                wlog_warn!(
                    "Task '{}': subtask '{}' failed: {:#}",
                    self.ctx.task,
                    subtask.name,
                    e
                );
                subtask.record_failure(&format!("{:#}", e));
            }
        }
        subtask
    }
}
