use super::{SubtaskWorker, Worker, WorkerContext};
use crate::core::task::SubTask;
use crate::wlog_debug;
use serde_json::{Map, Value};

const DEFAULT_NUM_SUBTASKS: usize = 4;

type ChunkFn = Box<dyn Fn(&SubTask, &WorkerContext) -> anyhow::Result<Value> + Send + Sync>;

/// A subtask-capable worker that splits its input into independent chunks.
///
/// Arrays become `chunk_<i>` subtasks, objects `dict_chunk_<i>`, strings
/// `text_chunk_<i>`; any other input is handed whole to `subtask_<i>` copies.
/// Each chunk runs through the supplied closure and results are combined with
/// [`super::combine_results`].
pub struct SplitWorker {
    num_subtasks: usize,
    process: ChunkFn,
}

impl SplitWorker {
    pub fn new(
        process: impl Fn(&SubTask, &WorkerContext) -> anyhow::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            num_subtasks: DEFAULT_NUM_SUBTASKS,
            process: Box::new(process),
        }
    }

    /// Target number of chunks (at least 1).
    pub fn with_num_subtasks(mut self, n: usize) -> Self {
        self.num_subtasks = n.max(1);
        self
    }

    pub fn num_subtasks(&self) -> usize {
        self.num_subtasks
    }

    fn chunk_size(&self, len: usize) -> usize {
        (len / self.num_subtasks).max(1)
    }

    fn split(&self, input: &Value, parent: &str) -> Vec<SubTask> {
        match input {
            Value::Array(items) => {
                let chunks: Vec<&[Value]> = items.chunks(self.chunk_size(items.len())).collect();
                let total = chunks.len();
                chunks
                    .into_iter()
                    .enumerate()
                    .map(|(i, chunk)| {
                        SubTask::new(
                            parent,
                            &format!("chunk_{}", i + 1),
                            &format!("Process list chunk {} of {}", i + 1, total),
                            Value::Array(chunk.to_vec()),
                        )
                    })
                    .collect()
            }
            Value::Object(map) => {
                let entries: Vec<(&String, &Value)> = map.iter().collect();
                let chunks: Vec<_> = entries.chunks(self.chunk_size(entries.len())).collect();
                let total = chunks.len();
                chunks
                    .into_iter()
                    .enumerate()
                    .map(|(i, chunk)| {
                        let data: Map<String, Value> = chunk
                            .iter()
                            .map(|(k, v)| ((*k).clone(), (*v).clone()))
                            .collect();
                        SubTask::new(
                            parent,
                            &format!("dict_chunk_{}", i + 1),
                            &format!("Process dictionary chunk {} of {}", i + 1, total),
                            Value::Object(data),
                        )
                    })
                    .collect()
            }
            Value::String(text) => {
                let chars: Vec<char> = text.chars().collect();
                let chunks: Vec<&[char]> = chars.chunks(self.chunk_size(chars.len())).collect();
                let total = chunks.len();
                chunks
                    .into_iter()
                    .enumerate()
                    .map(|(i, chunk)| {
                        SubTask::new(
                            parent,
                            &format!("text_chunk_{}", i + 1),
                            &format!("Process text chunk {} of {}", i + 1, total),
                            Value::String(chunk.iter().collect()),
                        )
                    })
                    .collect()
            }
            other => (0..self.num_subtasks)
                .map(|i| {
                    SubTask::new(
                        parent,
                        &format!("subtask_{}", i + 1),
                        &format!("Process subtask {} of {}", i + 1, self.num_subtasks),
                        other.clone(),
                    )
                })
                .collect(),
        }
    }
}

impl Worker for SplitWorker {
    /// The plain path leaves the input untouched; the work happens per chunk.
    fn execute(&self, input: &Value, _ctx: &WorkerContext) -> anyhow::Result<Value> {
        Ok(input.clone())
    }

    fn as_subtask_worker(&self) -> Option<&dyn SubtaskWorker> {
        Some(self)
    }
}

impl SubtaskWorker for SplitWorker {
    fn create_subtasks(&self, input: &Value, ctx: &WorkerContext) -> anyhow::Result<Vec<SubTask>> {
        let subtasks = self.split(input, &ctx.task);
        wlog_debug!("SplitWorker: created {} subtasks for '{}'", subtasks.len(), ctx.task);
        Ok(subtasks)
    }

    fn execute_subtask(&self, subtask: &SubTask, ctx: &WorkerContext) -> anyhow::Result<Value> {
        (self.process)(subtask, ctx)
    }
}

impl std::fmt::Debug for SplitWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitWorker")
            .field("num_subtasks", &self.num_subtasks)
            .finish()
    }
}
