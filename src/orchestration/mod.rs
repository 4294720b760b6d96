//! Orchestration layer.
//!
//! Turns a validated [`crate::Project`] into executed work: the
//! [`ProjectRunner`] schedules tasks in dependency rounds, each task runs
//! through a [`TaskRunner`], and tasks that split into subtasks are driven by
//! the [`SubtaskEngine`]. Both levels share the bounded [`WorkerPool`].

pub mod pool;
pub mod results;
pub mod routing;
pub mod scheduler;
pub mod subtasks;
pub mod task_runner;

pub use pool::WorkerPool;
pub use results::{ResultMap, RunResults, TaskOutput};
pub use routing::{route_input, InputWiring, WiringContext};
pub use scheduler::{ProjectRunner, RunEvent};
pub use subtasks::SubtaskEngine;
pub use task_runner::TaskRunner;
