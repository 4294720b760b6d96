//! Weft: a dependency-aware task orchestration engine.
//!
//! A [`Project`] declares named [`Worker`]s and a DAG of [`Task`]s bound to
//! them. The [`ProjectRunner`] validates the graph, then runs every task whose
//! dependencies are satisfied on a bounded pool, one round at a time, routing
//! each task's output to the tasks that consume it. Workers that implement
//! [`SubtaskWorker`] can split a task into subtasks that run on a nested pool
//! and are combined back into one output.

pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod orchestration;
pub mod worker;

pub use crate::core::{DependencyGraph, InputKey, Project, SubTask, SubTaskId, Task, TaskStatus};
pub use config::RunnerConfig;
pub use error::{Error, Result};
pub use orchestration::{
    InputWiring, ProjectRunner, RunEvent, RunResults, SubtaskEngine, TaskOutput, TaskRunner,
    WiringContext, WorkerPool,
};
pub use worker::{combine_results, FnWorker, SplitWorker, SubtaskWorker, Worker, WorkerContext};
