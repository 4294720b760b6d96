//! Core domain models for weft.
//!
//! Tasks, subtasks, the project declaration, and the dependency graph
//! validator that the runners schedule from.

pub mod dag;
pub mod project;
pub mod task;

pub use dag::DependencyGraph;
pub use project::Project;
pub use task::{InputKey, SubTask, SubTaskId, Task, TaskStatus};
