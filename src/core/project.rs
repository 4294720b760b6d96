//! Project declaration: named workers plus the task DAG that uses them.

use crate::core::dag::DependencyGraph;
use crate::core::task::Task;
use crate::error::Result;
use crate::worker::Worker;
use crate::{wlog_debug, wlog_warn};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A static declaration of tasks, their dependencies, and available workers.
///
/// Treated as read-only while a run is in progress.
#[derive(Clone)]
pub struct Project {
    pub name: String,
    pub description: String,
    workers: HashMap<String, Arc<dyn Worker>>,
    tasks: BTreeMap<String, Task>,
}

impl Project {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            workers: HashMap::new(),
            tasks: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_worker(mut self, name: &str, worker: Arc<dyn Worker>) -> Self {
        self.add_worker(name, worker);
        self
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.add_task(task);
        self
    }

    pub fn add_worker(&mut self, name: &str, worker: Arc<dyn Worker>) {
        wlog_debug!("Project '{}': registered worker '{}'", self.name, name);
        self.workers.insert(name.to_string(), worker);
    }

    /// Add a task. A task with the same name replaces the earlier one.
    pub fn add_task(&mut self, task: Task) {
        if self.tasks.contains_key(&task.name) {
            wlog_warn!(
                "Project '{}': task '{}' declared twice, keeping the later declaration",
                self.name,
                task.name
            );
        }
        self.tasks.insert(task.name.clone(), task);
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn tasks(&self) -> &BTreeMap<String, Task> {
        &self.tasks
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.keys().map(String::as_str).collect()
    }

    pub fn worker(&self, name: &str) -> Option<&Arc<dyn Worker>> {
        self.workers.get(name)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Check every dependency exists and there are no cycles.
    pub fn validate(&self) -> Result<()> {
        self.graph().map(|_| ())
    }

    /// Validate, then build the dependency graph used for scheduling.
    pub fn graph(&self) -> Result<DependencyGraph> {
        DependencyGraph::build(&self.tasks).inspect_err(|e| {
            crate::log::project_log(&self.name, "error", &e.to_string());
        })
    }

    /// Task names in one valid dependency order.
    pub fn get_execution_order(&self) -> Result<Vec<String>> {
        Ok(self.graph()?.execution_order().to_vec())
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut workers: Vec<&String> = self.workers.keys().collect();
        workers.sort();
        f.debug_struct("Project")
            .field("name", &self.name)
            .field("workers", &workers)
            .field("tasks", &self.tasks.keys().collect::<Vec<_>>())
            .finish()
    }
}
