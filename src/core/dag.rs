//! Dependency graph validation and scheduling queries.
//!
//! Tasks name their dependencies; this module checks the names are closed over
//! the task set, rejects cycles, and answers "what can run now" for the
//! round-based scheduler.

use crate::core::task::Task;
use crate::error::{Error, Result};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Validated task dependency graph.
///
/// Nodes are task names; an edge `a -> b` means `b` depends on `a`. Nodes are
/// inserted in sorted name order so validation is deterministic.
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
    order: Vec<String>,
}

impl DependencyGraph {
    /// Build and validate the graph for a task set.
    ///
    /// # Errors
    /// - `Error::MissingDependencies` if any task names a task that does not exist
    /// - `Error::CyclicDependency` if the dependencies form a cycle
    pub fn build(tasks: &BTreeMap<String, Task>) -> Result<Self> {
        let names: BTreeSet<&str> = tasks.keys().map(String::as_str).collect();

        for (name, task) in tasks {
            let missing: BTreeSet<&str> = task
                .depends_on
                .iter()
                .map(String::as_str)
                .filter(|dep| !names.contains(dep))
                .collect();
            if !missing.is_empty() {
                return Err(Error::MissingDependencies {
                    task: name.clone(),
                    missing: missing.into_iter().map(str::to_string).collect(),
                });
            }
        }

        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        for name in tasks.keys() {
            let node = graph.add_node(name.clone());
            index.insert(name.clone(), node);
        }
        for (name, task) in tasks {
            let to = index[name];
            for dep in &task.depends_on {
                graph.add_edge(index[dep], to, ());
            }
        }

        let sorted = toposort(&graph, None).map_err(|cycle| Error::CyclicDependency {
            task: graph
                .node_weight(cycle.node_id())
                .cloned()
                .unwrap_or_else(|| "unknown".to_string()),
        })?;
        let order = sorted
            .into_iter()
            .filter_map(|node| graph.node_weight(node).cloned())
            .collect();

        Ok(Self {
            graph,
            index,
            order,
        })
    }

    /// One valid topological ordering of all task names.
    pub fn execution_order(&self) -> &[String] {
        &self.order
    }

    /// Number of tasks in the graph.
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of dependency edges.
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Names of the tasks `name` depends on, sorted.
    pub fn dependencies(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, petgraph::Direction::Incoming)
    }

    /// Names of the tasks that depend on `name`, sorted.
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, petgraph::Direction::Outgoing)
    }

    fn neighbors(&self, name: &str, direction: petgraph::Direction) -> Vec<&str> {
        let Some(&node) = self.index.get(name) else {
            return Vec::new();
        };
        let mut names: Vec<&str> = self
            .graph
            .neighbors_directed(node, direction)
            .filter_map(|n| self.graph.node_weight(n).map(String::as_str))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    // ========== Scheduling Operations ==========

    /// Tasks that can be submitted now.
    ///
    /// A task is ready when it is neither completed nor in flight and every
    /// dependency is completed. Tasks sharing an identical dependency set are
    /// returned next to each other so they go out in the same batch.
    pub fn ready(&self, completed: &HashSet<String>, in_flight: &HashSet<String>) -> Vec<String> {
        let mut groups: BTreeMap<Vec<&str>, Vec<String>> = BTreeMap::new();
        for name in &self.order {
            if completed.contains(name) || in_flight.contains(name) {
                continue;
            }
            let deps = self.dependencies(name);
            if deps.iter().all(|dep| completed.contains(*dep)) {
                groups.entry(deps).or_default().push(name.clone());
            }
        }
        groups.into_values().flatten().collect()
    }

    /// Check if every task is in the completed set.
    pub fn all_complete(&self, completed: &HashSet<String>) -> bool {
        self.index.keys().all(|name| completed.contains(name))
    }

    /// Count of tasks not in the completed set.
    pub fn pending_count(&self, completed: &HashSet<String>) -> usize {
        self.index
            .keys()
            .filter(|name| !completed.contains(*name))
            .count()
    }

    /// Tasks grouped by identical dependency sets, largest group first.
    ///
    /// Groups of two or more are the tasks that can share a round.
    pub fn parallel_groups(&self) -> Vec<Vec<&str>> {
        let mut groups: BTreeMap<Vec<&str>, Vec<&str>> = BTreeMap::new();
        for name in &self.order {
            groups
                .entry(self.dependencies(name))
                .or_default()
                .push(name.as_str());
        }
        let mut groups: Vec<Vec<&str>> = groups.into_values().collect();
        groups.sort_by(|a, b| b.len().cmp(&a.len()));
        groups
    }
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("tasks", &self.task_count())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}
