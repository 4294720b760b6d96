//! Input routing between tasks.
//!
//! Decides what each task receives before it runs, from the initial input and
//! the outputs of tasks that already finished.

use crate::core::task::Task;
use crate::orchestration::results::ResultMap;
use crate::wlog_debug;
use serde_json::{Map, Value};

/// Caller-declared wiring for one task. Returning `None` falls through to the
/// generic rules.
pub type InputWiring = Box<dyn Fn(&WiringContext<'_>) -> Option<Value> + Send + Sync>;

/// What an [`InputWiring`] can see.
pub struct WiringContext<'a> {
    pub task: &'a Task,
    pub results: &'a ResultMap,
}

impl WiringContext<'_> {
    pub fn initial_input(&self) -> &Value {
        self.results.initial_input()
    }

    /// Output data of a finished task.
    pub fn data(&self, task: &str) -> Option<&Value> {
        self.results.data(task)
    }
}

/// Build the input for `task`. Rules, first match wins:
///
/// 1. the task's registered wiring, if it returns a value;
/// 2. per input key, a dependency whose `output_key` is that key;
/// 3. per input key, the key in the initial input;
/// 4. the whole flattened result map.
///
/// Rules 2 and 3 produce an object `{key: value}` holding every key that
/// resolved.
pub fn route_input(task: &Task, results: &ResultMap, wiring: Option<&InputWiring>) -> Value {
    if let Some(wire) = wiring {
        let ctx = WiringContext { task, results };
        if let Some(input) = wire(&ctx) {
            wlog_debug!("Routing '{}': custom wiring", task.name);
            return input;
        }
    }

    let mut routed = Map::new();
    for key in task.input_key.keys() {
        if let Some(value) = from_dependency(task, key, results) {
            wlog_debug!("Routing '{}': key '{}' from dependency output", task.name, key);
            routed.insert(key.to_string(), value);
        } else if let Some(value) = results.initial_input().get(key) {
            wlog_debug!("Routing '{}': key '{}' from initial input", task.name, key);
            routed.insert(key.to_string(), value.clone());
        }
    }
    if !routed.is_empty() {
        return Value::Object(routed);
    }

    wlog_debug!("Routing '{}': full result map", task.name);
    Value::Object(results.flatten())
}

fn from_dependency(task: &Task, key: &str, results: &ResultMap) -> Option<Value> {
    task.depends_on.iter().find_map(|dep| {
        let output = results.get(dep)?;
        if output.output_key.as_deref() != Some(key) {
            return None;
        }
        let value = match &output.data {
            Value::Object(data) if data.contains_key(key) => data[key].clone(),
            other => other.clone(),
        };
        Some(value)
    })
}
