use std::any::Any;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Task '{task}' depends on non-existent tasks: {}", missing.join(", "))]
    MissingDependencies { task: String, missing: Vec<String> },

    #[error("Circular dependency detected involving task '{task}'")]
    CyclicDependency { task: String },

    #[error("Worker '{worker}' not found for task '{task}'")]
    WorkerNotFound { task: String, worker: String },

    #[error("Task '{task}' failed: {source}")]
    WorkerExecution {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Task '{task}' failed to create subtasks: {source}")]
    SubtaskCreation {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,
}

impl Error {
    /// True for errors raised by graph validation before anything runs.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::MissingDependencies { .. } | Error::CyclicDependency { .. }
        )
    }

    /// Name of the task the error is attributed to, if any.
    pub fn task(&self) -> Option<&str> {
        match self {
            Error::MissingDependencies { task, .. }
            | Error::CyclicDependency { task }
            | Error::WorkerNotFound { task, .. }
            | Error::WorkerExecution { task, .. }
            | Error::SubtaskCreation { task, .. } => Some(task),
            _ => None,
        }
    }

    /// A task failure built from a caught worker panic.
    pub(crate) fn worker_panic(task: &str, payload: &(dyn Any + Send)) -> Self {
        Error::WorkerExecution {
            task: task.to_string(),
            source: anyhow::anyhow!("worker panicked: {}", panic_message(payload)),
        }
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
