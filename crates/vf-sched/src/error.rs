//! Error types for task graph construction and execution.

use thiserror::Error;

/// Errors detected while building or leveling a task graph.
///
/// All of these are fatal configuration errors: they are raised before the
/// first step executes and abort the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskGraphError {
    #[error("Task dependency cycle involving '{task}'")]
    Cycle { task: String },

    #[error("Tasks '{first}' and '{second}' declare overlapping writes")]
    DuplicateWriter { first: String, second: String },

    #[error("Task '{task}' reads an attribute it also writes this step")]
    SelfDependency { task: String },

    #[error("Worker pool setup failed: {what}")]
    WorkerPool { what: String },
}

/// A task failed while executing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Task '{task}' failed: {message}")]
pub struct TaskError {
    pub task: String,
    pub message: String,
}

impl TaskError {
    pub fn new(task: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            message: message.into(),
        }
    }
}
