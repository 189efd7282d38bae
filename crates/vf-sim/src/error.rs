//! Error types for simulation runs.

use thiserror::Error;
use vf_core::VfError;
use vf_net::NetError;
use vf_sched::{TaskError, TaskGraphError};
use vf_components::ComponentError;
use vf_solver::SolverError;

/// Errors encountered while building or running a simulation.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid lifecycle transition: {what}")]
    State { what: String },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// A switch event or initialization references topology state that
    /// does not exist.
    #[error("Topology mismatch: {what}")]
    TopologyMismatch { what: String },

    /// A step task failed; carries enough context to reproduce.
    #[error("Step {step} at t={time}s failed: {source}")]
    StepFailed {
        step: usize,
        time: f64,
        #[source]
        source: TaskError,
    },

    #[error("Network error: {0}")]
    Net(#[from] NetError),

    #[error("Component error: {0}")]
    Component(#[from] ComponentError),

    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    #[error("Task graph error: {0}")]
    TaskGraph(#[from] TaskGraphError),

    #[error("Attribute error: {0}")]
    Core(#[from] VfError),
}

pub type SimResult<T> = Result<T, SimError>;
