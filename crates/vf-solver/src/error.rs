//! Error types for solver operations.

use thiserror::Error;

/// Errors that can occur while assembling or solving the nodal system.
#[derive(Error, Debug)]
pub enum SolverError {
    /// The system matrix cannot be factorized. Lists the offending rows by
    /// node / virtual-node name for diagnosis.
    #[error("Singular system matrix; degenerate rows: {rows:?}")]
    SingularSystem { rows: Vec<String> },

    /// The implicit integrator could not converge on a residual zero.
    #[error("Residual convergence failed: {what}")]
    ResidualConvergence { what: String },

    #[error("Problem setup error: {what}")]
    ProblemSetup { what: String },

    #[error("Numeric error: {what}")]
    Numeric { what: String },
}

pub type SolverResult<T> = Result<T, SolverError>;
