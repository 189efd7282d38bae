//! Error types for component models.

use thiserror::Error;
use vf_core::VfError;
use vf_net::NetError;

/// Errors raised by device models.
#[derive(Error, Debug)]
pub enum ComponentError {
    #[error("Component '{comp}' used before initialization")]
    NotInitialized { comp: String },

    #[error("Component setup error: {what}")]
    Setup { what: String },

    #[error("Attribute error: {0}")]
    Attribute(#[from] VfError),

    #[error("Network error: {0}")]
    Net(#[from] NetError),
}

pub type ComponentResult<T> = Result<T, ComponentError>;
