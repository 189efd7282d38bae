//! Network-specific error types.

use thiserror::Error;
use vf_core::{CompId, NodeId};

/// Network construction and validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetError {
    #[error("Component {comp} terminal {terminal} refers to non-existent node {node}")]
    InvalidNodeRef {
        comp: CompId,
        terminal: usize,
        node: NodeId,
    },

    #[error("Component {comp} has no terminals")]
    NoTerminals { comp: CompId },

    #[error("Duplicate name '{name}' in network")]
    DuplicateName { name: String },

    #[error("Topology '{topology}' references non-existent component {comp}")]
    UnknownMember { topology: String, comp: CompId },

    #[error("Topology '{topology}' lists component {comp} twice")]
    DuplicateMember { topology: String, comp: CompId },

    #[error("Matrix index out of range: {what} (index={index}, dim={dim})")]
    IndexOob {
        what: &'static str,
        index: usize,
        dim: usize,
    },
}
