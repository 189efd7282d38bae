//! Electrical nodes and terminal references.

use vf_core::NodeId;

/// An electrical connection point.
///
/// Nodes are minimal: an ID and a name for human reference. Their voltage
/// lives in the attribute store, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
}

/// What a component terminal is bound to: a real node, or ground.
///
/// Ground never gets a matrix row or column; a grounded terminal simply
/// drops out of the stamped equations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Ground,
    Node(NodeId),
}

impl NodeRef {
    pub fn is_ground(self) -> bool {
        matches!(self, NodeRef::Ground)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vf_core::Id;

    #[test]
    fn ground_is_ground() {
        assert!(NodeRef::Ground.is_ground());
        assert!(!NodeRef::Node(Id::from_index(0)).is_ground());
    }
}
