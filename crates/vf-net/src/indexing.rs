//! Stable matrix indexing for solver integration.
//!
//! Maps network entities to rows/columns of the nodal system matrix:
//! real nodes occupy indices `0..n_nodes`, followed by each component's
//! virtual-node block. The assignment is made once when the network is
//! built and stays identical across topology switches, so solution vectors
//! and the attributes viewing them keep their layout for the whole run.

use vf_core::CompId;

use crate::error::NetError;
use crate::node::NodeRef;

/// Index map from nodes and component virtual nodes to matrix positions.
#[derive(Debug, Clone)]
pub struct MatrixMap {
    n_nodes: usize,
    /// Per-component base index of its virtual-node block.
    virtual_base: Vec<usize>,
    /// Per-component number of virtual nodes.
    virtual_count: Vec<usize>,
    dim: usize,
}

impl MatrixMap {
    pub(crate) fn assign(n_nodes: usize, virtual_counts: &[usize]) -> Self {
        let mut virtual_base = Vec::with_capacity(virtual_counts.len());
        let mut next = n_nodes;
        for &count in virtual_counts {
            virtual_base.push(next);
            next += count;
        }
        Self {
            n_nodes,
            virtual_base,
            virtual_count: virtual_counts.to_vec(),
            dim: next,
        }
    }

    /// Total system dimension: real nodes + all virtual nodes.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of real (non-virtual) nodes.
    pub fn node_count(&self) -> usize {
        self.n_nodes
    }

    /// Matrix index of a terminal binding; `None` for ground.
    pub fn node_index(&self, r: NodeRef) -> Option<usize> {
        match r {
            NodeRef::Ground => None,
            NodeRef::Node(id) => Some(id.index() as usize),
        }
    }

    /// Matrix index of component `comp`'s `k`-th virtual node.
    pub fn virtual_index(&self, comp: CompId, k: usize) -> Result<usize, NetError> {
        let ci = comp.index() as usize;
        let count = *self
            .virtual_count
            .get(ci)
            .ok_or(NetError::IndexOob {
                what: "component",
                index: ci,
                dim: self.virtual_count.len(),
            })?;
        if k >= count {
            return Err(NetError::IndexOob {
                what: "virtual node",
                index: k,
                dim: count,
            });
        }
        Ok(self.virtual_base[ci] + k)
    }

    /// Matrix index range of component `comp`'s virtual-node block.
    pub fn virtual_block(&self, comp: CompId) -> (usize, usize) {
        let ci = comp.index() as usize;
        (self.virtual_base[ci], self.virtual_count[ci])
    }
}
