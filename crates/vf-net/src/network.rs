//! Incremental network builder and the frozen network.

use std::collections::HashSet;

use vf_core::{CompId, NodeId};

use crate::error::NetError;
use crate::indexing::MatrixMap;
use crate::node::{Node, NodeRef};

/// Structural description of one component: its name, terminal bindings
/// and how many internal (virtual) matrix rows it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInfo {
    pub id: CompId,
    pub name: String,
    pub terminals: Vec<NodeRef>,
    pub virtual_count: usize,
}

/// Builder for constructing a network incrementally.
///
/// Use `add_node` and `add_component` to build up the network, then call
/// `build()` to validate and freeze it into an immutable [`Network`].
#[derive(Debug, Default)]
pub struct NetworkBuilder {
    nodes: Vec<Node>,
    comps: Vec<ComponentInfo>,
    next_node_id: u32,
    next_comp_id: u32,
}

impl NetworkBuilder {
    /// Create a new empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return a terminal reference to it.
    pub fn add_node(&mut self, name: impl Into<String>) -> NodeRef {
        let id = NodeId::from_index(self.next_node_id);
        self.next_node_id += 1;
        self.nodes.push(Node {
            id,
            name: name.into(),
        });
        NodeRef::Node(id)
    }

    /// Add a component with its terminal bindings and virtual-node count.
    pub fn add_component(
        &mut self,
        name: impl Into<String>,
        terminals: Vec<NodeRef>,
        virtual_count: usize,
    ) -> CompId {
        let id = CompId::from_index(self.next_comp_id);
        self.next_comp_id += 1;
        self.comps.push(ComponentInfo {
            id,
            name: name.into(),
            terminals,
            virtual_count,
        });
        id
    }

    /// Build and validate, returning an immutable [`Network`].
    pub fn build(self) -> Result<Network, NetError> {
        // Names must be unique: they double as attribute-store owners.
        let mut names = HashSet::new();
        for node in &self.nodes {
            if !names.insert(node.name.as_str()) {
                return Err(NetError::DuplicateName {
                    name: node.name.clone(),
                });
            }
        }
        for comp in &self.comps {
            if !names.insert(comp.name.as_str()) {
                return Err(NetError::DuplicateName {
                    name: comp.name.clone(),
                });
            }
        }

        // Every terminal must be bound to ground or an existing node.
        for comp in &self.comps {
            if comp.terminals.is_empty() {
                return Err(NetError::NoTerminals { comp: comp.id });
            }
            for (t, &r) in comp.terminals.iter().enumerate() {
                if let NodeRef::Node(id) = r {
                    if id.index() as usize >= self.nodes.len() {
                        return Err(NetError::InvalidNodeRef {
                            comp: comp.id,
                            terminal: t,
                            node: id,
                        });
                    }
                }
            }
        }

        let virtual_counts: Vec<usize> = self.comps.iter().map(|c| c.virtual_count).collect();
        let map = MatrixMap::assign(self.nodes.len(), &virtual_counts);

        Ok(Network {
            nodes: self.nodes,
            comps: self.comps,
            map,
        })
    }
}

/// A validated, immutable network: nodes, component structure and the
/// matrix index assignment derived from them.
#[derive(Debug, Clone)]
pub struct Network {
    nodes: Vec<Node>,
    comps: Vec<ComponentInfo>,
    map: MatrixMap,
}

impl Network {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn components(&self) -> &[ComponentInfo] {
        &self.comps
    }

    pub fn component(&self, id: CompId) -> Option<&ComponentInfo> {
        self.comps.get(id.index() as usize)
    }

    pub fn map(&self) -> &MatrixMap {
        &self.map
    }

    /// Human-readable label for a matrix row, for solver diagnostics.
    pub fn row_label(&self, row: usize) -> String {
        if row < self.nodes.len() {
            return self.nodes[row].name.clone();
        }
        for comp in &self.comps {
            let (base, count) = self.map.virtual_block(comp.id);
            if row >= base && row < base + count {
                return format!("{}:virtual{}", comp.name, row - base);
            }
        }
        format!("row{row}")
    }
}
