//! Topology snapshots.
//!
//! A topology is an immutable subset of a network's components, active
//! together. A simulation may hold several (pre-fault / post-fault) and
//! switch between them at scheduled instants; the node set and matrix
//! layout stay fixed, only the set of stamping components changes.

use std::collections::HashSet;

use vf_core::CompId;

use crate::error::NetError;
use crate::network::Network;

#[derive(Debug, Clone)]
pub struct Topology {
    pub name: String,
    pub members: Vec<CompId>,
}

impl Topology {
    pub fn new(name: impl Into<String>, members: Vec<CompId>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }

    /// Check the member list against the network it will stamp.
    pub fn validate(&self, network: &Network) -> Result<(), NetError> {
        let mut seen = HashSet::new();
        for &comp in &self.members {
            if network.component(comp).is_none() {
                return Err(NetError::UnknownMember {
                    topology: self.name.clone(),
                    comp,
                });
            }
            if !seen.insert(comp) {
                return Err(NetError::DuplicateMember {
                    topology: self.name.clone(),
                    comp,
                });
            }
        }
        Ok(())
    }

    pub fn contains(&self, comp: CompId) -> bool {
        self.members.contains(&comp)
    }
}
