//! vf-net: electrical network structure for voltflow.
//!
//! Provides:
//! - Nodes and terminal references (including the distinguished ground)
//! - The network builder with structural validation
//! - Stable matrix indexing for solver integration
//! - Topology snapshots (component subsets switched at runtime)
//!
//! # Example
//!
//! ```
//! use vf_net::{NetworkBuilder, NodeRef};
//!
//! let mut builder = NetworkBuilder::new();
//! let n1 = builder.add_node("n1");
//! let vs = builder.add_component("vs", vec![n1, NodeRef::Ground], 1);
//! let r = builder.add_component("r_load", vec![n1, NodeRef::Ground], 0);
//! let network = builder.build().unwrap();
//!
//! assert_eq!(network.nodes().len(), 1);
//! // one node row plus the source's virtual row
//! assert_eq!(network.map().dim(), 2);
//! # let _ = (vs, r);
//! ```

pub mod error;
pub mod indexing;
pub mod network;
pub mod node;
pub mod topology;

// Re-exports for ergonomics
pub use error::NetError;
pub use indexing::MatrixMap;
pub use network::{ComponentInfo, Network, NetworkBuilder};
pub use node::{Node, NodeRef};
pub use topology::Topology;
