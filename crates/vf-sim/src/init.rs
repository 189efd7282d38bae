//! Steady-state initialization hook.
//!
//! An optional upstream collaborator (e.g. a power-flow pre-solve)
//! producing initial node voltages. The engine only consumes the result;
//! the solve itself is not part of this crate.

use vf_net::Network;

use crate::error::SimResult;

pub trait SteadyStateInit: Send {
    /// Initial node voltages, one per network node, in node order.
    fn initial_voltages(&self, network: &Network) -> SimResult<Vec<f64>>;
}

/// Trivial pre-solve: the same voltage everywhere.
pub struct FlatStart {
    pub voltage: f64,
}

impl SteadyStateInit for FlatStart {
    fn initial_voltages(&self, network: &Network) -> SimResult<Vec<f64>> {
        Ok(vec![self.voltage; network.nodes().len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vf_net::NetworkBuilder;

    #[test]
    fn flat_start_covers_all_nodes() {
        let mut builder = NetworkBuilder::new();
        let n1 = builder.add_node("n1");
        let n2 = builder.add_node("n2");
        builder.add_component("line", vec![n1, n2], 0);
        let network = builder.build().unwrap();

        let init = FlatStart { voltage: 230.0 };
        assert_eq!(init.initial_voltages(&network).unwrap(), vec![230.0, 230.0]);
    }
}
