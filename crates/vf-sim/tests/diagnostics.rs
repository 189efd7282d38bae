//! Fatal-error diagnostics surfaced through the simulation lifecycle.

use vf_core::units::ohm;
use vf_net::NodeRef;
use vf_components::{Resistor, VoltageSource, Waveform};
use vf_sim::{Phase, SimError, SimOptions, Simulation};
use vf_solver::SolverError;

/// A node no component references produces an empty matrix row; the run
/// aborts before stepping and names the offending node.
#[test]
fn floating_node_reports_singular_system() {
    let mut sim = Simulation::new("floating", SimOptions::default());
    let n1 = sim.add_node("n1").unwrap();
    sim.add_node("orphan").unwrap();
    sim.add_component(Box::new(VoltageSource::new(
        "vs",
        n1,
        NodeRef::Ground,
        Waveform::Dc(10.0),
    )))
    .unwrap();
    sim.add_component(Box::new(Resistor::new("r1", n1, NodeRef::Ground, ohm(1.0))))
        .unwrap();

    let err = sim.initialize().unwrap_err();
    match err {
        SimError::Solver(SolverError::SingularSystem { rows }) => {
            assert!(rows.contains(&"orphan".to_string()), "rows: {rows:?}");
        }
        other => panic!("expected SingularSystem, got {other}"),
    }
    assert_eq!(sim.phase(), Phase::Constructed);
}

/// A dangling resistor end is fine: no current flows and the far node
/// simply tracks its neighbor.
#[test]
fn dangling_branch_is_not_singular() {
    let mut sim = Simulation::new(
        "dangling",
        SimOptions {
            dt: 1e-4,
            t_end: 1e-3,
            ..Default::default()
        },
    );
    let n1 = sim.add_node("n1").unwrap();
    let n2 = sim.add_node("n2").unwrap();
    sim.add_component(Box::new(VoltageSource::new(
        "vs",
        n1,
        NodeRef::Ground,
        Waveform::Dc(10.0),
    )))
    .unwrap();
    sim.add_component(Box::new(Resistor::new("r_stub", n1, n2, ohm(1.0))))
        .unwrap();
    sim.add_component(Box::new(Resistor::new("r1", n1, NodeRef::Ground, ohm(1.0))))
        .unwrap();
    sim.initialize().unwrap();
    sim.run(&mut []).unwrap();

    let v2 = sim.store().scalar(sim.attr_range("n2", "v").unwrap());
    assert!((v2 - 10.0).abs() < 1e-9);
    let i_stub = sim.store().scalar(sim.attr_range("r_stub", "i_intf").unwrap());
    assert!(i_stub.abs() < 1e-9);
}
