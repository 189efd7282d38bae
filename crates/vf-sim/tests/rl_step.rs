//! Series RL circuit with a voltage step: current follows the analytic
//! exponential `i(t) = (V/R) * (1 - exp(-t/tau))`, tau = L/R.

use vf_core::units::{henry, ohm};
use vf_net::NodeRef;
use vf_components::{Inductor, Resistor, VoltageSource, Waveform};
use vf_sim::{DataSink, MemoryRecorder, SimOptions, Simulation};

#[test]
fn rl_step_response_matches_exponential() {
    let r = 1.0; // ohm
    let l = 1e-3; // henry
    let v = 1.0; // volt
    let tau = l / r; // 1 ms
    let dt = 5e-6;

    let mut sim = Simulation::new(
        "rl-step",
        SimOptions {
            dt,
            t_end: 2.5e-3,
            ..Default::default()
        },
    );
    let n1 = sim.add_node("n1").unwrap();
    let n2 = sim.add_node("n2").unwrap();
    sim.add_component(Box::new(VoltageSource::new(
        "vs",
        n1,
        NodeRef::Ground,
        Waveform::Step {
            level: v,
            t_start: 0.0,
        },
    )))
    .unwrap();
    sim.add_component(Box::new(Resistor::new("r1", n1, n2, ohm(r))))
        .unwrap();
    sim.add_component(Box::new(Inductor::new("l1", n2, NodeRef::Ground, henry(l))))
        .unwrap();
    sim.initialize().unwrap();

    let mut recorder = MemoryRecorder::new();
    recorder.register_attribute("l1.i", sim.attr_range("l1", "i_intf").unwrap());
    sim.run(&mut [&mut recorder]).unwrap();

    let i_final = v / r;

    // After one time constant the current is at 63.2% of its final value,
    // within 1% of the analytic exponential.
    let i_tau = recorder.at_time("l1.i", tau).unwrap();
    let expected_tau = i_final * (1.0 - (-1.0_f64).exp());
    assert!(
        (i_tau - expected_tau).abs() < 0.01 * i_final,
        "i(tau) = {i_tau}, expected {expected_tau}"
    );

    // Spot-check the whole trajectory against the exponential.
    for &t in &[0.5e-3, 1.5e-3, 2.0e-3] {
        let i_sim = recorder.at_time("l1.i", t).unwrap();
        let i_exact = i_final * (1.0 - (-t / tau).exp());
        assert!(
            (i_sim - i_exact).abs() < 0.01 * i_final,
            "i({t}) = {i_sim}, expected {i_exact}"
        );
    }

    // Monotonic rise toward the final value.
    let series = recorder.scalar_series("l1.i").unwrap();
    assert!(series.windows(2).all(|w| w[1] >= w[0] - 1e-12));
    let last = *series.last().unwrap();
    assert!((last - i_final * (1.0 - (-2.5_f64).exp())).abs() < 0.01 * i_final);
}
