//! Voltage source with internal resistance, as a Norton equivalent.
//!
//! Composed of two owned sub-components sharing the same terminal pair: a
//! current source carrying `v(t)/r` and a shunt resistor of `r`. The
//! composite re-exports the current source's `i_ref` attribute under its
//! own name (an alias: shared storage, ownership stays with the sub).

use nalgebra::DMatrix;
use vf_core::attribute::{AccessFlags, AttrRange, AttributeStore};
use vf_core::units::Resistance;
use vf_net::NodeRef;
use vf_sched::StepTask;

use crate::component::{InitContext, PowerComponent};
use crate::current_source::CurrentSource;
use crate::error::ComponentResult;
use crate::resistor::Resistor;
use crate::waveform::Waveform;

pub struct NortonSource {
    name: String,
    terminals: [NodeRef; 2],
    isrc: CurrentSource,
    shunt: Resistor,
}

impl NortonSource {
    pub fn new(
        name: impl Into<String>,
        a: NodeRef,
        b: NodeRef,
        wave: Waveform,
        r: Resistance,
    ) -> Self {
        let name = name.into();
        let isrc = CurrentSource::new(format!("{name}.isrc"), a, b, wave.scaled(1.0 / r.value));
        let shunt = Resistor::new(format!("{name}.shunt"), a, b, r);
        Self {
            name,
            terminals: [a, b],
            isrc,
            shunt,
        }
    }
}

impl PowerComponent for NortonSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn terminals(&self) -> &[NodeRef] {
        &self.terminals
    }

    fn init(&mut self, ctx: &mut InitContext<'_>) -> ComponentResult<()> {
        self.isrc.init(ctx)?;
        self.shunt.init(ctx)?;
        let isrc_name = self.isrc.name().to_string();
        ctx.store
            .register_alias(&self.name, &isrc_name, "i_ref", AccessFlags::READ)?;
        Ok(())
    }

    fn stamp_system_matrix(&self, m: &mut DMatrix<f64>) {
        self.isrc.stamp_system_matrix(m);
        self.shunt.stamp_system_matrix(m);
    }

    fn step_tasks(&self) -> ComponentResult<Vec<Box<dyn StepTask>>> {
        let mut tasks = self.isrc.step_tasks()?;
        tasks.extend(self.shunt.step_tasks()?);
        Ok(tasks)
    }

    fn right_vectors(&self, store: &AttributeStore) -> Vec<AttrRange> {
        let mut sources = self.isrc.right_vectors(store);
        sources.extend(self.shunt.right_vectors(store));
        sources
    }

    fn dae_residual(&self, t: f64, state: &[f64], dstate: &[f64], resid: &mut [f64]) {
        self.isrc.dae_residual(t, state, dstate, resid);
        self.shunt.dae_residual(t, state, dstate, resid);
    }

    fn dae_post_step(&self, t: f64, state: &[f64], dstate: &[f64], store: &AttributeStore) {
        self.isrc.dae_post_step(t, state, dstate, store);
        self.shunt.dae_post_step(t, state, dstate, store);
    }

    fn dae_writes(&self) -> Vec<AttrRange> {
        let mut writes = self.isrc.dae_writes();
        writes.extend(self.shunt.dae_writes());
        writes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vf_core::units::ohm;
    use vf_net::NetworkBuilder;

    #[test]
    fn alias_re_exports_sub_attribute() {
        let mut builder = NetworkBuilder::new();
        let n1 = builder.add_node("n1");
        let id = builder.add_component("grid", vec![n1, NodeRef::Ground], 0);
        let network = builder.build().unwrap();

        let mut store = AttributeStore::new();
        let dim = network.map().dim();
        let x = store.register("system", "x", dim, AccessFlags::READ).unwrap();

        let mut source =
            NortonSource::new("grid", n1, NodeRef::Ground, Waveform::Dc(10.0), ohm(0.1));
        let mut cursor = network.map().node_count();
        let mut ctx = InitContext::new(id, 1e-4, network.map(), &mut store, x, &mut cursor);
        source.init(&mut ctx).unwrap();

        // shared storage, ownership stays with the sub-component
        assert_eq!(
            store.range("grid", "i_ref").unwrap(),
            store.range("grid.isrc", "i_ref").unwrap()
        );
        assert_eq!(store.owner_of("grid", "i_ref").unwrap(), "grid.isrc");

        // Norton conversion: 10 V behind 0.1 ohm -> 100 A source
        let mut tasks = source.step_tasks().unwrap();
        let ctx = vf_sched::StepContext {
            time: 0.0,
            dt: 1e-4,
            step: 0,
            store: &store,
        };
        for task in &mut tasks {
            task.execute(&ctx).unwrap();
        }
        let i_ref = store.range("grid", "i_ref").unwrap();
        assert!((store.scalar(i_ref) - 100.0).abs() < 1e-9);
    }
}
