//! Linear resistor.

use nalgebra::DMatrix;
use vf_core::attribute::{AccessFlags, AttrRange, AttributeStore};
use vf_core::units::Resistance;
use vf_net::NodeRef;
use vf_sched::{fn_task, StepTask, TaskDeps};

use crate::component::{require_bind, InitContext, PowerComponent};
use crate::error::ComponentResult;
use crate::stamp::stamp_conductance;

#[derive(Clone, Copy)]
struct Bind {
    a: Option<usize>,
    b: Option<usize>,
    x: AttrRange,
    v_intf: AttrRange,
    i_intf: AttrRange,
}

/// Two-terminal resistor. Current convention: positive `i_intf` flows from
/// terminal `a` to terminal `b` through the device.
pub struct Resistor {
    name: String,
    terminals: [NodeRef; 2],
    conductance: f64,
    bind: Option<Bind>,
}

impl Resistor {
    pub fn new(name: impl Into<String>, a: NodeRef, b: NodeRef, r: Resistance) -> Self {
        Self {
            name: name.into(),
            terminals: [a, b],
            conductance: 1.0 / r.value,
            bind: None,
        }
    }
}

impl PowerComponent for Resistor {
    fn name(&self) -> &str {
        &self.name
    }

    fn terminals(&self) -> &[NodeRef] {
        &self.terminals
    }

    fn init(&mut self, ctx: &mut InitContext<'_>) -> ComponentResult<()> {
        let v_intf = ctx.store.register(&self.name, "v_intf", 1, AccessFlags::READ)?;
        let i_intf = ctx.store.register(&self.name, "i_intf", 1, AccessFlags::READ)?;
        self.bind = Some(Bind {
            a: ctx.node_index(self.terminals[0]),
            b: ctx.node_index(self.terminals[1]),
            x: ctx.x(),
            v_intf,
            i_intf,
        });
        Ok(())
    }

    fn stamp_system_matrix(&self, m: &mut DMatrix<f64>) {
        if let Some(bind) = self.bind {
            stamp_conductance(m, bind.a, bind.b, self.conductance);
        }
    }

    fn step_tasks(&self) -> ComponentResult<Vec<Box<dyn StepTask>>> {
        let Bind {
            a,
            b,
            x,
            v_intf,
            i_intf,
        } = require_bind(&self.bind, &self.name)?;
        let g = self.conductance;

        let post = fn_task(
            format!("{}.post-step", self.name),
            TaskDeps {
                this_step_reads: vec![x],
                writes: vec![v_intf, i_intf],
                ..Default::default()
            },
            move |ctx| {
                let va = a.map(|i| ctx.store.get(x, i)).unwrap_or(0.0);
                let vb = b.map(|i| ctx.store.get(x, i)).unwrap_or(0.0);
                let v = va - vb;
                ctx.store.set_scalar(v_intf, v);
                ctx.store.set_scalar(i_intf, g * v);
                Ok(())
            },
        );
        Ok(vec![post])
    }

    fn dae_residual(&self, _t: f64, state: &[f64], _dstate: &[f64], resid: &mut [f64]) {
        let Some(bind) = self.bind else { return };
        let va = bind.a.map(|i| state[i]).unwrap_or(0.0);
        let vb = bind.b.map(|i| state[i]).unwrap_or(0.0);
        let i = self.conductance * (va - vb);
        if let Some(a) = bind.a {
            resid[a] += i;
        }
        if let Some(b) = bind.b {
            resid[b] -= i;
        }
    }

    fn dae_post_step(&self, _t: f64, state: &[f64], _dstate: &[f64], store: &AttributeStore) {
        let Some(bind) = self.bind else { return };
        let va = bind.a.map(|i| state[i]).unwrap_or(0.0);
        let vb = bind.b.map(|i| state[i]).unwrap_or(0.0);
        let v = va - vb;
        store.set_scalar(bind.v_intf, v);
        store.set_scalar(bind.i_intf, self.conductance * v);
    }

    fn dae_writes(&self) -> Vec<AttrRange> {
        match self.bind {
            Some(bind) => vec![bind.v_intf, bind.i_intf],
            None => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vf_core::units::ohm;
    use vf_net::NetworkBuilder;

    fn init_between_two_nodes(r: f64) -> (Resistor, AttributeStore, usize) {
        let mut builder = NetworkBuilder::new();
        let n1 = builder.add_node("n1");
        let n2 = builder.add_node("n2");
        let id = builder.add_component("r1", vec![n1, n2], 0);
        let network = builder.build().unwrap();

        let mut store = AttributeStore::new();
        let dim = network.map().dim();
        let x = store.register("system", "x", dim, AccessFlags::READ).unwrap();

        let mut resistor = Resistor::new("r1", n1, n2, ohm(r));
        let mut cursor = network.map().node_count();
        let mut ctx = InitContext::new(id, 1e-4, network.map(), &mut store, x, &mut cursor);
        resistor.init(&mut ctx).unwrap();
        (resistor, store, dim)
    }

    #[test]
    fn stamp_is_symmetric() {
        let (resistor, _store, dim) = init_between_two_nodes(2.0);
        let mut m = DMatrix::zeros(dim, dim);
        resistor.stamp_system_matrix(&mut m);
        assert_eq!(m[(0, 0)], 0.5);
        assert_eq!(m[(1, 1)], 0.5);
        assert_eq!(m[(0, 1)], -0.5);
        assert_eq!(m[(1, 0)], -0.5);
    }

    #[test]
    fn post_step_computes_interface_values() {
        let (resistor, store, _dim) = init_between_two_nodes(2.0);
        let x = store.range("system", "x").unwrap();
        store.set(x, 0, 3.0);
        store.set(x, 1, 1.0);

        let mut tasks = resistor.step_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        let ctx = vf_sched::StepContext {
            time: 0.0,
            dt: 1e-4,
            step: 0,
            store: &store,
        };
        tasks[0].execute(&ctx).unwrap();

        assert_eq!(store.scalar(store.range("r1", "v_intf").unwrap()), 2.0);
        assert_eq!(store.scalar(store.range("r1", "i_intf").unwrap()), 1.0);
    }

    #[test]
    fn tasks_before_init_fail() {
        let r = Resistor::new("r1", NodeRef::Ground, NodeRef::Ground, ohm(1.0));
        assert!(r.step_tasks().is_err());
    }
}
