//! Inductor with trapezoidal companion model.
//!
//! For a fixed timestep h the inductor is replaced by a conductance
//! `geq = h/(2L)` in parallel with a history current source
//! `ihist = i_prev + geq*v_prev` flowing out of the positive terminal.

use nalgebra::DMatrix;
use vf_core::attribute::{AccessFlags, AttrRange, AttributeStore};
use vf_core::units::InductanceUnit;
use vf_net::NodeRef;
use vf_sched::{fn_task, StepTask, TaskDeps};

use crate::component::{require_bind, InitContext, PowerComponent};
use crate::error::ComponentResult;
use crate::stamp::stamp_conductance;

#[derive(Clone, Copy)]
struct Bind {
    a: Option<usize>,
    b: Option<usize>,
    geq: f64,
    x: AttrRange,
    rv: AttrRange,
    v_prev: AttrRange,
    i_prev: AttrRange,
    v_intf: AttrRange,
    i_intf: AttrRange,
    dae_offset: usize,
}

pub struct Inductor {
    name: String,
    terminals: [NodeRef; 2],
    inductance: f64,
    bind: Option<Bind>,
}

impl Inductor {
    pub fn new(name: impl Into<String>, a: NodeRef, b: NodeRef, l: InductanceUnit) -> Self {
        Self {
            name: name.into(),
            terminals: [a, b],
            inductance: l.value,
            bind: None,
        }
    }
}

impl PowerComponent for Inductor {
    fn name(&self) -> &str {
        &self.name
    }

    fn terminals(&self) -> &[NodeRef] {
        &self.terminals
    }

    fn init(&mut self, ctx: &mut InitContext<'_>) -> ComponentResult<()> {
        let dim = ctx.map().dim();
        let rv = ctx
            .store
            .register(&self.name, "right_vector", dim, AccessFlags::READ)?;
        let v_prev = ctx.store.register(&self.name, "v_prev", 1, AccessFlags::READ)?;
        let i_prev = ctx.store.register(&self.name, "i_prev", 1, AccessFlags::READ)?;
        let v_intf = ctx.store.register(&self.name, "v_intf", 1, AccessFlags::READ)?;
        let i_intf = ctx.store.register(&self.name, "i_intf", 1, AccessFlags::READ)?;
        self.bind = Some(Bind {
            a: ctx.node_index(self.terminals[0]),
            b: ctx.node_index(self.terminals[1]),
            geq: ctx.dt() / (2.0 * self.inductance),
            x: ctx.x(),
            rv,
            v_prev,
            i_prev,
            v_intf,
            i_intf,
            dae_offset: ctx.alloc_dae_states(1),
        });
        Ok(())
    }

    fn stamp_system_matrix(&self, m: &mut DMatrix<f64>) {
        if let Some(bind) = self.bind {
            stamp_conductance(m, bind.a, bind.b, bind.geq);
        }
    }

    fn step_tasks(&self) -> ComponentResult<Vec<Box<dyn StepTask>>> {
        let bind = require_bind(&self.bind, &self.name)?;
        let Bind {
            a,
            b,
            geq,
            x,
            rv,
            v_prev,
            i_prev,
            v_intf,
            i_intf,
            ..
        } = bind;

        let pre = fn_task(
            format!("{}.pre-step", self.name),
            TaskDeps {
                prev_step_reads: vec![v_prev, i_prev],
                writes: vec![rv],
                ..Default::default()
            },
            move |ctx| {
                let ihist = ctx.store.prev_scalar(i_prev) + geq * ctx.store.prev_scalar(v_prev);
                if let Some(a) = a {
                    ctx.store.set(rv, a, -ihist);
                }
                if let Some(b) = b {
                    ctx.store.set(rv, b, ihist);
                }
                Ok(())
            },
        );

        let post = fn_task(
            format!("{}.post-step", self.name),
            TaskDeps {
                prev_step_reads: vec![v_prev, i_prev],
                this_step_reads: vec![x],
                writes: vec![v_prev, i_prev, v_intf, i_intf],
                ..Default::default()
            },
            move |ctx| {
                let va = a.map(|i| ctx.store.get(x, i)).unwrap_or(0.0);
                let vb = b.map(|i| ctx.store.get(x, i)).unwrap_or(0.0);
                let v = va - vb;
                let ihist = ctx.store.prev_scalar(i_prev) + geq * ctx.store.prev_scalar(v_prev);
                let i = geq * v + ihist;
                ctx.store.set_scalar(v_prev, v);
                ctx.store.set_scalar(i_prev, i);
                ctx.store.set_scalar(v_intf, v);
                ctx.store.set_scalar(i_intf, i);
                Ok(())
            },
        );

        Ok(vec![pre, post])
    }

    fn dae_state_count(&self) -> usize {
        1
    }

    fn dae_state_offset(&self) -> Option<usize> {
        self.bind.map(|b| b.dae_offset)
    }

    fn dae_init(&self, store: &AttributeStore, state: &mut [f64], dstate: &mut [f64]) {
        let Some(bind) = self.bind else { return };
        state[bind.dae_offset] = store.scalar(bind.i_prev);
        dstate[bind.dae_offset] = 0.0;
    }

    fn dae_residual(&self, _t: f64, state: &[f64], dstate: &[f64], resid: &mut [f64]) {
        let Some(bind) = self.bind else { return };
        let va = bind.a.map(|i| state[i]).unwrap_or(0.0);
        let vb = bind.b.map(|i| state[i]).unwrap_or(0.0);
        let i = state[bind.dae_offset];
        resid[bind.dae_offset] = self.inductance * dstate[bind.dae_offset] - (va - vb);
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
        let i = state[bind.dae_offset];
        store.set_scalar(bind.v_prev, va - vb);
        store.set_scalar(bind.i_prev, i);
        store.set_scalar(bind.v_intf, va - vb);
        store.set_scalar(bind.i_intf, i);
    }

    fn dae_writes(&self) -> Vec<AttrRange> {
        match self.bind {
            Some(bind) => vec![bind.v_prev, bind.i_prev, bind.v_intf, bind.i_intf],
            None => vec![],
        }
    }
}
