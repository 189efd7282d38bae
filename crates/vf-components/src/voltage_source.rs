//! Ideal voltage source.
//!
//! Uses one virtual node for the branch-current unknown: the extra matrix
//! row enforces `v_a - v_b = v_ref(t)` and the extra column feeds the
//! branch current into the terminal KCL rows.

use nalgebra::DMatrix;
use vf_core::attribute::{AccessFlags, AttrRange, AttributeStore};
use vf_net::NodeRef;
use vf_sched::{fn_task, StepTask, TaskDeps};

use crate::component::{require_bind, InitContext, PowerComponent};
use crate::error::ComponentResult;
use crate::waveform::Waveform;

#[derive(Clone, Copy)]
struct Bind {
    a: Option<usize>,
    b: Option<usize>,
    /// Matrix index of the branch-current unknown.
    j: usize,
    x: AttrRange,
    rv: AttrRange,
    v_ref: AttrRange,
    v_intf: AttrRange,
    i_intf: AttrRange,
    dae_offset: usize,
}

/// Ideal voltage source between terminals `a` (+) and `b` (-).
///
/// `i_intf` is the current delivered at the positive terminal.
pub struct VoltageSource {
    name: String,
    terminals: [NodeRef; 2],
    wave: Waveform,
    bind: Option<Bind>,
}

impl VoltageSource {
    pub fn new(name: impl Into<String>, a: NodeRef, b: NodeRef, wave: Waveform) -> Self {
        Self {
            name: name.into(),
            terminals: [a, b],
            wave,
            bind: None,
        }
    }
}

impl PowerComponent for VoltageSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn terminals(&self) -> &[NodeRef] {
        &self.terminals
    }

    fn virtual_node_count(&self) -> usize {
        1
    }

    fn init(&mut self, ctx: &mut InitContext<'_>) -> ComponentResult<()> {
        let dim = ctx.map().dim();
        let rv = ctx
            .store
            .register(&self.name, "right_vector", dim, AccessFlags::READ)?;
        let v_ref = ctx
            .store
            .register(&self.name, "v_ref", 1, AccessFlags::READ_WRITE)?;
        let v_intf = ctx.store.register(&self.name, "v_intf", 1, AccessFlags::READ)?;
        let i_intf = ctx.store.register(&self.name, "i_intf", 1, AccessFlags::READ)?;
        self.bind = Some(Bind {
            a: ctx.node_index(self.terminals[0]),
            b: ctx.node_index(self.terminals[1]),
            j: ctx.virtual_index(0)?,
            x: ctx.x(),
            rv,
            v_ref,
            v_intf,
            i_intf,
            dae_offset: ctx.alloc_dae_states(1),
        });
        Ok(())
    }

    fn stamp_system_matrix(&self, m: &mut DMatrix<f64>) {
        let Some(bind) = self.bind else { return };
        if let Some(a) = bind.a {
            m[(a, bind.j)] += 1.0;
            m[(bind.j, a)] += 1.0;
        }
        if let Some(b) = bind.b {
            m[(b, bind.j)] -= 1.0;
            m[(bind.j, b)] -= 1.0;
        }
    }

    fn step_tasks(&self) -> ComponentResult<Vec<Box<dyn StepTask>>> {
        let bind = require_bind(&self.bind, &self.name)?;
        let Bind {
            a,
            b,
            j,
            x,
            rv,
            v_ref,
            v_intf,
            i_intf,
            ..
        } = bind;
        let wave = self.wave;

        let pre = fn_task(
            format!("{}.pre-step", self.name),
            TaskDeps {
                writes: vec![rv, v_ref],
                ..Default::default()
            },
            move |ctx| {
                let v = wave.value(ctx.time);
                ctx.store.set_scalar(v_ref, v);
                ctx.store.set(rv, j, v);
                Ok(())
            },
        );

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
                ctx.store.set_scalar(v_intf, va - vb);
                ctx.store.set_scalar(i_intf, -ctx.store.get(x, j));
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
        state[bind.dae_offset] = -store.scalar(bind.i_intf);
        dstate[bind.dae_offset] = 0.0;
    }

    fn dae_residual(&self, t: f64, state: &[f64], _dstate: &[f64], resid: &mut [f64]) {
        let Some(bind) = self.bind else { return };
        let va = bind.a.map(|i| state[i]).unwrap_or(0.0);
        let vb = bind.b.map(|i| state[i]).unwrap_or(0.0);
        let i = state[bind.dae_offset];
        resid[bind.dae_offset] = va - vb - self.wave.value(t);
        if let Some(a) = bind.a {
            resid[a] += i;
        }
        if let Some(b) = bind.b {
            resid[b] -= i;
        }
    }

    fn dae_post_step(&self, t: f64, state: &[f64], _dstate: &[f64], store: &AttributeStore) {
        let Some(bind) = self.bind else { return };
        let va = bind.a.map(|i| state[i]).unwrap_or(0.0);
        let vb = bind.b.map(|i| state[i]).unwrap_or(0.0);
        store.set_scalar(bind.v_ref, self.wave.value(t));
        store.set_scalar(bind.v_intf, va - vb);
        store.set_scalar(bind.i_intf, -state[bind.dae_offset]);
    }

    fn dae_writes(&self) -> Vec<AttrRange> {
        match self.bind {
            Some(bind) => vec![bind.v_ref, bind.v_intf, bind.i_intf],
            None => vec![],
        }
    }
}
