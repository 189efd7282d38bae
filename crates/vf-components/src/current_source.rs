//! Ideal current source.
//!
//! Injects `i_ref(t)` into terminal `a` and pulls it from terminal `b`.
//! No matrix stamp: the contribution is purely on the right-hand side.

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
    x: AttrRange,
    rv: AttrRange,
    i_ref: AttrRange,
    v_intf: AttrRange,
    i_intf: AttrRange,
}

pub struct CurrentSource {
    name: String,
    terminals: [NodeRef; 2],
    wave: Waveform,
    bind: Option<Bind>,
}

impl CurrentSource {
    pub fn new(name: impl Into<String>, a: NodeRef, b: NodeRef, wave: Waveform) -> Self {
        Self {
            name: name.into(),
            terminals: [a, b],
            wave,
            bind: None,
        }
    }
}

impl PowerComponent for CurrentSource {
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
        let i_ref = ctx.store.register(&self.name, "i_ref", 1, AccessFlags::READ)?;
        let v_intf = ctx.store.register(&self.name, "v_intf", 1, AccessFlags::READ)?;
        let i_intf = ctx.store.register(&self.name, "i_intf", 1, AccessFlags::READ)?;
        self.bind = Some(Bind {
            a: ctx.node_index(self.terminals[0]),
            b: ctx.node_index(self.terminals[1]),
            x: ctx.x(),
            rv,
            i_ref,
            v_intf,
            i_intf,
        });
        Ok(())
    }

    fn stamp_system_matrix(&self, _m: &mut DMatrix<f64>) {}

    fn step_tasks(&self) -> ComponentResult<Vec<Box<dyn StepTask>>> {
        let bind = require_bind(&self.bind, &self.name)?;
        let Bind {
            a,
            b,
            x,
            rv,
            i_ref,
            v_intf,
            i_intf,
        } = bind;
        let wave = self.wave;

        let pre = fn_task(
            format!("{}.pre-step", self.name),
            TaskDeps {
                writes: vec![rv, i_ref],
                ..Default::default()
            },
            move |ctx| {
                let i = wave.value(ctx.time);
                ctx.store.set_scalar(i_ref, i);
                if let Some(a) = a {
                    ctx.store.set(rv, a, i);
                }
                if let Some(b) = b {
                    ctx.store.set(rv, b, -i);
                }
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
                ctx.store.set_scalar(i_intf, wave.value(ctx.time));
                Ok(())
            },
        );

        Ok(vec![pre, post])
    }

    fn dae_residual(&self, t: f64, _state: &[f64], _dstate: &[f64], resid: &mut [f64]) {
        let Some(bind) = self.bind else { return };
        let i = self.wave.value(t);
        if let Some(a) = bind.a {
            resid[a] -= i;
        }
        if let Some(b) = bind.b {
            resid[b] += i;
        }
    }

    fn dae_post_step(&self, t: f64, state: &[f64], _dstate: &[f64], store: &AttributeStore) {
        let Some(bind) = self.bind else { return };
        let va = bind.a.map(|i| state[i]).unwrap_or(0.0);
        let vb = bind.b.map(|i| state[i]).unwrap_or(0.0);
        let i = self.wave.value(t);
        store.set_scalar(bind.i_ref, i);
        store.set_scalar(bind.v_intf, va - vb);
        store.set_scalar(bind.i_intf, i);
    }

    fn dae_writes(&self) -> Vec<AttrRange> {
        match self.bind {
            Some(bind) => vec![bind.i_ref, bind.v_intf, bind.i_intf],
            None => vec![],
        }
    }
}
