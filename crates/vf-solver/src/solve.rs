//! The per-step MNA solve task and its builder.
//!
//! `build_solve_task` is invoked on every topology activation: it stamps
//! the active components into a fresh system matrix, pins the virtual rows
//! of absent components, factorizes, and wires up the task that every step
//! accumulates the right-hand side and writes the solution vector.

use std::sync::Arc;

use nalgebra::DVector;
use vf_core::attribute::AttrRange;
use vf_core::AttributeStore;
use vf_net::{Network, Topology};
use vf_sched::{StepContext, StepTask, TaskDeps, TaskError};
use vf_components::PowerComponent;

use crate::error::SolverResult;
use crate::mna::MnaSystem;

pub struct MnaSolveTask {
    label: String,
    deps: TaskDeps,
    system: MnaSystem,
    /// Per-component right-hand-side contributions, summed every step.
    sources: Vec<AttrRange>,
    x: AttrRange,
}

impl StepTask for MnaSolveTask {
    fn label(&self) -> &str {
        &self.label
    }

    fn deps(&self) -> &TaskDeps {
        &self.deps
    }

    fn execute(&mut self, ctx: &StepContext<'_>) -> Result<(), TaskError> {
        let dim = self.system.dim();
        let mut b = DVector::zeros(dim);
        for src in &self.sources {
            for i in 0..dim {
                b[i] += ctx.store.get(*src, i);
            }
        }

        let solution = self
            .system
            .solve(&b)
            .map_err(|e| TaskError::new(&self.label, e.to_string()))?;
        for i in 0..dim {
            ctx.store.set(self.x, i, solution[i]);
        }
        Ok(())
    }
}

/// Assemble, factorize and wrap the solve into a task for one topology.
pub fn build_solve_task(
    network: &Network,
    topology: &Topology,
    comps: &[Arc<dyn PowerComponent>],
    store: &AttributeStore,
    x: AttrRange,
) -> SolverResult<MnaSolveTask> {
    let map = network.map();
    let mut system = MnaSystem::new(map.dim());

    let mut member = vec![false; comps.len()];
    for &id in &topology.members {
        member[id.index() as usize] = true;
    }

    for &id in &topology.members {
        comps[id.index() as usize].stamp_system_matrix(system.matrix_mut());
    }

    // Virtual unknowns of components outside this topology are
    // unconstrained; pin them so the shared matrix layout stays regular.
    for (ci, info) in network.components().iter().enumerate() {
        if !member[ci] {
            let (base, count) = map.virtual_block(info.id);
            for k in 0..count {
                system.pin_row(base + k);
            }
        }
    }

    tracing::debug!(
        topology = %topology.name,
        dim = map.dim(),
        members = topology.members.len(),
        "assembled system matrix"
    );
    system.factorize(&|row| network.row_label(row))?;

    let mut sources = Vec::new();
    for &id in &topology.members {
        sources.extend(comps[id.index() as usize].right_vectors(store));
    }

    Ok(MnaSolveTask {
        label: "mna.solve".to_string(),
        deps: TaskDeps {
            this_step_reads: sources.clone(),
            writes: vec![x],
            ..Default::default()
        },
        system,
        sources,
        x,
    })
}
