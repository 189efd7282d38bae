//! DAE residual engine.
//!
//! Alternate solver mode: the unknowns live in one flat state vector,
//! node voltages first, then each component's scalar states at the offset
//! it claimed during initialization. Components contribute residual rows
//! at their fixed offsets plus terminal currents into the shared
//! nodal-balance rows; an implicit integrator (a collaborator behind
//! [`DaeIntegrator`]) drives the residual to zero each step.

use std::sync::Arc;

use nalgebra::DVector;
use vf_core::attribute::AttrRange;
use vf_core::AttributeStore;
use vf_net::{Network, Topology};
use vf_sched::{StepContext, StepTask, TaskDeps, TaskError};
use vf_components::PowerComponent;

use crate::error::{SolverError, SolverResult};
use crate::jacobian::finite_difference_jacobian;
use crate::newton::{newton_solve, NewtonConfig};

/// Global state vector, derivative vector and offset bookkeeping.
pub struct DaeSystem {
    n_nodes: usize,
    dim: usize,
    pub state: DVector<f64>,
    pub dstate: DVector<f64>,
    /// State rows of components absent from the active topology. Their
    /// residual is `dstate[row]`, freezing the value without losing it.
    frozen_rows: Vec<usize>,
}

impl DaeSystem {
    pub fn new(n_nodes: usize, dim: usize) -> Self {
        Self {
            n_nodes,
            dim,
            state: DVector::zeros(dim),
            dstate: DVector::zeros(dim),
            frozen_rows: Vec::new(),
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn set_frozen_rows(&mut self, rows: Vec<usize>) {
        self.frozen_rows = rows;
    }

    /// Assemble the residual at the given state/derivative values.
    ///
    /// Offsets never change between evaluations: each component writes the
    /// same rows every time.
    pub fn residual(
        &self,
        comps: &[Arc<dyn PowerComponent>],
        t: f64,
        state: &DVector<f64>,
        dstate: &DVector<f64>,
    ) -> DVector<f64> {
        let mut resid = DVector::zeros(self.dim);
        for comp in comps {
            comp.dae_residual(t, state.as_slice(), dstate.as_slice(), resid.as_mut_slice());
        }
        for &row in &self.frozen_rows {
            resid[row] = dstate[row];
        }
        resid
    }
}

/// Implicit integrator collaborator: advances the DAE system by one step.
pub trait DaeIntegrator: Send {
    fn step(
        &mut self,
        sys: &mut DaeSystem,
        comps: &[Arc<dyn PowerComponent>],
        t: f64,
        dt: f64,
    ) -> SolverResult<()>;
}

/// First-order implicit Euler corrector, bundled for tests and small runs.
///
/// Solves `F(t+dt, z, (z - x_n)/dt) = 0` for `z` with damped Newton and a
/// finite-difference Jacobian.
pub struct BackwardEuler {
    pub newton: NewtonConfig,
}

impl BackwardEuler {
    pub fn new(newton: NewtonConfig) -> Self {
        Self { newton }
    }
}

impl Default for BackwardEuler {
    fn default() -> Self {
        Self::new(NewtonConfig::default())
    }
}

impl DaeIntegrator for BackwardEuler {
    fn step(
        &mut self,
        sys: &mut DaeSystem,
        comps: &[Arc<dyn PowerComponent>],
        t: f64,
        dt: f64,
    ) -> SolverResult<()> {
        let x_n = sys.state.clone();
        let dt_inv = 1.0 / dt;

        let sys_ref: &DaeSystem = sys;
        let residual_fn = |z: &DVector<f64>| -> SolverResult<DVector<f64>> {
            let dz = (z - &x_n) * dt_inv;
            Ok(sys_ref.residual(comps, t + dt, z, &dz))
        };
        let jacobian_fn =
            |z: &DVector<f64>| finite_difference_jacobian(z, &residual_fn, 1e-7);

        let result = newton_solve(x_n.clone(), &residual_fn, jacobian_fn, &self.newton)
            .map_err(|e| match e {
                SolverError::ResidualConvergence { what } => SolverError::ResidualConvergence {
                    what: format!("implicit step to t={}: {what}", t + dt),
                },
                other => other,
            })?;

        sys.dstate = (&result.x - &x_n) * dt_inv;
        sys.state = result.x;
        Ok(())
    }
}

/// The single step task of DAE mode: integrate, publish node voltages,
/// let every member read back its resolved slice.
pub struct DaeSolveTask {
    label: String,
    deps: TaskDeps,
    sys: DaeSystem,
    members: Vec<Arc<dyn PowerComponent>>,
    integrator: Box<dyn DaeIntegrator>,
    x: AttrRange,
}

impl std::fmt::Debug for DaeSolveTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaeSolveTask")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl StepTask for DaeSolveTask {
    fn label(&self) -> &str {
        &self.label
    }

    fn deps(&self) -> &TaskDeps {
        &self.deps
    }

    fn execute(&mut self, ctx: &StepContext<'_>) -> Result<(), TaskError> {
        self.integrator
            .step(&mut self.sys, &self.members, ctx.time, ctx.dt)
            .map_err(|e| TaskError::new(&self.label, e.to_string()))?;

        for i in 0..self.sys.n_nodes() {
            ctx.store.set(self.x, i, self.sys.state[i]);
        }
        for comp in &self.members {
            comp.dae_post_step(
                ctx.time + ctx.dt,
                self.sys.state.as_slice(),
                self.sys.dstate.as_slice(),
                ctx.store,
            );
        }
        Ok(())
    }
}

/// Run the single initialization pass and wrap the engine into its task.
pub fn build_dae_task(
    network: &Network,
    topology: &Topology,
    comps: &[Arc<dyn PowerComponent>],
    store: &AttributeStore,
    x: AttrRange,
    state_dim: usize,
    integrator: Box<dyn DaeIntegrator>,
) -> SolverResult<DaeSolveTask> {
    let map = network.map();
    let n_nodes = map.node_count();

    // Every real node needs at least one member constraining it.
    let mut referenced = vec![false; n_nodes];
    for &id in &topology.members {
        let info = &network.components()[id.index() as usize];
        for &term in &info.terminals {
            if let Some(i) = map.node_index(term) {
                referenced[i] = true;
            }
        }
    }
    let orphans: Vec<String> = (0..n_nodes)
        .filter(|&i| !referenced[i])
        .map(|i| network.row_label(i))
        .collect();
    if !orphans.is_empty() {
        return Err(SolverError::SingularSystem { rows: orphans });
    }

    let mut member = vec![false; comps.len()];
    for &id in &topology.members {
        member[id.index() as usize] = true;
    }

    let mut sys = DaeSystem::new(n_nodes, state_dim);
    // Node voltages continue from the current solution (continuity across
    // a topology switch or a solver-mode handover).
    for i in 0..n_nodes {
        sys.state[i] = store.get(x, i);
    }

    let mut frozen = Vec::new();
    for (ci, comp) in comps.iter().enumerate() {
        comp.dae_init(store, sys.state.as_mut_slice(), sys.dstate.as_mut_slice());
        if !member[ci] {
            if let Some(offset) = comp.dae_state_offset() {
                frozen.extend(offset..offset + comp.dae_state_count());
            }
        }
    }
    sys.set_frozen_rows(frozen);

    let members: Vec<Arc<dyn PowerComponent>> = topology
        .members
        .iter()
        .map(|&id| Arc::clone(&comps[id.index() as usize]))
        .collect();

    let mut writes = vec![x];
    for comp in &members {
        writes.extend(comp.dae_writes());
    }

    tracing::debug!(
        topology = %topology.name,
        states = state_dim,
        members = members.len(),
        "initialized DAE system"
    );

    Ok(DaeSolveTask {
        label: "dae.solve".to_string(),
        deps: TaskDeps {
            writes,
            ..Default::default()
        },
        sys,
        members,
        integrator,
        x,
    })
}
