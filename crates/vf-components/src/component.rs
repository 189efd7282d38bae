//! The component capability contract.

use nalgebra::DMatrix;
use vf_core::attribute::{AttrRange, AttributeStore};
use vf_core::CompId;
use vf_net::{MatrixMap, NodeRef};
use vf_sched::StepTask;

use crate::error::{ComponentError, ComponentResult};

/// Everything a component needs while binding itself to the engine:
/// its matrix indices, the attribute store, and the shared solution vector.
///
/// Passed once, before the first step. Components resolve their terminal
/// indices, register attributes, precompute companion-model constants and
/// claim DAE state slots here; afterwards they are immutable.
pub struct InitContext<'a> {
    comp: CompId,
    dt: f64,
    map: &'a MatrixMap,
    pub store: &'a mut AttributeStore,
    x: AttrRange,
    dae_cursor: &'a mut usize,
}

impl<'a> InitContext<'a> {
    pub fn new(
        comp: CompId,
        dt: f64,
        map: &'a MatrixMap,
        store: &'a mut AttributeStore,
        x: AttrRange,
        dae_cursor: &'a mut usize,
    ) -> Self {
        Self {
            comp,
            dt,
            map,
            store,
            x,
            dae_cursor,
        }
    }

    pub fn comp(&self) -> CompId {
        self.comp
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn map(&self) -> &MatrixMap {
        self.map
    }

    /// The solution-vector attribute (node voltages + virtual unknowns).
    pub fn x(&self) -> AttrRange {
        self.x
    }

    /// Matrix index of a terminal binding; `None` for ground.
    pub fn node_index(&self, r: NodeRef) -> Option<usize> {
        self.map.node_index(r)
    }

    /// Matrix index of this component's `k`-th virtual node.
    pub fn virtual_index(&self, k: usize) -> ComponentResult<usize> {
        Ok(self.map.virtual_index(self.comp, k)?)
    }

    /// Claim `count` contiguous slots in the DAE state vector and return
    /// their offset. Offsets are assigned once and never change.
    pub fn alloc_dae_states(&mut self, count: usize) -> usize {
        let offset = *self.dae_cursor;
        *self.dae_cursor += count;
        offset
    }
}

/// Capability contract implemented by every electrical device.
///
/// Contract: the engine calls `init` exactly once (after terminals are
/// bound into a network and before any stamping or task collection), then
/// treats the component as immutable. `stamp_system_matrix` must be
/// additive and idempotent given unchanged inputs.
pub trait PowerComponent: Send + Sync {
    fn name(&self) -> &str;

    /// Terminal bindings, fixed at construction.
    fn terminals(&self) -> &[NodeRef];

    /// Number of internal matrix rows (e.g. branch-current unknowns).
    fn virtual_node_count(&self) -> usize {
        0
    }

    fn init(&mut self, ctx: &mut InitContext<'_>) -> ComponentResult<()>;

    /// Additively stamp the time-invariant part of the system matrix.
    fn stamp_system_matrix(&self, m: &mut DMatrix<f64>);

    /// Per-step tasks with their declared dependency sets.
    fn step_tasks(&self) -> ComponentResult<Vec<Box<dyn StepTask>>>;

    /// Right-hand-side contribution attributes feeding the solve step.
    ///
    /// Composite components forward their sub-components' contributions.
    fn right_vectors(&self, store: &AttributeStore) -> Vec<AttrRange> {
        store
            .find_range(self.name(), "right_vector")
            .into_iter()
            .collect()
    }

    // ---- DAE formulation ----

    /// Number of scalar unknowns beyond the shared node voltages.
    fn dae_state_count(&self) -> usize {
        0
    }

    /// Offset of this component's state slice, claimed during `init`.
    fn dae_state_offset(&self) -> Option<usize> {
        None
    }

    /// Fill in initial values for this component's state slice.
    fn dae_init(&self, _store: &AttributeStore, _state: &mut [f64], _dstate: &mut [f64]) {}

    /// Add this component's residual contributions: its own equations at
    /// the claimed offsets, and its terminal currents into the shared
    /// nodal-balance rows.
    fn dae_residual(&self, _t: f64, _state: &[f64], _dstate: &[f64], _resid: &mut [f64]) {}

    /// Read back the resolved state after an accepted integrator step.
    fn dae_post_step(&self, _t: f64, _state: &[f64], _dstate: &[f64], _store: &AttributeStore) {}

    /// Attribute ranges `dae_post_step` writes, for the task declaration.
    fn dae_writes(&self) -> Vec<AttrRange> {
        vec![]
    }
}

/// Helper for devices: fail with `NotInitialized` when a binding is
/// missing.
pub(crate) fn require_bind<T: Copy>(bind: &Option<T>, comp: &str) -> ComponentResult<T> {
    bind.ok_or_else(|| ComponentError::NotInitialized {
        comp: comp.to_string(),
    })
}
