//! Simulation lifecycle and the fixed-step loop.
//!
//! Lifecycle: `Constructed -> Initialized -> Running -> (switch)* ->
//! Finished | Aborted`. Construction stages nodes, components and
//! topologies; `initialize` freezes the network, binds components and
//! builds the first step program; `run` drives the scheduler once per
//! step, commits attribute values at the step barrier and applies due
//! switch events.

use std::sync::Arc;

use tracing::{error, info};
use vf_core::attribute::{AccessFlags, AttrRange, AttributeStore};
use vf_core::CompId;
use vf_net::{Network, NetworkBuilder, NodeRef, Topology};
use vf_sched::{SchedulePolicy, Scheduler, StepContext, TaskGraphBuilder};
use vf_components::{InitContext, PowerComponent};
use vf_solver::{build_dae_task, build_solve_task, BackwardEuler, DaeIntegrator};

use crate::error::{SimError, SimResult};
use crate::events::EventQueue;
use crate::init::SteadyStateInit;
use crate::recorder::DataSink;

/// Solver formulation for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverType {
    /// Modified nodal analysis with a cached factorization.
    #[default]
    Mna,
    /// Residual formulation driven by an implicit integrator.
    Dae,
}

/// Options for simulation runs.
#[derive(Debug, Clone)]
pub struct SimOptions {
    /// Fixed time step (seconds)
    pub dt: f64,
    /// Final simulation time (seconds)
    pub t_end: f64,
    /// Worker threads for the scheduler (1 = sequential)
    pub threads: usize,
    /// Solver formulation
    pub solver: SolverType,
    /// Maximum number of steps (safety limit)
    pub max_steps: usize,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            dt: 1e-4,
            t_end: 0.1,
            threads: 1,
            solver: SolverType::default(),
            max_steps: 1_000_000,
        }
    }
}

/// Lifecycle state of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Constructed,
    Initialized,
    Running,
    Finished,
    Aborted,
}

enum InitialVoltages {
    Zero,
    Values(Vec<(NodeRef, f64)>),
    Solver(Box<dyn SteadyStateInit>),
}

type IntegratorFactory = Box<dyn Fn() -> Box<dyn DaeIntegrator> + Send>;

pub struct Simulation {
    name: String,
    opts: SimOptions,

    // staged until initialize()
    builder: Option<NetworkBuilder>,
    staged: Vec<Box<dyn PowerComponent>>,
    topologies: Vec<Topology>,
    events: EventQueue,
    initial_voltages: InitialVoltages,
    integrator_factory: IntegratorFactory,

    phase: Phase,
    time: f64,
    step: usize,
    active: usize,

    // populated by initialize()
    network: Option<Network>,
    store: AttributeStore,
    pool: Vec<Arc<dyn PowerComponent>>,
    scheduler: Option<Scheduler>,
    x: Option<AttrRange>,
    dae_state_dim: usize,
}

impl Simulation {
    pub fn new(name: impl Into<String>, opts: SimOptions) -> Self {
        Self {
            name: name.into(),
            opts,
            builder: Some(NetworkBuilder::new()),
            staged: Vec::new(),
            topologies: Vec::new(),
            events: EventQueue::new(),
            initial_voltages: InitialVoltages::Zero,
            integrator_factory: Box::new(|| Box::new(BackwardEuler::default()) as Box<dyn DaeIntegrator>),
            phase: Phase::Constructed,
            time: 0.0,
            step: 0,
            active: 0,
            network: None,
            store: AttributeStore::new(),
            pool: Vec::new(),
            scheduler: None,
            x: None,
            dae_state_dim: 0,
        }
    }

    fn require_phase(&self, expected: Phase, doing: &str) -> SimResult<()> {
        if self.phase != expected {
            return Err(SimError::State {
                what: format!("{doing} requires {expected:?}, simulation is {:?}", self.phase),
            });
        }
        Ok(())
    }

    fn staging_builder(&mut self) -> SimResult<&mut NetworkBuilder> {
        self.builder.as_mut().ok_or_else(|| SimError::State {
            what: "network already frozen by a previous initialize".to_string(),
        })
    }

    /// Add an electrical node.
    pub fn add_node(&mut self, name: impl Into<String>) -> SimResult<NodeRef> {
        self.require_phase(Phase::Constructed, "add_node")?;
        Ok(self.staging_builder()?.add_node(name))
    }

    /// Add a component; terminals must already be bound.
    pub fn add_component(&mut self, comp: Box<dyn PowerComponent>) -> SimResult<CompId> {
        self.require_phase(Phase::Constructed, "add_component")?;
        let id = self.staging_builder()?.add_component(
            comp.name(),
            comp.terminals().to_vec(),
            comp.virtual_node_count(),
        );
        self.staged.push(comp);
        Ok(id)
    }

    /// Register a topology snapshot. The first one added is active at
    /// start; if none is added, all components form the initial topology.
    pub fn add_topology(
        &mut self,
        name: impl Into<String>,
        members: Vec<CompId>,
    ) -> SimResult<usize> {
        self.require_phase(Phase::Constructed, "add_topology")?;
        self.topologies.push(Topology::new(name, members));
        Ok(self.topologies.len() - 1)
    }

    /// Schedule a switch to `topology` at simulated `time`.
    pub fn schedule_switch(&mut self, time: f64, topology: usize) -> SimResult<()> {
        self.require_phase(Phase::Constructed, "schedule_switch")?;
        self.events.push(time, topology);
        Ok(())
    }

    /// Set a user-supplied initial voltage for one node.
    pub fn set_initial_voltage(&mut self, node: NodeRef, volts: f64) -> SimResult<()> {
        self.require_phase(Phase::Constructed, "set_initial_voltage")?;
        match &mut self.initial_voltages {
            InitialVoltages::Values(values) => values.push((node, volts)),
            other => *other = InitialVoltages::Values(vec![(node, volts)]),
        }
        Ok(())
    }

    /// Obtain initial node voltages from a steady-state pre-solve.
    pub fn set_steady_state_init(&mut self, solver: Box<dyn SteadyStateInit>) -> SimResult<()> {
        self.require_phase(Phase::Constructed, "set_steady_state_init")?;
        self.initial_voltages = InitialVoltages::Solver(solver);
        Ok(())
    }

    /// Replace the implicit integrator used in DAE mode.
    pub fn set_dae_integrator_factory(
        &mut self,
        factory: impl Fn() -> Box<dyn DaeIntegrator> + Send + 'static,
    ) {
        self.integrator_factory = Box::new(factory);
    }

    /// Freeze the network, bind components and build the first step
    /// program.
    pub fn initialize(&mut self) -> SimResult<()> {
        self.require_phase(Phase::Constructed, "initialize")?;

        let builder = self.builder.take().ok_or_else(|| SimError::State {
            what: "initialize called twice".to_string(),
        })?;
        let network = builder.build()?;
        let dim = network.map().dim();
        let x = self.store.register("system", "x", dim, AccessFlags::READ)?;

        // per-node voltage views into the solution vector
        for (i, node) in network.nodes().iter().enumerate() {
            self.store
                .register_view(&node.name, "v", "system", "x", i, 1, AccessFlags::READ)?;
        }

        let mut staged = std::mem::take(&mut self.staged);
        let mut dae_cursor = network.map().node_count();
        for (i, comp) in staged.iter_mut().enumerate() {
            let id = CompId::from_index(i as u32);
            let mut ctx = InitContext::new(
                id,
                self.opts.dt,
                network.map(),
                &mut self.store,
                x,
                &mut dae_cursor,
            );
            comp.init(&mut ctx)?;
        }
        self.pool = staged.into_iter().map(Arc::from).collect();
        self.dae_state_dim = dae_cursor;

        if self.topologies.is_empty() {
            let members = (0..self.pool.len())
                .map(|i| CompId::from_index(i as u32))
                .collect();
            self.topologies.push(Topology::new("all", members));
        }
        for topology in &self.topologies {
            topology.validate(&network)?;
        }

        match &self.initial_voltages {
            InitialVoltages::Zero => {}
            InitialVoltages::Values(values) => {
                for &(node, volts) in values {
                    if let Some(i) = network.map().node_index(node) {
                        self.store.set(x, i, volts);
                    }
                }
            }
            InitialVoltages::Solver(solver) => {
                let voltages = solver.initial_voltages(&network)?;
                if voltages.len() != network.nodes().len() {
                    return Err(SimError::TopologyMismatch {
                        what: format!(
                            "steady-state init produced {} voltages for {} nodes",
                            voltages.len(),
                            network.nodes().len()
                        ),
                    });
                }
                for (i, v) in voltages.into_iter().enumerate() {
                    self.store.set(x, i, v);
                }
            }
        }
        self.store.commit_step();

        self.events
            .finalize(self.topologies.len())
            .map_err(|target| SimError::TopologyMismatch {
                what: format!(
                    "switch event targets topology {target}, only {} registered",
                    self.topologies.len()
                ),
            })?;

        self.scheduler = Some(Scheduler::new(SchedulePolicy::with_threads(
            self.opts.threads,
        ))?);
        self.network = Some(network);
        self.x = Some(x);
        self.activate(0)?;
        self.phase = Phase::Initialized;

        info!(
            name = %self.name,
            nodes = self.network.as_ref().map(|n| n.nodes().len()).unwrap_or(0),
            components = self.pool.len(),
            dim,
            solver = ?self.opts.solver,
            "simulation initialized"
        );
        Ok(())
    }

    /// Build the step program for one topology and cache its leveling.
    fn activate(&mut self, idx: usize) -> SimResult<()> {
        let network = self.network.as_ref().ok_or_else(|| SimError::State {
            what: "activate before initialize".to_string(),
        })?;
        let topology = &self.topologies[idx];
        let x = self.x.expect("solution attribute registered");

        let mut graph_builder = TaskGraphBuilder::new();
        match self.opts.solver {
            SolverType::Mna => {
                for &id in &topology.members {
                    graph_builder.add_tasks(self.pool[id.index() as usize].step_tasks()?);
                }
                let solve = build_solve_task(network, topology, &self.pool, &self.store, x)?;
                graph_builder.add_task(Box::new(solve));
            }
            SolverType::Dae => {
                let integrator = (self.integrator_factory)();
                let solve = build_dae_task(
                    network,
                    topology,
                    &self.pool,
                    &self.store,
                    x,
                    self.dae_state_dim,
                    integrator,
                )?;
                graph_builder.add_task(Box::new(solve));
            }
        }

        let graph = graph_builder.build()?;
        self.scheduler
            .as_mut()
            .expect("scheduler constructed")
            .load(graph);
        self.active = idx;
        Ok(())
    }

    /// Run to the configured end time, sampling every sink after each
    /// step.
    pub fn run(&mut self, sinks: &mut [&mut dyn DataSink]) -> SimResult<()> {
        self.require_phase(Phase::Initialized, "run")?;
        self.phase = Phase::Running;

        let dt = self.opts.dt;
        while self.time < self.opts.t_end && self.step < self.opts.max_steps {
            let ctx = StepContext {
                time: self.time,
                dt,
                step: self.step,
                store: &self.store,
            };
            if let Err(source) = self.scheduler.as_mut().expect("initialized").run_step(&ctx) {
                self.phase = Phase::Aborted;
                error!(step = self.step, time = self.time, %source, "step failed; aborting");
                return Err(SimError::StepFailed {
                    step: self.step,
                    time: self.time,
                    source,
                });
            }
            self.store.commit_step();
            for sink in sinks.iter_mut() {
                sink.sample(self.time, self.step, &self.store);
            }

            self.step += 1;
            self.time = self.step as f64 * dt;

            while let Some(event) = self.events.due(self.time, 0.25 * dt) {
                info!(time = self.time, topology = event.topology, "switching topology");
                if let Err(e) = self.activate(event.topology) {
                    self.phase = Phase::Aborted;
                    error!(step = self.step, time = self.time, "topology switch failed");
                    return Err(e);
                }
            }
        }

        self.phase = Phase::Finished;
        info!(steps = self.step, time = self.time, "simulation finished");
        Ok(())
    }

    // ---- accessors ----

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn steps(&self) -> usize {
        self.step
    }

    pub fn active_topology(&self) -> usize {
        self.active
    }

    pub fn store(&self) -> &AttributeStore {
        &self.store
    }

    /// Range of a readable attribute, for sink subscription.
    pub fn attr_range(&self, owner: &str, name: &str) -> SimResult<AttrRange> {
        let flags = self.store.flags(owner, name)?;
        if !flags.read {
            return Err(SimError::InvalidArg {
                what: "attribute is not readable",
            });
        }
        Ok(self.store.range(owner, name)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_defaults() {
        let opts = SimOptions::default();
        assert_eq!(opts.dt, 1e-4);
        assert_eq!(opts.threads, 1);
        assert_eq!(opts.solver, SolverType::Mna);
    }

    #[test]
    fn run_before_initialize_is_an_error() {
        let mut sim = Simulation::new("bare", SimOptions::default());
        let err = sim.run(&mut []).unwrap_err();
        assert!(matches!(err, SimError::State { .. }));
        assert_eq!(sim.phase(), Phase::Constructed);
    }

    #[test]
    fn switch_event_to_unknown_topology_is_rejected() {
        let mut sim = Simulation::new("bad-switch", SimOptions::default());
        let n1 = sim.add_node("n1").unwrap();
        sim.add_component(Box::new(vf_components::Resistor::new(
            "r1",
            n1,
            NodeRef::Ground,
            vf_core::units::ohm(1.0),
        )))
        .unwrap();
        sim.schedule_switch(0.5, 3).unwrap();
        let err = sim.initialize().unwrap_err();
        assert!(matches!(err, SimError::TopologyMismatch { .. }));
    }
}
