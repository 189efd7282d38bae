//! Level-based task execution.
//!
//! The scheduler caches a level partition of the loaded task graph and
//! replays it every step. Levels run in order; tasks inside a level run
//! either sequentially (discovery order) or distributed over a fixed rayon
//! worker pool with a full barrier before the next level starts.

use rayon::prelude::*;

use crate::error::{TaskError, TaskGraphError};
use crate::graph::TaskGraph;
use crate::task::{StepContext, StepTask};

/// How tasks within a level are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePolicy {
    /// One task at a time, in topological-discovery order.
    Sequential,
    /// Each level fanned out over a fixed worker pool.
    LeveledParallel { threads: usize },
}

impl SchedulePolicy {
    /// Pick a policy from a plain thread count.
    pub fn with_threads(threads: usize) -> Self {
        if threads <= 1 {
            SchedulePolicy::Sequential
        } else {
            SchedulePolicy::LeveledParallel { threads }
        }
    }
}

/// Executes a leveled task graph step after step.
///
/// The worker pool is created once at construction; `load` re-levels when
/// the task graph is rebuilt (topology change) and is the only point where
/// the cached partition changes.
pub struct Scheduler {
    policy: SchedulePolicy,
    pool: Option<rayon::ThreadPool>,
    tasks: Vec<Box<dyn StepTask>>,
    /// Sizes of consecutive level slices in `tasks`.
    level_sizes: Vec<usize>,
}

impl Scheduler {
    pub fn new(policy: SchedulePolicy) -> Result<Self, TaskGraphError> {
        let pool = match policy {
            SchedulePolicy::Sequential => None,
            SchedulePolicy::LeveledParallel { threads } => {
                if threads == 0 {
                    return Err(TaskGraphError::WorkerPool {
                        what: "thread count must be >= 1".to_string(),
                    });
                }
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| TaskGraphError::WorkerPool {
                        what: e.to_string(),
                    })?;
                Some(pool)
            }
        };
        Ok(Self {
            policy,
            pool,
            tasks: Vec::new(),
            level_sizes: Vec::new(),
        })
    }

    pub fn policy(&self) -> SchedulePolicy {
        self.policy
    }

    /// Level the graph and cache the partition.
    ///
    /// Tasks are permuted so each level occupies a contiguous slice; the
    /// borrow checker then guarantees level-disjoint mutable access.
    pub fn load(&mut self, graph: TaskGraph) {
        let levels = graph.levels();
        let mut order = Vec::with_capacity(graph.task_count());
        let mut level_sizes = Vec::with_capacity(levels.len());
        for level in &levels {
            level_sizes.push(level.len());
            order.extend_from_slice(level);
        }

        let mut slots: Vec<Option<Box<dyn StepTask>>> =
            graph.into_tasks().into_iter().map(Some).collect();
        let tasks = order
            .into_iter()
            .map(|i| slots[i].take().expect("task indices unique"))
            .collect();

        self.tasks = tasks;
        self.level_sizes = level_sizes;
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn level_count(&self) -> usize {
        self.level_sizes.len()
    }

    /// Execute one full step: all levels, barrier between each.
    pub fn run_step(&mut self, ctx: &StepContext<'_>) -> Result<(), TaskError> {
        let mut rest: &mut [Box<dyn StepTask>] = &mut self.tasks;
        for &size in &self.level_sizes {
            let (level, tail) = rest.split_at_mut(size);
            match &self.pool {
                None => {
                    for task in level {
                        task.execute(ctx)?;
                    }
                }
                Some(pool) => {
                    // try_for_each joins every worker before returning,
                    // which is the inter-level barrier.
                    pool.install(|| level.par_iter_mut().try_for_each(|task| task.execute(ctx)))?;
                }
            }
            rest = tail;
        }
        Ok(())
    }
}
