//! vf-sched: dependency-driven step execution for voltflow.
//!
//! Every simulation step is a fixed set of small tasks, each declaring
//! which attribute cells it reads (from this step or the previous one) and
//! which it writes. From those declarations this crate builds a DAG,
//! partitions it into levels, and executes the levels either sequentially
//! or across a fixed worker pool with a barrier between levels.
//!
//! Disjoint write sets are the correctness invariant: within a level no
//! two tasks touch the same cells, so execution order inside a level never
//! changes the outcome.

pub mod error;
pub mod graph;
pub mod schedule;
pub mod task;

// Re-exports for ergonomics
pub use error::{TaskError, TaskGraphError};
pub use graph::{TaskGraph, TaskGraphBuilder};
pub use schedule::{SchedulePolicy, Scheduler};
pub use task::{fn_task, StepContext, StepTask, TaskDeps};
