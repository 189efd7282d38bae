//! The per-step task contract.

use vf_core::attribute::{AttrRange, AttributeStore};

use crate::error::TaskError;

/// Declared dependencies of one task.
///
/// The three sets serve disjoint purposes:
/// - `prev_step_reads`: cells read from the previous committed step. These
///   resolve against the store's previous-step plane and create no
///   intra-step ordering edges.
/// - `this_step_reads`: cells that must be fully produced this step before
///   the task runs; each one orders this task after its writer.
/// - `writes`: cells this task produces. Two tasks may never declare
///   overlapping writes.
#[derive(Debug, Clone, Default)]
pub struct TaskDeps {
    pub prev_step_reads: Vec<AttrRange>,
    pub this_step_reads: Vec<AttrRange>,
    pub writes: Vec<AttrRange>,
}

/// Everything a task may touch while executing.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    /// Simulated time of this step.
    pub time: f64,
    /// Fixed timestep.
    pub dt: f64,
    /// Step counter (0-based).
    pub step: usize,
    pub store: &'a AttributeStore,
}

/// A short, non-suspending unit of per-step work.
///
/// Tasks must not block, perform I/O, or take locks; the scheduler's level
/// barriers are the only synchronization they may rely on.
pub trait StepTask: Send {
    fn label(&self) -> &str;

    fn deps(&self) -> &TaskDeps;

    fn execute(&mut self, ctx: &StepContext<'_>) -> Result<(), TaskError>;
}

/// Closure-backed task, for components whose step work is a few arithmetic
/// operations over captured cell ranges.
pub struct FnTask<F> {
    label: String,
    deps: TaskDeps,
    f: F,
}

impl<F> StepTask for FnTask<F>
where
    F: FnMut(&StepContext<'_>) -> Result<(), TaskError> + Send,
{
    fn label(&self) -> &str {
        &self.label
    }

    fn deps(&self) -> &TaskDeps {
        &self.deps
    }

    fn execute(&mut self, ctx: &StepContext<'_>) -> Result<(), TaskError> {
        (self.f)(ctx)
    }
}

/// Box up a closure as a [`StepTask`].
pub fn fn_task<F>(label: impl Into<String>, deps: TaskDeps, f: F) -> Box<dyn StepTask>
where
    F: FnMut(&StepContext<'_>) -> Result<(), TaskError> + Send + 'static,
{
    Box::new(FnTask {
        label: label.into(),
        deps,
        f,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vf_core::attribute::AccessFlags;

    #[test]
    fn fn_task_executes_closure() {
        let mut store = AttributeStore::new();
        let a = store.register("t", "a", 1, AccessFlags::READ_WRITE).unwrap();

        let mut task = fn_task(
            "write-a",
            TaskDeps {
                writes: vec![a],
                ..Default::default()
            },
            move |ctx| {
                ctx.store.set_scalar(a, 7.0);
                Ok(())
            },
        );

        let ctx = StepContext {
            time: 0.0,
            dt: 1e-3,
            step: 0,
            store: &store,
        };
        task.execute(&ctx).unwrap();
        assert_eq!(store.scalar(a), 7.0);
        assert_eq!(task.label(), "write-a");
    }
}
