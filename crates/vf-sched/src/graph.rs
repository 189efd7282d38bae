//! Task graph construction.
//!
//! The graph is an arena of task nodes with index-based edges: an edge
//! `A -> B` exists iff some cell in `B.this_step_reads` overlaps a cell in
//! `A.writes`. The builder rejects self-dependencies, duplicate writers
//! and cycles before any task runs.

use crate::error::TaskGraphError;
use crate::task::StepTask;

/// Immutable DAG over one step's tasks.
pub struct TaskGraph {
    tasks: Vec<Box<dyn StepTask>>,
    /// Adjacency: edges[u] lists every v with an edge u -> v.
    edges: Vec<Vec<usize>>,
    in_degree: Vec<usize>,
}

impl TaskGraph {
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn edges(&self) -> &[Vec<usize>] {
        &self.edges
    }

    pub fn in_degree(&self) -> &[usize] {
        &self.in_degree
    }

    /// Partition tasks into levels via Kahn's algorithm.
    ///
    /// Tasks within a level have no edges between them; level k+1 tasks
    /// only depend on tasks of levels <= k. Within a level, tasks are in
    /// ascending insertion order, which is also the sequential execution
    /// order.
    pub fn levels(&self) -> Vec<Vec<usize>> {
        let n = self.tasks.len();
        let mut indeg = self.in_degree.clone();
        let mut current: Vec<usize> = (0..n).filter(|&i| indeg[i] == 0).collect();
        let mut levels = Vec::new();

        while !current.is_empty() {
            let mut next = Vec::new();
            for &u in &current {
                for &v in &self.edges[u] {
                    indeg[v] -= 1;
                    if indeg[v] == 0 {
                        next.push(v);
                    }
                }
            }
            next.sort_unstable();
            levels.push(std::mem::replace(&mut current, next));
        }

        levels
    }

    pub(crate) fn into_tasks(self) -> Vec<Box<dyn StepTask>> {
        self.tasks
    }

    pub fn task_label(&self, i: usize) -> &str {
        self.tasks[i].label()
    }
}

/// Builder collecting tasks, then validating them into a [`TaskGraph`].
#[derive(Default)]
pub struct TaskGraphBuilder {
    tasks: Vec<Box<dyn StepTask>>,
}

impl TaskGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_task(&mut self, task: Box<dyn StepTask>) {
        self.tasks.push(task);
    }

    pub fn add_tasks(&mut self, tasks: impl IntoIterator<Item = Box<dyn StepTask>>) {
        self.tasks.extend(tasks);
    }

    /// Validate declarations, derive edges and check acyclicity.
    pub fn build(self) -> Result<TaskGraph, TaskGraphError> {
        let n = self.tasks.len();

        // A task must not read its own output within the same step.
        for task in &self.tasks {
            let deps = task.deps();
            for &w in &deps.writes {
                if deps.this_step_reads.iter().any(|r| r.overlaps(w)) {
                    return Err(TaskGraphError::SelfDependency {
                        task: task.label().to_string(),
                    });
                }
            }
        }

        // Each cell has at most one writer per step.
        for i in 0..n {
            for j in (i + 1)..n {
                let wi = &self.tasks[i].deps().writes;
                let wj = &self.tasks[j].deps().writes;
                if wi.iter().any(|a| wj.iter().any(|b| a.overlaps(*b))) {
                    return Err(TaskGraphError::DuplicateWriter {
                        first: self.tasks[i].label().to_string(),
                        second: self.tasks[j].label().to_string(),
                    });
                }
            }
        }

        // Edge u -> v iff v reads (this step) something u writes.
        let mut edges = vec![Vec::new(); n];
        let mut in_degree = vec![0usize; n];
        for u in 0..n {
            for v in 0..n {
                if u == v {
                    continue;
                }
                let writes = &self.tasks[u].deps().writes;
                let reads = &self.tasks[v].deps().this_step_reads;
                if reads.iter().any(|r| writes.iter().any(|w| r.overlaps(*w))) {
                    edges[u].push(v);
                    in_degree[v] += 1;
                }
            }
        }

        let graph = TaskGraph {
            tasks: self.tasks,
            edges,
            in_degree,
        };

        // Acyclicity: every task must appear in some level.
        let leveled: usize = graph.levels().iter().map(Vec::len).sum();
        if leveled != n {
            let mut indeg = graph.in_degree.clone();
            let mut queue: Vec<usize> = (0..n).filter(|&i| indeg[i] == 0).collect();
            while let Some(u) = queue.pop() {
                for &v in &graph.edges[u] {
                    indeg[v] -= 1;
                    if indeg[v] == 0 {
                        queue.push(v);
                    }
                }
            }
            let stuck = (0..n).find(|&i| indeg[i] > 0).unwrap_or(0);
            return Err(TaskGraphError::Cycle {
                task: graph.tasks[stuck].label().to_string(),
            });
        }

        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{fn_task, TaskDeps};
    use vf_core::attribute::AttrRange;

    fn r(offset: usize) -> AttrRange {
        AttrRange { offset, len: 1 }
    }

    fn noop(label: &str, deps: TaskDeps) -> Box<dyn StepTask> {
        fn_task(label, deps, |_| Ok(()))
    }

    #[test]
    fn chain_levels_in_order() {
        let mut builder = TaskGraphBuilder::new();
        builder.add_task(noop(
            "a",
            TaskDeps {
                writes: vec![r(0)],
                ..Default::default()
            },
        ));
        builder.add_task(noop(
            "b",
            TaskDeps {
                this_step_reads: vec![r(0)],
                writes: vec![r(1)],
                ..Default::default()
            },
        ));
        builder.add_task(noop(
            "c",
            TaskDeps {
                this_step_reads: vec![r(1)],
                writes: vec![r(2)],
                ..Default::default()
            },
        ));

        let graph = builder.build().unwrap();
        let levels = graph.levels();
        assert_eq!(levels, vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn independent_tasks_share_a_level() {
        let mut builder = TaskGraphBuilder::new();
        builder.add_task(noop(
            "a",
            TaskDeps {
                writes: vec![r(0)],
                ..Default::default()
            },
        ));
        builder.add_task(noop(
            "b",
            TaskDeps {
                writes: vec![r(1)],
                ..Default::default()
            },
        ));

        let graph = builder.build().unwrap();
        assert_eq!(graph.levels(), vec![vec![0, 1]]);
    }

    #[test]
    fn prev_step_reads_create_no_edges() {
        let mut builder = TaskGraphBuilder::new();
        builder.add_task(noop(
            "reader",
            TaskDeps {
                prev_step_reads: vec![r(0)],
                writes: vec![r(1)],
                ..Default::default()
            },
        ));
        builder.add_task(noop(
            "writer",
            TaskDeps {
                writes: vec![r(0)],
                ..Default::default()
            },
        ));

        let graph = builder.build().unwrap();
        assert_eq!(graph.levels(), vec![vec![0, 1]]);
    }

    #[test]
    fn self_dependency_rejected() {
        let mut builder = TaskGraphBuilder::new();
        builder.add_task(noop(
            "selfish",
            TaskDeps {
                this_step_reads: vec![r(0)],
                writes: vec![r(0)],
                ..Default::default()
            },
        ));
        assert!(matches!(
            builder.build(),
            Err(TaskGraphError::SelfDependency { .. })
        ));
    }

    #[test]
    fn duplicate_writers_rejected() {
        let mut builder = TaskGraphBuilder::new();
        for label in ["a", "b"] {
            builder.add_task(noop(
                label,
                TaskDeps {
                    writes: vec![r(0)],
                    ..Default::default()
                },
            ));
        }
        assert!(matches!(
            builder.build(),
            Err(TaskGraphError::DuplicateWriter { .. })
        ));
    }

    #[test]
    fn cycle_rejected() {
        let mut builder = TaskGraphBuilder::new();
        builder.add_task(noop(
            "a",
            TaskDeps {
                this_step_reads: vec![r(1)],
                writes: vec![r(0)],
                ..Default::default()
            },
        ));
        builder.add_task(noop(
            "b",
            TaskDeps {
                this_step_reads: vec![r(0)],
                writes: vec![r(1)],
                ..Default::default()
            },
        ));
        assert!(matches!(builder.build(), Err(TaskGraphError::Cycle { .. })));
    }
}
