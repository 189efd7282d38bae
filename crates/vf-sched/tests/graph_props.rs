//! Property tests for task graph construction and leveling.

use proptest::prelude::*;
use vf_core::attribute::AttrRange;
use vf_sched::{fn_task, TaskDeps, TaskGraph, TaskGraphBuilder, TaskGraphError};

fn cell(offset: usize) -> AttrRange {
    AttrRange { offset, len: 1 }
}

/// Build a graph where task i writes cell i and reads a subset of cells
/// produced by earlier tasks. Such declarations are acyclic by
/// construction.
fn build_forward_graph(reads: &[Vec<usize>]) -> Result<TaskGraph, TaskGraphError> {
    let mut builder = TaskGraphBuilder::new();
    for (i, read_set) in reads.iter().enumerate() {
        builder.add_task(fn_task(
            format!("t{i}"),
            TaskDeps {
                this_step_reads: read_set.iter().map(|&j| cell(j)).collect(),
                writes: vec![cell(i)],
                ..Default::default()
            },
            |_| Ok(()),
        ));
    }
    builder.build()
}

/// Strategy: for n tasks, task i reads an arbitrary subset of {0..i}.
fn forward_reads() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (2usize..10).prop_flat_map(|n| {
        let per_task: Vec<_> = (0..n)
            .map(|i| proptest::sample::subsequence((0..i).collect::<Vec<_>>(), 0..=i))
            .collect();
        per_task
    })
}

proptest! {
    #[test]
    fn acyclic_declarations_always_build(reads in forward_reads()) {
        let graph = build_forward_graph(&reads).expect("forward declarations are acyclic");
        prop_assert_eq!(graph.task_count(), reads.len());
    }

    #[test]
    fn levels_respect_every_edge(reads in forward_reads()) {
        let graph = build_forward_graph(&reads).unwrap();
        let levels = graph.levels();

        // level index of each task
        let mut level_of = vec![0usize; graph.task_count()];
        for (li, level) in levels.iter().enumerate() {
            for &t in level {
                level_of[t] = li;
            }
        }

        // every declared read orders the producer strictly earlier
        for (consumer, read_set) in reads.iter().enumerate() {
            for &producer in read_set {
                prop_assert!(
                    level_of[producer] < level_of[consumer],
                    "producer t{} (level {}) must precede consumer t{} (level {})",
                    producer, level_of[producer], consumer, level_of[consumer],
                );
            }
        }
    }

    #[test]
    fn every_task_appears_in_exactly_one_level(reads in forward_reads()) {
        let graph = build_forward_graph(&reads).unwrap();
        let mut seen = vec![0usize; graph.task_count()];
        for level in graph.levels() {
            for t in level {
                seen[t] += 1;
            }
        }
        prop_assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn ring_declarations_always_cycle(n in 2usize..8) {
        // task i reads cell (i+1) % n and writes cell i: one big ring
        let mut builder = TaskGraphBuilder::new();
        for i in 0..n {
            builder.add_task(fn_task(
                format!("t{i}"),
                TaskDeps {
                    this_step_reads: vec![cell((i + 1) % n)],
                    writes: vec![cell(i)],
                    ..Default::default()
                },
                |_| Ok(()),
            ));
        }
        prop_assert!(
            matches!(builder.build(), Err(TaskGraphError::Cycle { .. })),
            "expected a cycle error"
        );
    }
}
