// ==========================================
// 作业依赖图集成测试
// ==========================================
// 职责: 验证成环拒绝后图不变、执行顺序与就绪作业
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

use berth_maint_scheduler::domain::plan::JobDependency;
use berth_maint_scheduler::domain::types::JobPriority;
use berth_maint_scheduler::engine::{DependencyGraph, EngineError, PriorityScorer};
use std::collections::{BTreeMap, BTreeSet};
use test_helpers::*;

fn edges(graph: &DependencyGraph) -> Vec<JobDependency> {
    graph.edges().cloned().collect()
}

// ==========================================
// 场景: A 依赖 B, 再加 B 依赖 A → CircularDependency, 图不变
// ==========================================
#[test]
fn test_reverse_edge_rejected_and_graph_unchanged() {
    let (a, b) = (10, 20);
    let mut graph = DependencyGraph::new();
    graph.add_dependency(JobDependency::finish_to_start(a, b)).unwrap();
    let before = edges(&graph);

    let err = graph
        .add_dependency(JobDependency::finish_to_start(b, a))
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::CircularDependency {
            job_id: b,
            depends_on_job_id: a
        }
    );
    assert_eq!(edges(&graph), before);
    assert!(graph.has_edge(a, b));
    assert!(!graph.has_edge(b, a));
}

#[test]
fn test_transitive_cycle_self_loop_and_duplicate_rejected() {
    // 1 ← 2 ← 3 ← 4 (4 依赖 3, 3 依赖 2, 2 依赖 1)
    let mut graph = DependencyGraph::new();
    for (job, on) in [(2, 1), (3, 2), (4, 3)] {
        graph.add_dependency(JobDependency::finish_to_start(job, on)).unwrap();
    }
    let before = edges(&graph);

    for (job, on) in [(1, 4), (1, 3), (2, 4)] {
        assert!(graph.would_create_cycle(job, on));
        let err = graph
            .add_dependency(JobDependency::finish_to_start(job, on))
            .unwrap_err();
        assert!(matches!(err, EngineError::CircularDependency { .. }));
    }
    assert!(matches!(
        graph.add_dependency(JobDependency::finish_to_start(5, 5)),
        Err(EngineError::CircularDependency { .. })
    ));
    assert!(matches!(
        graph.add_dependency(JobDependency::finish_to_start(3, 2)),
        Err(EngineError::Validation(_))
    ));
    assert_eq!(edges(&graph), before);

    // 非成环的跨层边可以加入
    graph.add_dependency(JobDependency::finish_to_start(4, 1)).unwrap();
    assert_eq!(graph.edge_count(), 4);
}

#[test]
fn test_execution_order_respects_edges_and_priority() {
    let mut urgent = create_test_job(3, day_id_of(2), 3, 1.0, &[]);
    urgent.priority = JobPriority::Urgent;
    let jobs: BTreeMap<_, _> = vec![
        create_test_job(1, day_id_of(2), 1, 1.0, &[]),
        create_test_job(2, day_id_of(2), 2, 1.0, &[]),
        urgent,
        create_test_job(4, day_id_of(3), 1, 1.0, &[]),
    ]
    .into_iter()
    .map(|j| (j.job_id, j))
    .collect();

    let mut graph = DependencyGraph::new();
    // 3(Urgent) 依赖 2; 4 依赖 1
    graph.add_dependency(JobDependency::finish_to_start(3, 2)).unwrap();
    graph.add_dependency(JobDependency::finish_to_start(4, 1)).unwrap();

    let order = graph
        .execution_order(&jobs, &PriorityScorer::new(), week_start())
        .unwrap();
    let pos = |id| order.iter().position(|x| *x == id).unwrap();
    assert_eq!(order.len(), 4);
    assert!(pos(2) < pos(3));
    assert!(pos(1) < pos(4));
    // 2 解锁后 Urgent 的 3 先于普通作业
    assert_eq!(order, vec![1, 2, 3, 4]);

    let known: BTreeSet<_> = jobs.keys().copied().collect();
    let completed: BTreeSet<_> = [2].into_iter().collect();
    assert_eq!(graph.ready_jobs(&known, &completed), vec![1, 3]);
}
