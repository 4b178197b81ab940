// ==========================================
// 冲突检测引擎集成测试
// ==========================================
// 职责: 验证容量阈值、发布阻断、重复检测幂等与历史保留
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

use berth_maint_scheduler::domain::conflict::{ConflictFingerprint, SchedulingConflict};
use berth_maint_scheduler::domain::error::DomainError;
use berth_maint_scheduler::domain::types::{
    ConflictSeverity, ConflictStatus, ConflictType, JobPriority, Overdue,
};
use berth_maint_scheduler::engine::{ConflictDetector, ConflictThresholds};
use test_helpers::*;

fn detector() -> ConflictDetector {
    ConflictDetector::new(ConflictThresholds::default())
}

fn fingerprints(conflicts: &[SchedulingConflict]) -> Vec<ConflictFingerprint> {
    let mut fps: Vec<_> = conflicts.iter().map(|c| c.fingerprint()).collect();
    fps.sort();
    fps
}

// ==========================================
// 场景: 人员单日 11h → 1 条 warning; 13h → error 且阻断发布
// ==========================================
#[test]
fn test_worker_day_capacity_warning_then_error_blocks_publish() {
    let roster = create_test_roster(vec![create_test_worker(7, &["pm"])]);

    let snapshot = with_jobs(
        create_test_snapshot(1),
        vec![
            create_test_job(1, day_id_of(2), 1, 6.0, &[7]),
            create_test_job(2, day_id_of(2), 2, 5.0, &[7]),
        ],
    );
    let open = detector().validate(&snapshot, &roster, &[], at(2, 7)).open;
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].conflict_type, ConflictType::Capacity);
    assert_eq!(open[0].severity, ConflictSeverity::Warning);
    assert_eq!(open[0].worker_ids, vec![7]);
    assert_eq!(open[0].job_ids, vec![1, 2]);

    // warning 不阻断发布
    let mut plan = snapshot.plan.clone();
    plan.publish(&open, at(2, 8)).unwrap();

    let snapshot = with_jobs(
        create_test_snapshot(1),
        vec![
            create_test_job(1, day_id_of(2), 1, 6.0, &[7]),
            create_test_job(2, day_id_of(2), 2, 7.0, &[7]),
        ],
    );
    let result = detector().validate(&snapshot, &roster, &[], at(2, 7));
    assert_eq!(result.open.len(), 1);
    assert_eq!(result.open[0].severity, ConflictSeverity::Error);
    assert_eq!(result.blocking_count(), 1);

    let mut plan = snapshot.plan.clone();
    let err = plan.publish(&result.open, at(2, 8)).unwrap_err();
    assert!(matches!(err, DomainError::PublishBlocked { count: 1 }));
    assert!(!plan.is_published());
}

// ==========================================
// 其余检查项
// ==========================================
#[test]
fn test_sla_equipment_and_tail_checks() {
    let roster = create_test_roster(vec![create_test_worker(1, &[])]);

    let mut overdue = create_test_job(1, day_id_of(3), 1, 2.0, &[1]);
    overdue.overdue = Some(Overdue::days(9.0));
    let mut tail = create_test_job(2, day_id_of(7), 1, 2.0, &[]);
    tail.priority = JobPriority::High;
    let mut jobs = vec![overdue, tail];
    for (idx, id) in (3..=5).enumerate() {
        let mut job = create_test_job(id, day_id_of(4), idx as i32 + 1, 1.0, &[]);
        job.equipment_id = Some("CRANE-2".to_string());
        jobs.push(job);
    }
    let snapshot = with_jobs(create_test_snapshot(1), jobs);

    let open = detector().validate(&snapshot, &roster, &[], at(2, 7)).open;

    let sla: Vec<_> = open
        .iter()
        .filter(|c| c.conflict_type == ConflictType::Sla)
        .collect();
    assert_eq!(sla.len(), 2);
    assert!(sla
        .iter()
        .any(|c| c.job_ids == vec![1] && c.severity == ConflictSeverity::Error));
    assert!(sla
        .iter()
        .any(|c| c.job_ids == vec![2] && c.severity == ConflictSeverity::Warning));

    let overlap: Vec<_> = open
        .iter()
        .filter(|c| c.conflict_type == ConflictType::EquipmentOverlap)
        .collect();
    assert_eq!(overlap.len(), 1);
    assert_eq!(overlap[0].severity, ConflictSeverity::Info);
    assert!(!overlap[0].is_blocking());
}

// ==========================================
// 幂等: 无状态变化时 OPEN 集合不变; 终态记录不被重复或删除
// ==========================================
#[test]
fn test_revalidation_is_idempotent_and_keeps_history() {
    let roster = create_test_roster(vec![create_test_worker(7, &[]), create_test_worker(8, &[])]);
    let mut overdue = create_test_job(4, day_id_of(3), 1, 1.0, &[8]);
    overdue.overdue = Some(Overdue::hours(20.0));
    let snapshot = with_jobs(
        create_test_snapshot(1),
        vec![
            create_test_job(1, day_id_of(2), 1, 6.0, &[7]),
            create_test_job(2, day_id_of(2), 2, 7.0, &[7]),
            create_test_job(3, day_id_of(3), 2, 11.0, &[8]),
            overdue,
        ],
    );

    let first = detector().validate(&snapshot, &roster, &[], at(2, 7));
    assert_eq!(first.open.len(), 3);
    assert!(first.superseded_ids.is_empty());

    // 无状态变化: 指纹集合一致, 旧 OPEN 全部被替换
    let second = detector().validate(&snapshot, &roster, &first.open, at(2, 9));
    assert_eq!(fingerprints(&second.open), fingerprints(&first.open));
    let mut superseded = second.superseded_ids.clone();
    superseded.sort();
    let mut first_ids: Vec<_> = first.open.iter().map(|c| c.conflict_id.clone()).collect();
    first_ids.sort();
    assert_eq!(superseded, first_ids);

    // 处理其中两条后再检测
    let mut stored = second.open.clone();
    let error_idx = stored
        .iter()
        .position(|c| {
            c.severity == ConflictSeverity::Error && c.conflict_type == ConflictType::Capacity
        })
        .unwrap();
    stored[error_idx]
        .resolve("split across crew", "supervisor", at(2, 10))
        .unwrap();
    let sla_idx = stored
        .iter()
        .position(|c| c.conflict_type == ConflictType::Sla)
        .unwrap();
    stored[sla_idx].ignore(Some("supervisor"), at(2, 10)).unwrap();
    let resolved_id = stored[error_idx].conflict_id.clone();
    let ignored_id = stored[sla_idx].conflict_id.clone();

    let third = detector().validate(&snapshot, &roster, &stored, at(2, 11));
    // 终态记录不在替换范围内
    assert!(!third.superseded_ids.contains(&resolved_id));
    assert!(!third.superseded_ids.contains(&ignored_id));
    assert_eq!(third.superseded_ids.len(), 1);
    // 忽略的条件被抑制; 已解决但仍存在的条件以新记录重新出现
    assert_eq!(third.suppressed, 1);
    assert_eq!(third.open.len(), 2);
    assert!(third
        .open
        .iter()
        .all(|c| c.conflict_type != ConflictType::Sla));
    let reraised = third
        .open
        .iter()
        .find(|c| c.fingerprint() == stored[error_idx].fingerprint())
        .unwrap();
    assert_ne!(reraised.conflict_id, resolved_id);
    assert_eq!(reraised.status, ConflictStatus::Open);

    // 终态不可再转换
    assert!(stored[error_idx].ignore(None, at(2, 12)).is_err());
}
