// ==========================================
// PlanningApi 端到端测试
// ==========================================
// 场景: 建计划 → 入池 → 自动排程 → 人工调整 → 冲突检测/处理 → 发布
// 存储: 临时 SQLite 文件
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

use async_trait::async_trait;
use berth_maint_scheduler::api::{ApiError, AutoScheduleRequest, PlanningApi, PlanningPorts};
use berth_maint_scheduler::config::{config_keys, ConfigManager};
use berth_maint_scheduler::domain::conflict::SchedulingConflict;
use berth_maint_scheduler::domain::plan::{Assignment, JobDependency};
use berth_maint_scheduler::domain::types::{
    Berth, ConflictSeverity, ConflictStatus, ConflictType, JobId, PlanId, PlanStatus, WorkerId,
};
use berth_maint_scheduler::engine::Perturbation;
use berth_maint_scheduler::repository::{ConflictStore, RepositoryError, RepositoryResult};
use std::sync::Arc;
use test_helpers::*;

fn lead(worker_id: WorkerId) -> Vec<Assignment> {
    vec![Assignment {
        worker_id,
        is_lead: true,
    }]
}

// ==========================================
// 主流程: 容量冲突阻断发布, 忽略后发布成功
// ==========================================
#[tokio::test]
async fn test_full_week_flow_with_capacity_conflict() {
    let (_temp, config, api) = create_test_api().unwrap();
    config
        .set_global_config_value(config_keys::AUTO_ASSIGN_WORKERS, "false")
        .unwrap();
    let ports = api.ports().clone();

    // 1. 周计划必须从周一开始
    let err = api.create_plan("W10", date(3), at(1, 8)).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
    let plan_id = api.create_plan("W10", week_start(), at(1, 8)).await.unwrap();

    // 2. 人员与待排作业入池
    let w1 = ports
        .workers
        .insert_worker(&create_test_worker(0, &["pm"]))
        .await
        .unwrap();
    let w2 = ports
        .workers
        .insert_worker(&create_test_worker(0, &["pm"]))
        .await
        .unwrap();
    for hours in [4.0, 4.0, 3.0] {
        ports
            .pending
            .insert_pending(&create_test_pending(0, Berth::East, hours))
            .await
            .unwrap();
    }

    // 3. 自动排程: 周一/周二/周三 各一项
    let response = api
        .auto_schedule(&AutoScheduleRequest::new(plan_id, date(2), at(2, 7)))
        .await
        .unwrap();
    assert_eq!(response.committed.len(), 3);
    let dates: Vec<_> = response.result.placements.iter().map(|p| p.date).collect();
    assert_eq!(dates, vec![date(2), date(3), date(4)]);
    assert!(response.conflicts.as_ref().unwrap().open.is_empty());
    assert!(response.conflict_refresh_error.is_none());
    assert!(ports.pending.list_pending(None).await.unwrap().is_empty());

    let job_ids: Vec<JobId> = response.committed.iter().map(|(_, job_id)| *job_id).collect();
    let snapshot = api.snapshot(plan_id).await.unwrap();
    let monday = snapshot.day_by_date(date(2)).unwrap().day_id;

    // 4. 全部交给 w1 并挪到周一: 11h → warning
    for job_id in &job_ids {
        ports.writer.save_assignments(*job_id, &lead(w1)).await.unwrap();
    }
    let moved = api.move_job(job_ids[1], monday).await.unwrap();
    assert_eq!(moved.position, 2);
    let moved = api.move_job(job_ids[2], monday).await.unwrap();
    assert_eq!(moved.position, 3);

    let reconciliation = api.validate_plan(plan_id, at(2, 9)).await.unwrap();
    assert_eq!(reconciliation.open.len(), 1);
    assert_eq!(reconciliation.open[0].conflict_type, ConflictType::Capacity);
    assert_eq!(reconciliation.open[0].severity, ConflictSeverity::Warning);

    // 5. 再追加 2h 并限定周一: 软溢出, w1 达 13h → error
    ports
        .pending
        .insert_pending(&create_test_pending(0, Berth::East, 2.0))
        .await
        .unwrap();
    let mut request = AutoScheduleRequest::new(plan_id, date(2), at(2, 10));
    request.horizon_from = Some(date(2));
    request.horizon_to = Some(date(2));
    let response = api.auto_schedule(&request).await.unwrap();
    assert_eq!(response.result.overflow_count, 1);
    let extra_job = response.committed[0].1;
    ports.writer.save_assignments(extra_job, &lead(w1)).await.unwrap();

    let reconciliation = api.validate_plan(plan_id, at(2, 11)).await.unwrap();
    assert_eq!(reconciliation.open.len(), 1);
    assert_eq!(reconciliation.open[0].severity, ConflictSeverity::Error);
    assert_eq!(reconciliation.blocking_count(), 1);

    let err = api.publish_plan(plan_id, at(2, 12)).await.unwrap_err();
    assert!(matches!(err, ApiError::PublishBlocked { count: 1 }));

    // 6. 解决后条件仍存在: 发布时重新检测, 生成新的 OPEN 记录
    // 发布前的重新检测已替换 OPEN 集合, 需重新读取
    let first_id = api
        .list_conflicts(plan_id)
        .await
        .unwrap()
        .into_iter()
        .find(|c| c.is_blocking())
        .map(|c| c.conflict_id)
        .unwrap();
    assert_ne!(first_id, reconciliation.open[0].conflict_id);
    let resolved = api
        .resolve_conflict(&first_id, "overtime approved", "supervisor", at(2, 12))
        .await
        .unwrap();
    assert_eq!(resolved.status, ConflictStatus::Resolved);
    assert!(api
        .resolve_conflict(&first_id, "again", "supervisor", at(2, 12))
        .await
        .is_err());

    let err = api.publish_plan(plan_id, at(2, 13)).await.unwrap_err();
    assert!(matches!(err, ApiError::PublishBlocked { count: 1 }));

    let conflicts = api.list_conflicts(plan_id).await.unwrap();
    let history = conflicts.iter().find(|c| c.conflict_id == first_id).unwrap();
    assert_eq!(history.status, ConflictStatus::Resolved);
    assert_eq!(history.resolution_note.as_deref(), Some("overtime approved"));
    let reraised: Vec<_> = conflicts.iter().filter(|c| c.is_blocking()).collect();
    assert_eq!(reraised.len(), 1);

    // 7. 忽略后相同条件被抑制, 可以发布
    let reraised_id = reraised[0].conflict_id.clone();
    api.ignore_conflict(&reraised_id, Some("supervisor"), at(2, 14))
        .await
        .unwrap();
    let plan = api.publish_plan(plan_id, at(2, 15)).await.unwrap();
    assert_eq!(plan.status, PlanStatus::Published);
    assert_eq!(plan.published_at, Some(at(2, 15)));

    // 8. 已发布: 不可再排程/移动, 但可模拟与分析
    let err = api
        .auto_schedule(&AutoScheduleRequest::new(plan_id, date(2), at(2, 16)))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::PlanReadOnly(_)));
    let err = api.move_job(job_ids[0], monday + 1).await.unwrap_err();
    assert!(matches!(err, ApiError::PlanReadOnly(_)));

    let scenario = api
        .simulate(plan_id, &Perturbation::WorkerAbsence { worker_id: w1 }, date(2))
        .await
        .unwrap();
    // w2 接替前三项后达 11h, 第四项 (2h) 将超出 12h 绝对上限
    assert_eq!(scenario.affected_jobs.len(), 4);
    for affected in &scenario.affected_jobs[..3] {
        assert_eq!(affected.replacements[0].worker_id, w2);
    }
    assert!(scenario.affected_jobs[3].replacements.is_empty());
    assert!(scenario.affected_jobs[3].note.is_some());
    assert!(!scenario.feasible);

    let report = api.critical_path(plan_id, date(2)).await.unwrap();
    assert!(report.critical.is_empty());
    assert_eq!(report.slack.len(), 4);
}

// ==========================================
// 依赖 / 改派 / 删除
// ==========================================
#[tokio::test]
async fn test_dependency_reassignment_and_delete() {
    let (_temp, config, api) = create_test_api().unwrap();
    config
        .set_global_config_value(config_keys::AUTO_ASSIGN_WORKERS, "false")
        .unwrap();
    let ports = api.ports().clone();

    let plan_id = api.create_plan("W10", week_start(), at(1, 8)).await.unwrap();
    let w1 = ports
        .workers
        .insert_worker(&create_test_worker(0, &["pm"]))
        .await
        .unwrap();
    let w2 = ports
        .workers
        .insert_worker(&create_test_worker(0, &["pm"]))
        .await
        .unwrap();
    for hours in [2.0, 3.0, 1.0] {
        ports
            .pending
            .insert_pending(&create_test_pending(0, Berth::West, hours))
            .await
            .unwrap();
    }
    let response = api
        .auto_schedule(&AutoScheduleRequest::new(plan_id, date(2), at(2, 7)))
        .await
        .unwrap();
    let ids: Vec<JobId> = response.committed.iter().map(|(_, id)| *id).collect();
    let (a, b, c) = (ids[0], ids[1], ids[2]);

    // 依赖: b 依赖 a; 反向成环; 重复边
    api.add_dependency(JobDependency::finish_to_start(b, a))
        .await
        .unwrap();
    let err = api
        .add_dependency(JobDependency::finish_to_start(a, b))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::CircularDependency {
            job_id,
            depends_on_job_id
        } if job_id == a && depends_on_job_id == b
    ));
    let err = api
        .add_dependency(JobDependency::finish_to_start(b, a))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
    assert_eq!(api.snapshot(plan_id).await.unwrap().dependencies.len(), 1);

    // 跨计划依赖被拒绝
    let other_plan = api.create_plan("W11", date(9), at(1, 8)).await.unwrap();
    ports
        .pending
        .insert_pending(&create_test_pending(0, Berth::West, 1.0))
        .await
        .unwrap();
    let other = api
        .auto_schedule(&AutoScheduleRequest::new(other_plan, date(9), at(2, 7)))
        .await
        .unwrap();
    let foreign = other.committed[0].1;
    let err = api
        .add_dependency(JobDependency::finish_to_start(c, foreign))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    // 改派: 保留负责人标记
    ports.writer.save_assignments(c, &lead(w1)).await.unwrap();
    api.apply_reassignment(c, w1, w2).await.unwrap();
    let snapshot = api.snapshot(plan_id).await.unwrap();
    let job = snapshot.job(c).unwrap();
    assert!(!job.is_assigned_to(w1));
    assert_eq!(job.lead_worker(), Some(w2));
    let err = api.apply_reassignment(c, w1, w2).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
    let err = api.apply_reassignment(c, w2, 9999).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    // 删除 a: 依赖边一并清理
    api.delete_job(a).await.unwrap();
    let snapshot = api.snapshot(plan_id).await.unwrap();
    assert_eq!(snapshot.jobs.len(), 2);
    assert!(snapshot.dependencies.is_empty());
    assert!(!api.remove_dependency(b, a).await.unwrap());
    let err = api.delete_job(a).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

// ==========================================
// 预览不落库 / 同一计划并发排程串行化
// ==========================================
#[tokio::test]
async fn test_preview_and_concurrent_auto_schedule() {
    let (_temp, _config, api) = create_test_api().unwrap();
    let ports = api.ports().clone();
    let plan_id = api.create_plan("W10", week_start(), at(1, 8)).await.unwrap();
    for hours in [4.0, 4.0, 4.0] {
        ports
            .pending
            .insert_pending(&create_test_pending(0, Berth::East, hours))
            .await
            .unwrap();
    }

    let preview = api.preview_week(plan_id, date(2), at(2, 7)).await.unwrap();
    assert_eq!(preview.schedule.placements.len(), 3);
    assert_eq!(preview.provisional_ids.len(), 3);
    assert_eq!(preview.projected.jobs.len(), 3);
    assert!(api.snapshot(plan_id).await.unwrap().jobs.is_empty());
    assert_eq!(ports.pending.list_pending(None).await.unwrap().len(), 3);

    let request = AutoScheduleRequest::new(plan_id, date(2), at(2, 8));
    let (first, second) = tokio::join!(api.auto_schedule(&request), api.auto_schedule(&request));
    let committed = first.unwrap().committed.len() + second.unwrap().committed.len();
    assert_eq!(committed, 3);
    assert_eq!(api.snapshot(plan_id).await.unwrap().jobs.len(), 3);
    assert!(ports.pending.list_pending(None).await.unwrap().is_empty());
}

// ==========================================
// 冲突重检失败: 落位已提交, 失败原因随响应返回
// ==========================================

/// 写入 OPEN 集合总是失败的冲突存储
struct FailingConflictStore {
    inner: Arc<dyn ConflictStore>,
}

#[async_trait]
impl ConflictStore for FailingConflictStore {
    async fn list_for_plan(&self, plan_id: PlanId) -> RepositoryResult<Vec<SchedulingConflict>> {
        self.inner.list_for_plan(plan_id).await
    }

    async fn get_conflict(&self, conflict_id: &str) -> RepositoryResult<SchedulingConflict> {
        self.inner.get_conflict(conflict_id).await
    }

    async fn replace_open(
        &self,
        _plan_id: PlanId,
        _open: &[SchedulingConflict],
    ) -> RepositoryResult<usize> {
        Err(RepositoryError::LockError("conflict table busy".to_string()))
    }

    async fn update_status(&self, conflict: &SchedulingConflict) -> RepositoryResult<()> {
        self.inner.update_status(conflict).await
    }
}

#[tokio::test]
async fn test_auto_schedule_keeps_commit_when_conflict_refresh_fails() {
    let (_temp, conn) = create_test_db().unwrap();
    let mut ports = PlanningPorts::sqlite(conn.clone()).unwrap();
    ports.conflicts = Arc::new(FailingConflictStore {
        inner: ports.conflicts.clone(),
    });
    let config = Arc::new(ConfigManager::from_connection(conn).unwrap());
    config
        .set_global_config_value(config_keys::AUTO_ASSIGN_WORKERS, "false")
        .unwrap();
    let api = PlanningApi::new(ports.clone(), config);

    let plan_id = api.create_plan("W10", week_start(), at(1, 8)).await.unwrap();
    for hours in [3.0, 2.0] {
        ports
            .pending
            .insert_pending(&create_test_pending(0, Berth::East, hours))
            .await
            .unwrap();
    }

    let response = api
        .auto_schedule(&AutoScheduleRequest::new(plan_id, date(2), at(2, 7)))
        .await
        .unwrap();
    assert_eq!(response.committed.len(), 2);
    assert!(response.conflicts.is_none());
    let reason = response.conflict_refresh_error.unwrap();
    assert!(reason.contains("conflict table busy"));

    // 落位与待排消费均已落库
    assert_eq!(api.snapshot(plan_id).await.unwrap().jobs.len(), 2);
    assert!(ports.pending.list_pending(None).await.unwrap().is_empty());
}
