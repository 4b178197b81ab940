// ==========================================
// 泊位维修周计划排程系统 - 引擎编排器
// ==========================================
// 用途: 协调排程流水线的执行顺序
// 流程: 自动排程 → 负载均衡 → 冲突检测 → 关键路径
// 红线: 只在快照副本上投影, 不产生任何持久化副作用
// ==========================================

use crate::config::{load_settings, EngineSettings, SchedulingConfigReader};
use crate::domain::conflict::SchedulingConflict;
use crate::domain::pending::PendingJob;
use crate::domain::plan::PlanSnapshot;
use crate::domain::types::{JobId, PendingJobId};
use crate::domain::worker::WorkerRoster;
use crate::engine::auto_scheduler::{
    AutoScheduleParams, AutoScheduleResult, AutoScheduler, JobPlacement, WorkerContext,
};
use crate::engine::balancer::{BalanceResult, WorkloadBalancer};
use crate::engine::capacity_model::CapacityModel;
use crate::engine::conflict_detector::{ConflictDetector, ConflictReconciliation};
use crate::engine::critical_path::{CriticalPathAnalyzer, CriticalPathReport};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, info};

// ==========================================
// WeeklyPlanRequest - 流水线输入
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct WeeklyPlanRequest<'a> {
    pub snapshot: &'a PlanSnapshot,
    pub pool: &'a [PendingJob],
    pub roster: &'a WorkerRoster,
    pub capacity: &'a CapacityModel,
    pub existing_conflicts: &'a [SchedulingConflict],
    pub today: NaiveDate,
    pub now: NaiveDateTime,
}

// ==========================================
// WeeklyPlanResult - 流水线结果
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct WeeklyPlanResult {
    pub settings: EngineSettings,
    pub schedule: AutoScheduleResult,
    /// 投影后的计划快照（新作业使用临时 id）
    pub projected: PlanSnapshot,
    /// 临时 job_id → 来源待排作业
    pub provisional_ids: BTreeMap<JobId, PendingJobId>,
    pub balance: BalanceResult,
    pub conflicts: ConflictReconciliation,
    pub critical_path: CriticalPathReport,
}

/// 将落位结果投影到快照副本
///
/// 临时 id 从 `max_job_id + 1` 起按落位顺序分配
///
/// # 返回
/// (投影快照, 临时 id → pending_id)
pub fn project_placements(
    snapshot: &PlanSnapshot,
    placements: &[JobPlacement],
) -> (PlanSnapshot, BTreeMap<JobId, PendingJobId>) {
    let mut projected = snapshot.clone();
    let mut provisional = BTreeMap::new();
    let mut next_id = snapshot.max_job_id() + 1;
    for placement in placements {
        let job = placement.job.clone().into_job(next_id);
        projected.jobs.insert(next_id, job);
        provisional.insert(next_id, placement.pending_id);
        next_id += 1;
    }
    (projected, provisional)
}

// ==========================================
// ScheduleOrchestrator - 引擎编排器
// ==========================================

pub struct ScheduleOrchestrator<C>
where
    C: SchedulingConfigReader,
{
    config: Arc<C>,
    scheduler: AutoScheduler,
    balancer: WorkloadBalancer,
    analyzer: CriticalPathAnalyzer,
}

impl<C> ScheduleOrchestrator<C>
where
    C: SchedulingConfigReader,
{
    /// 创建新的编排器实例
    ///
    /// # 参数
    /// - config: 配置读取器
    pub fn new(config: Arc<C>) -> Self {
        Self {
            scheduler: AutoScheduler::new(),
            balancer: WorkloadBalancer::new(),
            analyzer: CriticalPathAnalyzer::new(),
            config,
        }
    }

    /// 读取当前引擎参数
    pub async fn settings(&self) -> Result<EngineSettings, Box<dyn Error + Send + Sync>> {
        load_settings(self.config.as_ref()).await
    }

    /// 由引擎参数构造自动排程参数
    pub fn schedule_params(settings: &EngineSettings, today: NaiveDate) -> AutoScheduleParams {
        let mut params = AutoScheduleParams::new(today);
        params.ceiling_hours = settings.day_ceiling_hours;
        params.include_weekends = settings.include_weekends;
        params.assign_workers = settings.auto_assign_workers;
        params
    }

    /// 执行完整周计划流水线（只读预览）
    ///
    /// # 参数
    /// - request: 快照、待排池、人员名册、产能配置、已有冲突
    ///
    /// # 返回
    /// 排程结果 + 投影快照上的均衡建议、冲突对账、关键路径
    pub async fn plan_week(
        &self,
        request: WeeklyPlanRequest<'_>,
    ) -> Result<WeeklyPlanResult, Box<dyn Error + Send + Sync>> {
        info!(
            plan_id = request.snapshot.plan_id(),
            pool = request.pool.len(),
            workers = request.roster.workers.len(),
            existing_conflicts = request.existing_conflicts.len(),
            "开始执行周计划流水线"
        );

        let settings = self.settings().await?;

        // ==========================================
        // 步骤1: 自动排程 - 日期落位 + 人员匹配
        // ==========================================
        debug!("步骤1: 执行自动排程");
        let params = Self::schedule_params(&settings, request.today);
        let workers = WorkerContext {
            roster: request.roster,
            capacity: request.capacity,
        };
        let schedule = self
            .scheduler
            .schedule(request.snapshot, request.pool, &params, Some(workers))?;

        // ==========================================
        // 步骤2: 投影 - 在快照副本上生成新作业
        // ==========================================
        debug!(placements = schedule.placements.len(), "步骤2: 投影落位结果");
        let (projected, provisional_ids) =
            project_placements(request.snapshot, &schedule.placements);

        // ==========================================
        // 步骤3: 负载均衡 - 生成调整建议
        // ==========================================
        debug!("步骤3: 执行负载均衡");
        let balance = self.balancer.balance(&projected, request.roster);

        // ==========================================
        // 步骤4: 冲突检测 - 与已有冲突对账
        // ==========================================
        debug!("步骤4: 执行冲突检测");
        let detector = ConflictDetector::new(settings.conflict_thresholds());
        let conflicts = detector.validate(
            &projected,
            request.roster,
            request.existing_conflicts,
            request.now,
        );

        // ==========================================
        // 步骤5: 关键路径分析
        // ==========================================
        debug!("步骤5: 执行关键路径分析");
        let critical_path = self.analyzer.analyze(&projected, request.today);

        info!(
            placed = schedule.placements.len(),
            skipped = schedule.skipped.len(),
            overflow = schedule.overflow_count,
            moves = balance.moves.len(),
            open_conflicts = conflicts.open.len(),
            blocking = conflicts.blocking_count(),
            critical = critical_path.critical.len(),
            "周计划流水线完成"
        );

        Ok(WeeklyPlanResult {
            settings,
            schedule,
            projected,
            provisional_ids,
            balance,
            conflicts,
            critical_path,
        })
    }
}
