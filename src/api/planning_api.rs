// ==========================================
// 泊位维修周计划排程系统 - 周计划排程 API
// ==========================================
// 职责: 加载快照 → 调用引擎 → 原子提交变更
// 并发: 同一计划的写操作经由计划级互斥锁串行化, 不同计划互不阻塞
// 红线: 引擎报错时不提交任何变更
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{EngineSettings, SchedulingConfigReader};
use crate::db::init_schema;
use crate::domain::conflict::SchedulingConflict;
use crate::domain::plan::{JobDependency, Plan, PlanSnapshot};
use crate::domain::types::{Berth, DayId, JobId, PendingJobId, PlanId, WorkerId};
use crate::domain::worker::WorkerRoster;
use crate::engine::auto_scheduler::{AutoScheduleResult, AutoScheduler, WorkerContext};
use crate::engine::balancer::{BalanceResult, WorkloadBalancer};
use crate::engine::capacity_model::CapacityModel;
use crate::engine::conflict_detector::{ConflictDetector, ConflictReconciliation};
use crate::engine::critical_path::{CriticalPathAnalyzer, CriticalPathReport};
use crate::engine::dependency_graph::DependencyGraph;
use crate::engine::orchestrator::{ScheduleOrchestrator, WeeklyPlanRequest, WeeklyPlanResult};
use crate::engine::scenario::{Perturbation, ScenarioContext, ScenarioResult, ScenarioSimulator};
use crate::repository::{
    CapacityConfigRepository, CapacityConfigStore, ConflictRepository, ConflictStore,
    PendingJobPool, PendingJobRepository, PlanRepository, PlanSnapshotReader, PlanWriter,
    WorkerDirectory, WorkerRepository,
};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, instrument, warn};

// ==========================================
// PlanningPorts - 存储端口集合
// ==========================================
#[derive(Clone)]
pub struct PlanningPorts {
    pub plans: Arc<dyn PlanSnapshotReader>,
    pub writer: Arc<dyn PlanWriter>,
    pub workers: Arc<dyn WorkerDirectory>,
    pub capacity: Arc<dyn CapacityConfigStore>,
    pub pending: Arc<dyn PendingJobPool>,
    pub conflicts: Arc<dyn ConflictStore>,
}

impl PlanningPorts {
    /// 基于同一 SQLite 连接构建全部端口（并初始化表结构）
    pub fn sqlite(conn: Arc<Mutex<Connection>>) -> ApiResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
            init_schema(&guard).map_err(|e| ApiError::DatabaseError(e.to_string()))?;
        }
        let plan_repo = Arc::new(PlanRepository::from_connection(conn.clone()));
        Ok(Self {
            plans: plan_repo.clone(),
            writer: plan_repo,
            workers: Arc::new(WorkerRepository::from_connection(conn.clone())),
            capacity: Arc::new(CapacityConfigRepository::from_connection(conn.clone())),
            pending: Arc::new(PendingJobRepository::from_connection(conn.clone())),
            conflicts: Arc::new(ConflictRepository::from_connection(conn)),
        })
    }
}

// ==========================================
// 请求 / 响应
// ==========================================

/// 自动排程请求
#[derive(Debug, Clone)]
pub struct AutoScheduleRequest {
    pub plan_id: PlanId,
    pub berth_filter: Option<Berth>,
    pub horizon_from: Option<NaiveDate>,
    pub horizon_to: Option<NaiveDate>,
    pub today: NaiveDate,
    pub now: NaiveDateTime,
}

impl AutoScheduleRequest {
    pub fn new(plan_id: PlanId, today: NaiveDate, now: NaiveDateTime) -> Self {
        Self {
            plan_id,
            berth_filter: None,
            horizon_from: None,
            horizon_to: None,
            today,
            now,
        }
    }
}

/// 自动排程响应
#[derive(Debug, Clone, Serialize)]
pub struct AutoScheduleResponse {
    pub result: AutoScheduleResult,
    /// (pending_id, 新 job_id)
    pub committed: Vec<(PendingJobId, JobId)>,
    /// 提交后的冲突重检结果; 重检失败时为 None
    pub conflicts: Option<ConflictReconciliation>,
    /// 重检失败原因（落位已提交, 不回滚）
    pub conflict_refresh_error: Option<String>,
}

/// 作业移动结果
#[derive(Debug, Clone, Serialize)]
pub struct MoveJobResponse {
    pub job_id: JobId,
    pub day_id: DayId,
    pub position: i32,
}

// ==========================================
// PlanningApi - 周计划排程 API
// ==========================================

/// 周计划排程API
///
/// 职责：
/// 1. 自动排程 / 冲突检测 / 负载均衡建议 / 关键路径 / 场景模拟
/// 2. 冲突处理（解决、忽略）与计划发布
/// 3. 依赖维护、作业移动与删除
pub struct PlanningApi<C>
where
    C: SchedulingConfigReader,
{
    ports: PlanningPorts,
    orchestrator: ScheduleOrchestrator<C>,
    scheduler: AutoScheduler,
    balancer: WorkloadBalancer,
    analyzer: CriticalPathAnalyzer,
    simulator: ScenarioSimulator,
    plan_locks: Mutex<HashMap<PlanId, Arc<AsyncMutex<()>>>>,
}

impl<C> PlanningApi<C>
where
    C: SchedulingConfigReader,
{
    /// 创建新的 PlanningApi 实例
    ///
    /// # 参数
    /// - ports: 存储端口
    /// - config: 配置读取器
    pub fn new(ports: PlanningPorts, config: Arc<C>) -> Self {
        Self {
            ports,
            orchestrator: ScheduleOrchestrator::new(config),
            scheduler: AutoScheduler::new(),
            balancer: WorkloadBalancer::new(),
            analyzer: CriticalPathAnalyzer::new(),
            simulator: ScenarioSimulator::new(),
            plan_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn ports(&self) -> &PlanningPorts {
        &self.ports
    }

    // ==========================================
    // 内部工具
    // ==========================================

    /// 获取计划级互斥锁
    fn plan_lock(&self, plan_id: PlanId) -> ApiResult<Arc<AsyncMutex<()>>> {
        let mut locks = self
            .plan_locks
            .lock()
            .map_err(|e| ApiError::InternalError(format!("计划锁注册表不可用: {}", e)))?;
        Ok(locks
            .entry(plan_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone())
    }

    async fn settings(&self) -> ApiResult<EngineSettings> {
        self.orchestrator
            .settings()
            .await
            .map_err(|e| ApiError::ConfigError(e.to_string()))
    }

    async fn load_roster(&self, snapshot: &PlanSnapshot) -> ApiResult<WorkerRoster> {
        Ok(self
            .ports
            .workers
            .load_roster(snapshot.plan.week_start, snapshot.plan.week_end())
            .await?)
    }

    async fn load_capacity(&self) -> ApiResult<CapacityModel> {
        Ok(CapacityModel::new(self.ports.capacity.list_configs().await?))
    }

    async fn plan_of_job(&self, job_id: JobId) -> ApiResult<PlanId> {
        self.ports
            .plans
            .find_plan_of_job(job_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Job(id={})不存在", job_id)))
    }

    /// 检测并替换 OPEN 冲突集合（调用方需持有计划锁）
    async fn revalidate(
        &self,
        snapshot: &PlanSnapshot,
        settings: &EngineSettings,
        now: NaiveDateTime,
    ) -> ApiResult<ConflictReconciliation> {
        let roster = self.load_roster(snapshot).await?;
        let existing = self.ports.conflicts.list_for_plan(snapshot.plan_id()).await?;
        let detector = ConflictDetector::new(settings.conflict_thresholds());
        let reconciliation = detector.validate(snapshot, &roster, &existing, now);
        self.ports
            .conflicts
            .replace_open(snapshot.plan_id(), &reconciliation.open)
            .await?;
        Ok(reconciliation)
    }

    // ==========================================
    // 计划管理
    // ==========================================

    /// 创建周计划（week_start 必须为周一）
    pub async fn create_plan(
        &self,
        name: &str,
        week_start: NaiveDate,
        now: NaiveDateTime,
    ) -> ApiResult<PlanId> {
        if name.trim().is_empty() {
            return Err(ApiError::InvalidInput("计划名称不能为空".to_string()));
        }
        Plan::validate_week_start(week_start)?;
        let plan_id = self.ports.writer.create_plan(name.trim(), week_start, now).await?;
        info!(plan_id, %week_start, "周计划已创建");
        Ok(plan_id)
    }

    /// 读取计划快照
    pub async fn snapshot(&self, plan_id: PlanId) -> ApiResult<PlanSnapshot> {
        Ok(self.ports.plans.load_snapshot(plan_id).await?)
    }

    // ==========================================
    // 自动排程
    // ==========================================

    /// 自动排程并落库
    ///
    /// 落位 + 待排作业消费在同一事务内提交, 随后重新检测冲突;
    /// 重检失败记入 conflict_refresh_error, 已提交的落位保留
    #[instrument(skip_all, fields(plan_id = request.plan_id))]
    pub async fn auto_schedule(
        &self,
        request: &AutoScheduleRequest,
    ) -> ApiResult<AutoScheduleResponse> {
        let lock = self.plan_lock(request.plan_id)?;
        let _guard = lock.lock().await;

        let snapshot = self.snapshot(request.plan_id).await?;
        snapshot.ensure_editable()?;
        let settings = self.settings().await?;
        let pool = self.ports.pending.list_pending(request.berth_filter).await?;
        let roster = self.load_roster(&snapshot).await?;
        let capacity = self.load_capacity().await?;

        let mut params = ScheduleOrchestrator::<C>::schedule_params(&settings, request.today);
        params.berth_filter = request.berth_filter;
        params.horizon_from = request.horizon_from;
        params.horizon_to = request.horizon_to;

        let workers = WorkerContext {
            roster: &roster,
            capacity: &capacity,
        };
        let result = self
            .scheduler
            .schedule(&snapshot, &pool, &params, Some(workers))?;

        let drafts: Vec<_> = result
            .placements
            .iter()
            .map(|p| (p.pending_id, p.job.clone()))
            .collect();
        let committed = if drafts.is_empty() {
            Vec::new()
        } else {
            self.ports.writer.commit_placements(&drafts).await?
        };

        // 落位已提交: 冲突重检失败只上报, 不影响本次结果
        let refreshed = match self.snapshot(request.plan_id).await {
            Ok(reloaded) => self.revalidate(&reloaded, &settings, request.now).await,
            Err(e) => Err(e),
        };
        let (conflicts, conflict_refresh_error) = match refreshed {
            Ok(reconciliation) => (Some(reconciliation), None),
            Err(e) => {
                warn!(error = %e, "落位已提交, 冲突重检失败");
                (None, Some(e.to_string()))
            }
        };

        info!(
            committed = committed.len(),
            skipped = result.skipped.len(),
            open_conflicts = conflicts.as_ref().map(|c| c.open.len()),
            "自动排程已提交"
        );
        Ok(AutoScheduleResponse {
            result,
            committed,
            conflicts,
            conflict_refresh_error,
        })
    }

    /// 周计划流水线预览（不落库）
    pub async fn preview_week(
        &self,
        plan_id: PlanId,
        today: NaiveDate,
        now: NaiveDateTime,
    ) -> ApiResult<WeeklyPlanResult> {
        let snapshot = self.snapshot(plan_id).await?;
        let pool = self.ports.pending.list_pending(None).await?;
        let roster = self.load_roster(&snapshot).await?;
        let capacity = self.load_capacity().await?;
        let existing = self.ports.conflicts.list_for_plan(plan_id).await?;

        self.orchestrator
            .plan_week(WeeklyPlanRequest {
                snapshot: &snapshot,
                pool: &pool,
                roster: &roster,
                capacity: &capacity,
                existing_conflicts: &existing,
                today,
                now,
            })
            .await
            .map_err(|e| match e.downcast::<crate::engine::EngineError>() {
                Ok(engine) => ApiError::from(*engine),
                Err(other) => ApiError::ConfigError(other.to_string()),
            })
    }

    // ==========================================
    // 冲突检测与处理
    // ==========================================

    /// 重新检测计划冲突
    #[instrument(skip(self))]
    pub async fn validate_plan(
        &self,
        plan_id: PlanId,
        now: NaiveDateTime,
    ) -> ApiResult<ConflictReconciliation> {
        let lock = self.plan_lock(plan_id)?;
        let _guard = lock.lock().await;

        let snapshot = self.snapshot(plan_id).await?;
        let settings = self.settings().await?;
        self.revalidate(&snapshot, &settings, now).await
    }

    /// 查询计划冲突（含历史）
    pub async fn list_conflicts(&self, plan_id: PlanId) -> ApiResult<Vec<SchedulingConflict>> {
        Ok(self.ports.conflicts.list_for_plan(plan_id).await?)
    }

    /// 解决冲突（需处理说明与处理人）
    pub async fn resolve_conflict(
        &self,
        conflict_id: &str,
        note: &str,
        resolved_by: &str,
        at: NaiveDateTime,
    ) -> ApiResult<SchedulingConflict> {
        let mut conflict = self.ports.conflicts.get_conflict(conflict_id).await?;
        let lock = self.plan_lock(conflict.plan_id)?;
        let _guard = lock.lock().await;

        conflict.resolve(note, resolved_by, at)?;
        self.ports.conflicts.update_status(&conflict).await?;
        info!(conflict_id, resolved_by, "冲突已解决");
        Ok(conflict)
    }

    /// 忽略冲突
    pub async fn ignore_conflict(
        &self,
        conflict_id: &str,
        acknowledged_by: Option<&str>,
        at: NaiveDateTime,
    ) -> ApiResult<SchedulingConflict> {
        let mut conflict = self.ports.conflicts.get_conflict(conflict_id).await?;
        let lock = self.plan_lock(conflict.plan_id)?;
        let _guard = lock.lock().await;

        conflict.ignore(acknowledged_by, at)?;
        self.ports.conflicts.update_status(&conflict).await?;
        info!(conflict_id, "冲突已忽略");
        Ok(conflict)
    }

    /// 发布计划
    ///
    /// 发布前先重新检测冲突, 存在阻断性冲突时拒绝
    #[instrument(skip(self))]
    pub async fn publish_plan(&self, plan_id: PlanId, at: NaiveDateTime) -> ApiResult<Plan> {
        let lock = self.plan_lock(plan_id)?;
        let _guard = lock.lock().await;

        let snapshot = self.snapshot(plan_id).await?;
        snapshot.ensure_editable()?;
        let settings = self.settings().await?;
        self.revalidate(&snapshot, &settings, at).await?;

        let conflicts = self.ports.conflicts.list_for_plan(plan_id).await?;
        let mut plan = snapshot.plan;
        if let Err(e) = plan.publish(&conflicts, at) {
            warn!(plan_id, error = %e, "计划发布被拒绝");
            return Err(e.into());
        }
        self.ports.writer.save_plan_status(&plan).await?;
        info!(plan_id, "计划已发布");
        Ok(plan)
    }

    // ==========================================
    // 分析类接口（只读）
    // ==========================================

    /// 负载均衡建议（不落库）
    pub async fn suggest_rebalance(&self, plan_id: PlanId) -> ApiResult<BalanceResult> {
        let snapshot = self.snapshot(plan_id).await?;
        let roster = self.load_roster(&snapshot).await?;
        Ok(self.balancer.balance(&snapshot, &roster))
    }

    /// 关键路径分析
    pub async fn critical_path(
        &self,
        plan_id: PlanId,
        today: NaiveDate,
    ) -> ApiResult<CriticalPathReport> {
        let snapshot = self.snapshot(plan_id).await?;
        Ok(self.analyzer.analyze(&snapshot, today))
    }

    /// 场景模拟（已发布计划同样可模拟, 不落库）
    pub async fn simulate(
        &self,
        plan_id: PlanId,
        perturbation: &Perturbation,
        today: NaiveDate,
    ) -> ApiResult<ScenarioResult> {
        let snapshot = self.snapshot(plan_id).await?;
        let roster = self.load_roster(&snapshot).await?;
        let capacity = self.load_capacity().await?;
        let settings = self.settings().await?;

        let ctx = ScenarioContext {
            snapshot: &snapshot,
            roster: &roster,
            capacity: &capacity,
            today,
            ceiling_hours: settings.day_ceiling_hours,
            include_weekends: settings.include_weekends,
        };
        Ok(self.simulator.simulate(&ctx, perturbation)?)
    }

    // ==========================================
    // 人工调整
    // ==========================================

    /// 执行人员改派（通常来自负载均衡建议）
    pub async fn apply_reassignment(
        &self,
        job_id: JobId,
        from_worker: WorkerId,
        to_worker: WorkerId,
    ) -> ApiResult<()> {
        let plan_id = self.plan_of_job(job_id).await?;
        let lock = self.plan_lock(plan_id)?;
        let _guard = lock.lock().await;

        let mut snapshot = self.snapshot(plan_id).await?;
        snapshot.ensure_editable()?;
        let job = snapshot
            .job(job_id)
            .ok_or_else(|| ApiError::NotFound(format!("Job(id={})不存在", job_id)))?;
        if !job.is_assigned_to(from_worker) {
            return Err(ApiError::InvalidInput(format!(
                "人员 {} 未分配到作业 {}",
                from_worker, job_id
            )));
        }
        let roster = self.load_roster(&snapshot).await?;
        if roster.worker(to_worker).map_or(true, |w| !w.active) {
            return Err(ApiError::NotFound(format!("Worker(id={})不存在或已停用", to_worker)));
        }

        let job = snapshot
            .job_mut(job_id)
            .ok_or_else(|| ApiError::NotFound(format!("Job(id={})不存在", job_id)))?;
        // lead 随人员转移; 接替者原为 lead 时保持
        let lead = matches!(job.lead_worker(), Some(w) if w == from_worker || w == to_worker);
        job.unassign(from_worker);
        job.assign(to_worker, lead);
        self.ports
            .writer
            .save_assignments(job_id, &job.assignments)
            .await?;
        info!(job_id, from_worker, to_worker, "人员改派已提交");
        Ok(())
    }

    /// 移动作业到另一天（两日位置同时重排）
    pub async fn move_job(&self, job_id: JobId, to_day_id: DayId) -> ApiResult<MoveJobResponse> {
        let plan_id = self.plan_of_job(job_id).await?;
        let lock = self.plan_lock(plan_id)?;
        let _guard = lock.lock().await;

        let mut snapshot = self.snapshot(plan_id).await?;
        let from_day_id = snapshot.job(job_id).map(|j| j.day_id);
        let position = snapshot.move_job(job_id, to_day_id)?;

        let touched: BTreeSet<DayId> = from_day_id.into_iter().chain([to_day_id]).collect();
        let positions: Vec<(JobId, DayId, i32)> = touched
            .iter()
            .flat_map(|day_id| snapshot.jobs_on_day(*day_id))
            .map(|j| (j.job_id, j.day_id, j.position))
            .collect();
        self.ports.writer.save_positions(&positions).await?;

        Ok(MoveJobResponse {
            job_id,
            day_id: to_day_id,
            position,
        })
    }

    /// 删除作业（依赖边与冲突成员关系一并清理）
    pub async fn delete_job(&self, job_id: JobId) -> ApiResult<()> {
        let plan_id = self.plan_of_job(job_id).await?;
        let lock = self.plan_lock(plan_id)?;
        let _guard = lock.lock().await;

        let mut snapshot = self.snapshot(plan_id).await?;
        snapshot.remove_job(job_id)?;
        self.ports.writer.delete_job(job_id).await?;
        info!(job_id, plan_id, "作业已删除");
        Ok(())
    }

    // ==========================================
    // 依赖维护
    // ==========================================

    /// 新增依赖边（拒绝自环、重复边、成环）
    pub async fn add_dependency(&self, dependency: JobDependency) -> ApiResult<()> {
        let plan_id = self.plan_of_job(dependency.job_id).await?;
        let other_plan = self.plan_of_job(dependency.depends_on_job_id).await?;
        if plan_id != other_plan {
            return Err(ApiError::InvalidInput(format!(
                "作业 {} 与作业 {} 不属于同一计划",
                dependency.job_id, dependency.depends_on_job_id
            )));
        }
        let lock = self.plan_lock(plan_id)?;
        let _guard = lock.lock().await;

        let snapshot = self.snapshot(plan_id).await?;
        snapshot.ensure_editable()?;
        let mut graph = DependencyGraph::from_dependencies(&snapshot.dependencies);
        graph.add_dependency(dependency.clone())?;
        self.ports.writer.add_dependency(&dependency).await?;
        Ok(())
    }

    /// 删除依赖边
    pub async fn remove_dependency(
        &self,
        job_id: JobId,
        depends_on_job_id: JobId,
    ) -> ApiResult<bool> {
        let plan_id = self.plan_of_job(job_id).await?;
        let lock = self.plan_lock(plan_id)?;
        let _guard = lock.lock().await;

        self.snapshot(plan_id).await?.ensure_editable()?;
        Ok(self
            .ports
            .writer
            .remove_dependency(job_id, depends_on_job_id)
            .await?)
    }
}
