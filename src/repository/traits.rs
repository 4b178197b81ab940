// ==========================================
// 泊位维修周计划排程系统 - 存储端口 Trait
// ==========================================
// 职责: 定义引擎调用方所需的数据访问接口（不包含业务逻辑）
// 红线: Repository 不含业务规则, 只做数据 CRUD
// 约束: 多表写入必须在单个事务中完成
// ==========================================

use crate::domain::capacity::CapacityConfig;
use crate::domain::conflict::SchedulingConflict;
use crate::domain::pending::PendingJob;
use crate::domain::plan::{
    Assignment, JobDependency, JobDraft, JobTemplate, Plan, PlanSnapshot,
};
use crate::domain::types::{Berth, DayId, JobId, PendingJobId, PlanId, TemplateId, WorkerId};
use crate::domain::worker::{WorkerProfile, WorkerRoster};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

// ==========================================
// PlanSnapshotReader Trait
// ==========================================
// 实现者: PlanRepository
#[async_trait]
pub trait PlanSnapshotReader: Send + Sync {
    /// 加载计划快照（计划日、作业、分配、物料、依赖、模板）
    ///
    /// # 返回
    /// - Err(NotFound): 计划不存在
    async fn load_snapshot(&self, plan_id: PlanId) -> RepositoryResult<PlanSnapshot>;

    /// 查询作业所属计划
    async fn find_plan_of_job(&self, job_id: JobId) -> RepositoryResult<Option<PlanId>>;
}

// ==========================================
// PlanWriter Trait
// ==========================================
// 实现者: PlanRepository
#[async_trait]
pub trait PlanWriter: Send + Sync {
    /// 创建周计划并生成周一至周日七个计划日
    async fn create_plan(
        &self,
        name: &str,
        week_start: NaiveDate,
        created_at: NaiveDateTime,
    ) -> RepositoryResult<PlanId>;

    /// 新增作业模板
    async fn insert_template(&self, template: &JobTemplate) -> RepositoryResult<TemplateId>;

    /// 提交自动排程落位（事务化）
    ///
    /// 插入作业、分配、物料, 并把来源待排作业标记为 SCHEDULED
    ///
    /// # 返回
    /// - Ok(Vec<(pending_id, job_id)>): 按输入顺序
    /// - Err: 整个事务回滚
    async fn commit_placements(
        &self,
        placements: &[(PendingJobId, JobDraft)],
    ) -> RepositoryResult<Vec<(PendingJobId, JobId)>>;

    /// 覆盖作业的人员分配
    async fn save_assignments(
        &self,
        job_id: JobId,
        assignments: &[Assignment],
    ) -> RepositoryResult<()>;

    /// 批量更新作业所在日与位置（事务化）
    async fn save_positions(&self, positions: &[(JobId, DayId, i32)]) -> RepositoryResult<()>;

    /// 删除作业（事务化）
    ///
    /// 级联删除分配/物料/依赖边, 并清理冲突成员关系
    async fn delete_job(&self, job_id: JobId) -> RepositoryResult<()>;

    /// 保存计划状态（发布）
    async fn save_plan_status(&self, plan: &Plan) -> RepositoryResult<()>;

    /// 新增依赖边
    async fn add_dependency(&self, dependency: &JobDependency) -> RepositoryResult<()>;

    /// 删除依赖边
    ///
    /// # 返回
    /// 是否存在并删除
    async fn remove_dependency(
        &self,
        job_id: JobId,
        depends_on_job_id: JobId,
    ) -> RepositoryResult<bool>;
}

// ==========================================
// WorkerDirectory Trait
// ==========================================
// 实现者: WorkerRepository
#[async_trait]
pub trait WorkerDirectory: Send + Sync {
    /// 加载人员名册（含日期范围内的缺勤）
    async fn load_roster(&self, from: NaiveDate, to: NaiveDate) -> RepositoryResult<WorkerRoster>;

    /// 按角色/专业过滤指定日期可用人员（缺勤已排除）
    async fn find_available(
        &self,
        date: NaiveDate,
        role: Option<&str>,
        specialization: Option<&str>,
    ) -> RepositoryResult<Vec<WorkerProfile>>;

    /// 新增人员（含资质）
    async fn insert_worker(&self, worker: &WorkerProfile) -> RepositoryResult<WorkerId>;

    /// 登记缺勤
    async fn record_absence(
        &self,
        worker_id: WorkerId,
        date: NaiveDate,
        reason: Option<&str>,
    ) -> RepositoryResult<()>;
}

// ==========================================
// CapacityConfigStore Trait
// ==========================================
// 实现者: CapacityConfigRepository
#[async_trait]
pub trait CapacityConfigStore: Send + Sync {
    /// 查询全部产能配置
    async fn list_configs(&self) -> RepositoryResult<Vec<CapacityConfig>>;

    /// 新增产能配置
    async fn insert_config(&self, config: &CapacityConfig) -> RepositoryResult<i64>;
}

// ==========================================
// PendingJobPool Trait
// ==========================================
// 实现者: PendingJobRepository
#[async_trait]
pub trait PendingJobPool: Send + Sync {
    /// 查询待排作业（可按泊位过滤, 按 pending_id 升序）
    async fn list_pending(&self, berth: Option<Berth>) -> RepositoryResult<Vec<PendingJob>>;

    /// 新增待排作业
    async fn insert_pending(&self, pending: &PendingJob) -> RepositoryResult<PendingJobId>;
}

// ==========================================
// ConflictStore Trait
// ==========================================
// 实现者: ConflictRepository
#[async_trait]
pub trait ConflictStore: Send + Sync {
    /// 查询计划全部冲突（含历史, 按 detected_at, conflict_id 排序）
    async fn list_for_plan(&self, plan_id: PlanId) -> RepositoryResult<Vec<SchedulingConflict>>;

    /// 查询单条冲突
    async fn get_conflict(&self, conflict_id: &str) -> RepositoryResult<SchedulingConflict>;

    /// 替换计划的 Open 冲突集合（事务化）
    ///
    /// 删除该计划全部 OPEN 记录后插入新集合; RESOLVED/IGNORED 不受影响
    ///
    /// # 返回
    /// 被删除的旧 OPEN 记录数
    async fn replace_open(
        &self,
        plan_id: PlanId,
        open: &[SchedulingConflict],
    ) -> RepositoryResult<usize>;

    /// 保存冲突处理状态
    async fn update_status(&self, conflict: &SchedulingConflict) -> RepositoryResult<()>;
}
