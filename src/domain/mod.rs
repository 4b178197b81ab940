// ==========================================
// 泊位维修周计划排程系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则
// 红线: 不含数据访问逻辑, 不含引擎逻辑
// ==========================================

pub mod capacity;
pub mod conflict;
pub mod error;
pub mod pending;
pub mod plan;
pub mod types;
pub mod worker;

// 重导出核心类型
pub use capacity::{CapacityConfig, CapacityLimits, LimitSource};
pub use conflict::{blocking_conflicts, ConflictFingerprint, SchedulingConflict};
pub use error::{DomainError, DomainResult};
pub use pending::PendingJob;
pub use plan::{
    Assignment, Job, JobDependency, JobDraft, JobTemplate, MaterialRequirement, Plan, PlanDay,
    PlanSnapshot,
};
pub use types::{
    Berth, ConflictSeverity, ConflictStatus, ConflictType, DayId, DefectSeverity, DependencyType,
    JobId, JobKind, JobPriority, Overdue, OverdueTier, OverdueUnit, PendingJobId,
    PendingJobStatus, PlanId, PlanStatus, TemplateId, WorkerId,
};
pub use worker::{Certification, WorkerProfile, WorkerRoster};
