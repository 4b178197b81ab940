// ==========================================
// 泊位维修周计划排程系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口, 屏蔽数据库细节
// 约束: 所有查询使用参数化, 防止 SQL 注入
// ==========================================

pub mod capacity_repo;
pub mod conflict_repo;
pub mod error;
pub mod pending_job_repo;
pub mod plan_repo;
pub mod row_utils;
pub mod traits;
pub mod worker_repo;

// 重导出核心仓储
pub use capacity_repo::CapacityConfigRepository;
pub use conflict_repo::ConflictRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use pending_job_repo::PendingJobRepository;
pub use plan_repo::PlanRepository;
pub use traits::{
    CapacityConfigStore, ConflictStore, PendingJobPool, PlanSnapshotReader, PlanWriter,
    WorkerDirectory,
};
pub use worker_repo::WorkerRepository;
