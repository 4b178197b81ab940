// ==========================================
// 泊位维修周计划排程系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 红线: 跳过 (NoEligibleDay) 不是错误, 由结果的 skip 列表承载
// ==========================================

use crate::domain::error::DomainError;
use crate::domain::types::JobId;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("输入校验失败: {0}")]
    Validation(String),

    #[error("引用对象不存在: {entity} id={id}")]
    NotFound { entity: String, id: String },

    #[error("循环依赖: job {job_id} 不能依赖 job {depends_on_job_id}")]
    CircularDependency {
        job_id: JobId,
        depends_on_job_id: JobId,
    },

    #[error("计划已发布, 不可排程: plan_id={0}")]
    PlanReadOnly(i64),

    #[error("冲突状态转换非法: {0}")]
    InvalidConflictTransition(String),
}

impl EngineError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        EngineError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

impl From<DomainError> for EngineError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            DomainError::Validation(msg) => EngineError::Validation(msg),
            DomainError::PlanReadOnly(plan_id) => EngineError::PlanReadOnly(plan_id),
            DomainError::InvalidStateTransition { from, to } => {
                EngineError::InvalidConflictTransition(format!("{} -> {}", from, to))
            }
            DomainError::PublishBlocked { count } => {
                EngineError::Validation(format!("存在 {} 个阻断性冲突", count))
            }
        }
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
