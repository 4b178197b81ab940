// ==========================================
// 泊位维修周计划排程系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型, 转换引擎/仓储错误为用户友好的错误消息
// 约束: 错误信息必须包含显式原因
// ==========================================

use crate::domain::error::DomainError;
use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("循环依赖: 作业 {job_id} 不能依赖作业 {depends_on_job_id}")]
    CircularDependency { job_id: i64, depends_on_job_id: i64 },

    #[error("计划已发布, 不可修改: plan_id={0}")]
    PlanReadOnly(i64),

    #[error("计划存在 {count} 个阻断性冲突, 不可发布")]
    PublishBlocked { count: usize },

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("无效的状态转换: {0}")]
    InvalidStateTransition(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("配置读取失败: {0}")]
    ConfigError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将Repository层的技术错误转换为用户友好的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("{}: {}", field, message))
            }
            RepositoryError::SerializationError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(e) => ApiError::Other(e),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(msg) => ApiError::InvalidInput(msg),
            EngineError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            EngineError::CircularDependency {
                job_id,
                depends_on_job_id,
            } => ApiError::CircularDependency {
                job_id,
                depends_on_job_id,
            },
            EngineError::PlanReadOnly(plan_id) => ApiError::PlanReadOnly(plan_id),
            EngineError::InvalidConflictTransition(msg) => ApiError::InvalidStateTransition(msg),
        }
    }
}

// ==========================================
// 从 DomainError 转换
// ==========================================
impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            DomainError::Validation(msg) => ApiError::InvalidInput(msg),
            DomainError::PlanReadOnly(plan_id) => ApiError::PlanReadOnly(plan_id),
            DomainError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition(format!("{} -> {}", from, to))
            }
            DomainError::PublishBlocked { count } => ApiError::PublishBlocked { count },
        }
    }
}

/// API层Result类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_not_found_message() {
        let err: ApiError = RepositoryError::not_found("Plan", 3).into();
        assert_eq!(err.to_string(), "资源未找到: Plan(id=3)不存在");
    }

    #[test]
    fn test_engine_cycle_is_preserved() {
        let err: ApiError = EngineError::CircularDependency {
            job_id: 1,
            depends_on_job_id: 2,
        }
        .into();
        assert!(matches!(
            err,
            ApiError::CircularDependency {
                job_id: 1,
                depends_on_job_id: 2
            }
        ));
    }

    #[test]
    fn test_publish_blocked_from_domain() {
        let err: ApiError = DomainError::PublishBlocked { count: 2 }.into();
        assert!(matches!(err, ApiError::PublishBlocked { count: 2 }));
    }
}
