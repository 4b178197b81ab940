// ==========================================
// 泊位维修周计划排程系统 - 领域层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 领域层错误类型（快照编辑、冲突生命周期、发布门控）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("数据验证失败: {0}")]
    Validation(String),

    #[error("计划已发布, 不可修改: plan_id={0}")]
    PlanReadOnly(i64),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("存在 {count} 个阻断性冲突, 计划不可发布")]
    PublishBlocked { count: usize },
}

impl DomainError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

/// Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;
