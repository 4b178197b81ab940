// ==========================================
// 泊位维修周计划排程系统 - API 层
// ==========================================
// 职责: 对外业务接口, 编排 Repository 与 Engine
// 红线: 计划写操作按计划串行化; 失败时不落库
// ==========================================

pub mod error;
pub mod planning_api;

pub use error::{ApiError, ApiResult};
pub use planning_api::{
    AutoScheduleRequest, AutoScheduleResponse, MoveJobResponse, PlanningApi, PlanningPorts,
};
