// ==========================================
// 泊位维修周计划排程系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 排程建议 + 冲突检测 (人工最终控制权)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 排程/冲突/分析规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/表结构）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

pub use api::{ApiError, ApiResult, PlanningApi, PlanningPorts};
pub use config::{ConfigManager, EngineSettings, SchedulingConfigReader};
pub use domain::plan::{Job, JobDependency, Plan, PlanDay, PlanSnapshot};
pub use engine::{
    AutoScheduler, ConflictDetector, CriticalPathAnalyzer, ScenarioSimulator,
    ScheduleOrchestrator, WorkloadBalancer,
};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "泊位维修周计划排程系统";
