// ==========================================
// 泊位维修周计划排程系统 - 配置层
// ==========================================
// 职责: 系统配置管理
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod scheduling_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, load_settings, ConfigManager, ConfigScope, EngineSettings};
pub use scheduling_config_trait::{ConfigResult, SchedulingConfigReader};
