// ==========================================
// 泊位维修周计划排程系统 - 排程配置读取 Trait
// ==========================================
// 职责: 定义排程引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

/// 配置读取结果
pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// SchedulingConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait SchedulingConfigReader: Send + Sync {
    // ===== 自动排程 =====

    /// 每日泊位工时上限
    ///
    /// # 默认值
    /// - 8.0
    async fn get_day_ceiling_hours(&self) -> ConfigResult<f64>;

    /// 周六/周日是否参与自动排程
    ///
    /// # 默认值
    /// - false
    async fn get_include_weekends(&self) -> ConfigResult<bool>;

    /// 自动排程后是否执行人员匹配
    ///
    /// # 默认值
    /// - true
    async fn get_auto_assign_workers(&self) -> ConfigResult<bool>;

    // ===== 冲突检测 =====

    /// 人员日工时警告阈值（严格大于时告警）
    ///
    /// # 默认值
    /// - 10.0
    async fn get_capacity_warning_hours(&self) -> ConfigResult<f64>;

    /// 人员日工时错误阈值（严格大于时报错）
    ///
    /// # 默认值
    /// - 12.0
    async fn get_capacity_error_hours(&self) -> ConfigResult<f64>;

    /// 同设备同日作业数提示阈值（严格大于时提示）
    ///
    /// # 默认值
    /// - 2
    async fn get_equipment_overlap_jobs(&self) -> ConfigResult<usize>;

    /// 周末尾段天数（紧急/高优先级作业排在最后 N 天视为有风险）
    ///
    /// # 默认值
    /// - 2
    async fn get_sla_tail_days(&self) -> ConfigResult<i64>;
}
