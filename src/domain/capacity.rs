// ==========================================
// 泊位维修周计划排程系统 - 产能配置领域模型
// ==========================================
// 按 角色+班次 / 角色 / 系统默认 三级匹配
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 系统默认: 每日最大工时
pub const DEFAULT_MAX_HOURS_PER_DAY: f64 = 8.0;
/// 系统默认: 每日最大作业数
pub const DEFAULT_MAX_JOBS_PER_DAY: u32 = 5;
/// 系统默认: 最小休息时长
pub const DEFAULT_MIN_REST_HOURS: f64 = 12.0;
/// 系统默认: 加班起算阈值
pub const DEFAULT_OVERTIME_THRESHOLD_HOURS: f64 = 8.0;
/// 系统默认: 加班上限
pub const DEFAULT_OVERTIME_CAP_HOURS: f64 = 4.0;
/// 系统默认: 允许并行作业数
pub const DEFAULT_CONCURRENT_JOBS: u32 = 1;

// ==========================================
// CapacityConfig - 产能配置
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityConfig {
    pub config_id: i64,
    pub name: String,
    pub role: Option<String>,
    pub shift: Option<String>,
    pub max_hours_per_day: f64,
    pub max_jobs_per_day: u32,
    pub min_rest_hours: f64,
    pub overtime_threshold_hours: f64,
    pub overtime_cap_hours: f64,
    pub concurrent_jobs_allowed: u32,
    pub effective_from: Option<NaiveDate>,
    pub effective_to: Option<NaiveDate>,
}

impl CapacityConfig {
    /// 指定日期是否处于生效窗口
    pub fn is_effective_on(&self, date: NaiveDate) -> bool {
        self.effective_from.map_or(true, |from| date >= from)
            && self.effective_to.map_or(true, |to| date <= to)
    }

    /// 转换为限额
    pub fn limits(&self, source: LimitSource) -> CapacityLimits {
        CapacityLimits {
            max_hours_per_day: self.max_hours_per_day,
            max_jobs_per_day: self.max_jobs_per_day,
            min_rest_hours: self.min_rest_hours,
            overtime_threshold_hours: self.overtime_threshold_hours,
            overtime_cap_hours: self.overtime_cap_hours,
            concurrent_jobs_allowed: self.concurrent_jobs_allowed,
            source,
        }
    }
}

// ==========================================
// LimitSource - 限额来源（可解释性）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitSource {
    RoleAndShift(i64),
    RoleOnly(i64),
    SystemDefault,
}

// ==========================================
// CapacityLimits - 单人单日限额
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityLimits {
    pub max_hours_per_day: f64,
    pub max_jobs_per_day: u32,
    pub min_rest_hours: f64,
    pub overtime_threshold_hours: f64,
    pub overtime_cap_hours: f64,
    pub concurrent_jobs_allowed: u32,
    pub source: LimitSource,
}

impl Default for CapacityLimits {
    fn default() -> Self {
        Self {
            max_hours_per_day: DEFAULT_MAX_HOURS_PER_DAY,
            max_jobs_per_day: DEFAULT_MAX_JOBS_PER_DAY,
            min_rest_hours: DEFAULT_MIN_REST_HOURS,
            overtime_threshold_hours: DEFAULT_OVERTIME_THRESHOLD_HOURS,
            overtime_cap_hours: DEFAULT_OVERTIME_CAP_HOURS,
            concurrent_jobs_allowed: DEFAULT_CONCURRENT_JOBS,
            source: LimitSource::SystemDefault,
        }
    }
}

impl CapacityLimits {
    /// 含加班的绝对工时上限
    pub fn absolute_hours_cap(&self) -> f64 {
        self.max_hours_per_day
            .max(self.overtime_threshold_hours + self.overtime_cap_hours)
    }

    /// 超出加班阈值的工时
    pub fn overtime_hours(&self, hours: f64) -> f64 {
        (hours - self.overtime_threshold_hours).max(0.0)
    }

    /// 追加作业后是否仍在限额内（工时含加班上限 + 作业数）
    pub fn can_take(&self, current_hours: f64, current_jobs: u32, job_hours: f64) -> bool {
        current_hours + job_hours <= self.absolute_hours_cap() + 1e-9
            && current_jobs < self.max_jobs_per_day
    }
}
