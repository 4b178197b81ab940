// ==========================================
// 泊位维修周计划排程系统 - 产能模型
// ==========================================
// 职责: 解析 (人员, 日期) 的产能限额
// 匹配顺序: 角色+班次 → 仅角色 → 系统默认
// 同级多条生效配置: effective_from 最新者优先, 再按 config_id 升序
// ==========================================

use crate::domain::capacity::{CapacityConfig, CapacityLimits, LimitSource};
use crate::domain::worker::WorkerProfile;
use chrono::NaiveDate;
use std::cmp::Ordering;

// ==========================================
// CapacityModel - 产能限额查询
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct CapacityModel {
    configs: Vec<CapacityConfig>,
}

impl CapacityModel {
    pub fn new(configs: Vec<CapacityConfig>) -> Self {
        Self { configs }
    }

    pub fn configs(&self) -> &[CapacityConfig] {
        &self.configs
    }

    /// 查询人员在指定日期的限额
    ///
    /// # 参数
    /// - `worker`: 人员档案（取 role / shift）
    /// - `date`: 日期（用于生效窗口过滤）
    pub fn limits_for(&self, worker: &WorkerProfile, date: NaiveDate) -> CapacityLimits {
        self.limits_for_role(&worker.role, worker.shift.as_deref(), date)
    }

    /// 按角色/班次查询限额
    pub fn limits_for_role(
        &self,
        role: &str,
        shift: Option<&str>,
        date: NaiveDate,
    ) -> CapacityLimits {
        let effective: Vec<&CapacityConfig> = self
            .configs
            .iter()
            .filter(|c| c.is_effective_on(date))
            .filter(|c| {
                c.role
                    .as_deref()
                    .map_or(false, |r| r.eq_ignore_ascii_case(role))
            })
            .collect();

        // 1) 角色 + 班次
        if let Some(shift) = shift {
            let best = effective
                .iter()
                .filter(|c| {
                    c.shift
                        .as_deref()
                        .map_or(false, |s| s.eq_ignore_ascii_case(shift))
                })
                .min_by(|a, b| Self::precedence(a, b));
            if let Some(config) = best {
                return config.limits(LimitSource::RoleAndShift(config.config_id));
            }
        }

        // 2) 仅角色（未指定班次的配置）
        let best = effective
            .iter()
            .filter(|c| c.shift.is_none())
            .min_by(|a, b| Self::precedence(a, b));
        if let Some(config) = best {
            return config.limits(LimitSource::RoleOnly(config.config_id));
        }

        // 3) 系统默认
        CapacityLimits::default()
    }

    /// 同级配置优先顺序（Less = 优先）
    fn precedence(a: &CapacityConfig, b: &CapacityConfig) -> Ordering {
        b.effective_from
            .cmp(&a.effective_from)
            .then_with(|| a.config_id.cmp(&b.config_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    fn config(id: i64, role: &str, shift: Option<&str>, hours: f64) -> CapacityConfig {
        CapacityConfig {
            config_id: id,
            name: format!("cfg-{}", id),
            role: Some(role.to_string()),
            shift: shift.map(str::to_string),
            max_hours_per_day: hours,
            max_jobs_per_day: 4,
            min_rest_hours: 10.0,
            overtime_threshold_hours: hours,
            overtime_cap_hours: 2.0,
            concurrent_jobs_allowed: 1,
            effective_from: None,
            effective_to: None,
        }
    }

    #[test]
    fn test_resolution_order() {
        let model = CapacityModel::new(vec![
            config(1, "technician", None, 9.0),
            config(2, "technician", Some("night"), 7.0),
        ]);
        let night = model.limits_for_role("technician", Some("night"), d(2));
        assert_eq!(night.max_hours_per_day, 7.0);
        assert_eq!(night.source, LimitSource::RoleAndShift(2));

        let day = model.limits_for_role("technician", Some("day"), d(2));
        assert_eq!(day.max_hours_per_day, 9.0);
        assert_eq!(day.source, LimitSource::RoleOnly(1));

        let other = model.limits_for_role("welder", Some("day"), d(2));
        assert_eq!(other, CapacityLimits::default());
    }

    #[test]
    fn test_effective_window_and_latest_wins() {
        let mut old = config(1, "technician", None, 9.0);
        old.effective_from = Some(d(1));
        let mut newer = config(2, "technician", None, 6.0);
        newer.effective_from = Some(d(3));
        let mut expired = config(3, "technician", Some("day"), 5.0);
        expired.effective_to = Some(d(2));
        let model = CapacityModel::new(vec![old, newer, expired]);

        assert_eq!(model.limits_for_role("technician", None, d(2)).max_hours_per_day, 9.0);
        assert_eq!(model.limits_for_role("technician", None, d(4)).max_hours_per_day, 6.0);
        assert_eq!(
            model.limits_for_role("technician", Some("day"), d(2)).max_hours_per_day,
            5.0
        );
        assert_eq!(
            model.limits_for_role("technician", Some("day"), d(3)).max_hours_per_day,
            6.0
        );
    }
}
