// ==========================================
// 泊位维修周计划排程系统 - 人员领域模型
// ==========================================
// 人员为引擎只读输入; 缺勤由外部按日期提供
// ==========================================

use crate::domain::types::{Berth, WorkerId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

// ==========================================
// Certification - 资质证书
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certification {
    pub name: String,
    pub verified: bool,
    pub expires_on: Option<NaiveDate>,
}

impl Certification {
    /// 证书在指定日期是否有效（已核验且未过期）
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.verified && self.expires_on.map_or(true, |exp| exp >= date)
    }
}

// ==========================================
// WorkerProfile - 人员档案
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerProfile {
    pub worker_id: WorkerId,
    pub name: String,
    pub role: String,
    pub shift: Option<String>,
    pub specializations: Vec<String>,
    pub certifications: Vec<Certification>,
    pub home_berth: Option<Berth>,
    pub active: bool,
}

impl WorkerProfile {
    pub fn has_specialization(&self, tag: &str) -> bool {
        self.specializations
            .iter()
            .any(|s| s.eq_ignore_ascii_case(tag))
    }

    /// 指定日期是否持有某项有效资质（名称忽略大小写）
    pub fn holds_certification(&self, name: &str, date: NaiveDate) -> bool {
        self.certifications
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(name) && c.is_valid_on(date))
    }

    /// 返回缺失的资质列表
    pub fn missing_certifications(&self, required: &[String], date: NaiveDate) -> Vec<String> {
        required
            .iter()
            .filter(|r| !self.holds_certification(r, date))
            .cloned()
            .collect()
    }
}

// ==========================================
// WorkerRoster - 人员名册快照
// ==========================================
// 人员 + 缺勤日期, 由人员目录按计划周加载
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerRoster {
    pub workers: BTreeMap<WorkerId, WorkerProfile>,
    pub absences: HashSet<(WorkerId, NaiveDate)>,
}

impl WorkerRoster {
    pub fn new(workers: Vec<WorkerProfile>) -> Self {
        Self {
            workers: workers.into_iter().map(|w| (w.worker_id, w)).collect(),
            absences: HashSet::new(),
        }
    }

    pub fn with_absence(mut self, worker_id: WorkerId, date: NaiveDate) -> Self {
        self.absences.insert((worker_id, date));
        self
    }

    pub fn worker(&self, worker_id: WorkerId) -> Option<&WorkerProfile> {
        self.workers.get(&worker_id)
    }

    pub fn is_available(&self, worker_id: WorkerId, date: NaiveDate) -> bool {
        self.workers
            .get(&worker_id)
            .map_or(false, |w| w.active && !self.absences.contains(&(worker_id, date)))
    }

    /// 指定日期可用人员（按 worker_id 升序）
    pub fn available_on(&self, date: NaiveDate) -> Vec<&WorkerProfile> {
        self.workers
            .values()
            .filter(|w| self.is_available(w.worker_id, date))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    fn worker() -> WorkerProfile {
        WorkerProfile {
            worker_id: 1,
            name: "Li".to_string(),
            role: "technician".to_string(),
            shift: Some("day".to_string()),
            specializations: vec!["Electrical".to_string()],
            certifications: vec![
                Certification {
                    name: "HV".to_string(),
                    verified: true,
                    expires_on: Some(d(10)),
                },
                Certification {
                    name: "Crane".to_string(),
                    verified: false,
                    expires_on: None,
                },
            ],
            home_berth: Some(Berth::East),
            active: true,
        }
    }

    #[test]
    fn test_certification_validity() {
        let w = worker();
        assert!(w.holds_certification("hv", d(10)));
        assert!(!w.holds_certification("HV", d(11)));
        assert!(!w.holds_certification("Crane", d(1)));
    }

    #[test]
    fn test_missing_certifications() {
        let w = worker();
        let missing = w.missing_certifications(&["HV".to_string(), "Crane".to_string()], d(5));
        assert_eq!(missing, vec!["Crane".to_string()]);
    }

    #[test]
    fn test_roster_absence() {
        let roster = WorkerRoster::new(vec![worker()]).with_absence(1, d(4));
        assert!(roster.is_available(1, d(3)));
        assert!(!roster.is_available(1, d(4)));
        assert!(!roster.is_available(2, d(3)));
        assert!(worker().has_specialization("electrical"));
    }
}
