// ==========================================
// 泊位维修周计划排程系统 - 关键路径分析
// ==========================================
// 职责: 识别制约计划完成的关键作业
// 关键判定（任一满足）:
//   1) 存在正超期量
//   2) 优先级 Urgent
//   3) 关联缺陷严重度 High/Critical
//   4) 作为依赖根, 其(传递)后继中同设备作业 > 2
// 其余作业为松弛作业（可顺延 1 天）
// ==========================================

use crate::domain::plan::{Job, PlanSnapshot};
use crate::domain::types::{DefectSeverity, JobId, JobPriority};
use crate::engine::dependency_graph::DependencyGraph;
use crate::engine::priority::PriorityScorer;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, instrument, warn};

/// 同设备后继作业数阈值（严格大于）
pub const DEPENDENCY_ROOT_THRESHOLD: usize = 2;
/// 松弛作业允许顺延天数
pub const SLACK_SHIFT_DAYS: i64 = 1;

/// 关键原因
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CriticalReason {
    Overdue { magnitude: f64, unit: String },
    UrgentPriority,
    SevereDefect { severity: DefectSeverity },
    DependencyRoot { equipment_id: String, dependents: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct CriticalJob {
    pub job_id: JobId,
    pub title: String,
    pub date: Option<NaiveDate>,
    pub estimated_hours: f64,
    pub score: i64,
    pub reasons: Vec<CriticalReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlackJob {
    pub job_id: JobId,
    pub date: Option<NaiveDate>,
    pub estimated_hours: f64,
    pub max_shift_days: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CriticalPathReport {
    pub critical: Vec<CriticalJob>,
    pub slack: Vec<SlackJob>,
    pub total_critical_hours: f64,
    /// 关键作业间最长依赖链（前置在前）
    pub critical_chain: Vec<JobId>,
    pub critical_chain_hours: f64,
    /// 全部作业执行顺序（有环时为空）
    pub execution_order: Vec<JobId>,
    pub cycle_detected: bool,
}

// ==========================================
// CriticalPathAnalyzer - 关键路径分析
// ==========================================
pub struct CriticalPathAnalyzer {
    scorer: PriorityScorer,
}

impl Default for CriticalPathAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl CriticalPathAnalyzer {
    pub fn new() -> Self {
        Self {
            scorer: PriorityScorer::new(),
        }
    }

    #[instrument(skip_all, fields(plan_id = snapshot.plan_id(), jobs = snapshot.jobs.len()))]
    pub fn analyze(&self, snapshot: &PlanSnapshot, today: NaiveDate) -> CriticalPathReport {
        let graph = DependencyGraph::from_dependencies(&snapshot.dependencies);
        let mut report = CriticalPathReport::default();

        let mut critical_refs: Vec<&Job> = Vec::new();
        let mut reasons_by_job: HashMap<JobId, Vec<CriticalReason>> = HashMap::new();
        for job in snapshot.jobs.values() {
            let reasons = self.reasons_for(snapshot, &graph, job);
            if reasons.is_empty() {
                report.slack.push(SlackJob {
                    job_id: job.job_id,
                    date: snapshot.job_date(job.job_id),
                    estimated_hours: job.estimated_hours,
                    max_shift_days: SLACK_SHIFT_DAYS,
                });
            } else {
                critical_refs.push(job);
                reasons_by_job.insert(job.job_id, reasons);
            }
        }

        self.scorer.sort_refs(&mut critical_refs, today);
        for job in &critical_refs {
            report.total_critical_hours += job.estimated_hours;
            report.critical.push(CriticalJob {
                job_id: job.job_id,
                title: job.title.clone(),
                date: snapshot.job_date(job.job_id),
                estimated_hours: job.estimated_hours,
                score: self.scorer.score(*job, today),
                reasons: reasons_by_job.remove(&job.job_id).unwrap_or_default(),
            });
        }

        match graph.execution_order(&snapshot.jobs, &self.scorer, today) {
            Ok(order) => report.execution_order = order,
            Err(err) => {
                warn!(error = %err, "依赖数据存在环, 跳过执行顺序计算");
                report.cycle_detected = true;
            }
        }

        let critical_jobs: BTreeMap<JobId, Job> = critical_refs
            .iter()
            .map(|j| (j.job_id, (*j).clone()))
            .collect();
        if let Some((chain, hours)) = self.longest_chain(&graph, &critical_jobs, today) {
            report.critical_chain = chain;
            report.critical_chain_hours = hours;
        }

        info!(
            critical = report.critical.len(),
            slack = report.slack.len(),
            critical_hours = report.total_critical_hours,
            chain_hours = report.critical_chain_hours,
            "关键路径分析完成"
        );
        report
    }

    fn reasons_for(
        &self,
        snapshot: &PlanSnapshot,
        graph: &DependencyGraph,
        job: &Job,
    ) -> Vec<CriticalReason> {
        let mut reasons = Vec::new();
        if let Some(o) = job.overdue.filter(|o| o.is_positive()) {
            reasons.push(CriticalReason::Overdue {
                magnitude: o.magnitude,
                unit: o.unit.to_string(),
            });
        }
        if job.priority == JobPriority::Urgent {
            reasons.push(CriticalReason::UrgentPriority);
        }
        if let Some(severity) = job
            .defect_severity
            .filter(|s| matches!(s, DefectSeverity::High | DefectSeverity::Critical))
        {
            reasons.push(CriticalReason::SevereDefect { severity });
        }
        if let Some(eq) = job.equipment_id.as_deref() {
            let dependents = graph
                .transitive_dependents(job.job_id)
                .into_iter()
                .filter(|id| *id != job.job_id)
                .filter_map(|id| snapshot.job(id))
                .filter(|j| j.equipment_id.as_deref() == Some(eq))
                .count();
            if dependents > DEPENDENCY_ROOT_THRESHOLD {
                reasons.push(CriticalReason::DependencyRoot {
                    equipment_id: eq.to_string(),
                    dependents,
                });
            }
        }
        reasons
    }

    /// 关键作业间最长依赖链（按工时）
    fn longest_chain(
        &self,
        graph: &DependencyGraph,
        critical: &BTreeMap<JobId, Job>,
        today: NaiveDate,
    ) -> Option<(Vec<JobId>, f64)> {
        let order = graph.execution_order(critical, &self.scorer, today).ok()?;
        let mut best: HashMap<JobId, (f64, Option<JobId>)> = HashMap::new();
        for id in &order {
            let hours = critical.get(id).map_or(0.0, |j| j.estimated_hours);
            let prev = graph
                .prerequisites(*id)
                .into_iter()
                .filter_map(|p| best.get(&p).map(|(h, _)| (p, *h)))
                .max_by(|a, b| {
                    a.1.partial_cmp(&b.1)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| b.0.cmp(&a.0))
                });
            let entry = match prev {
                Some((p, h)) => (h + hours, Some(p)),
                None => (hours, None),
            };
            best.insert(*id, entry);
        }

        let (mut tail, total) = order
            .iter()
            .filter_map(|id| best.get(id).map(|(h, _)| (*id, *h)))
            .max_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.0.cmp(&a.0))
            })?;

        let mut chain = vec![tail];
        while let Some((_, Some(prev))) = best.get(&tail) {
            chain.push(*prev);
            tail = *prev;
        }
        chain.reverse();
        Some((chain, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::plan::{JobDependency, Plan, PlanDay};
    use crate::domain::types::{Berth, JobKind, Overdue, PlanStatus};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    fn job(id: JobId, hours: f64) -> Job {
        Job {
            job_id: id,
            day_id: 2,
            position: id as i32,
            title: format!("j{}", id),
            kind: JobKind::DefectRepair,
            berth: Berth::West,
            equipment_id: None,
            estimated_hours: hours,
            priority: JobPriority::Normal,
            overdue: None,
            required_date: None,
            template_id: None,
            defect_severity: None,
            assignments: vec![],
            materials: vec![],
        }
    }

    fn snapshot(jobs: Vec<Job>, deps: Vec<JobDependency>) -> PlanSnapshot {
        let plan = Plan {
            plan_id: 1,
            name: "W10".to_string(),
            week_start: d(2),
            status: PlanStatus::Draft,
            created_at: d(1).and_hms_opt(8, 0, 0).unwrap(),
            published_at: None,
        };
        let mut s = PlanSnapshot::new(
            plan,
            vec![PlanDay {
                day_id: 2,
                plan_id: 1,
                date: d(2),
            }],
        );
        for j in jobs {
            s.jobs.insert(j.job_id, j);
        }
        s.dependencies = deps;
        s
    }

    #[test]
    fn test_reasons_and_totals() {
        let mut overdue = job(1, 2.0);
        overdue.overdue = Some(Overdue::hours(5.0));
        let mut urgent = job(2, 3.0);
        urgent.priority = JobPriority::Urgent;
        let mut defect = job(3, 1.5);
        defect.defect_severity = Some(DefectSeverity::Critical);
        let mut minor = job(4, 4.0);
        minor.defect_severity = Some(DefectSeverity::Medium);

        let report = CriticalPathAnalyzer::new()
            .analyze(&snapshot(vec![overdue, urgent, defect, minor], vec![]), d(2));
        assert_eq!(report.critical.len(), 3);
        assert_eq!(report.total_critical_hours, 6.5);
        assert_eq!(report.slack.len(), 1);
        assert_eq!(report.slack[0].job_id, 4);
        assert_eq!(report.slack[0].max_shift_days, 1);
        // 超期 (700) > 紧急 (400) > 普通 (200)
        assert_eq!(report.critical[0].job_id, 1);
    }

    #[test]
    fn test_dependency_root_same_equipment() {
        let mut jobs: Vec<Job> = (1..=4).map(|i| job(i, 1.0)).collect();
        for j in jobs.iter_mut() {
            j.equipment_id = Some("STS-02".to_string());
        }
        let deps = vec![
            JobDependency::finish_to_start(2, 1),
            JobDependency::finish_to_start(3, 2),
            JobDependency::finish_to_start(4, 1),
        ];
        let report = CriticalPathAnalyzer::new().analyze(&snapshot(jobs, deps), d(2));
        assert_eq!(report.critical.len(), 1);
        assert_eq!(report.critical[0].job_id, 1);
        assert!(matches!(
            report.critical[0].reasons[0],
            CriticalReason::DependencyRoot { dependents: 3, .. }
        ));
        assert_eq!(report.execution_order[0], 1);
    }

    #[test]
    fn test_critical_chain() {
        let mut a = job(1, 2.0);
        a.priority = JobPriority::Urgent;
        let mut b = job(2, 3.0);
        b.priority = JobPriority::Urgent;
        let mut c = job(3, 1.0);
        c.priority = JobPriority::Urgent;
        let deps = vec![JobDependency::finish_to_start(2, 1)];
        let report = CriticalPathAnalyzer::new().analyze(&snapshot(vec![a, b, c], deps), d(2));
        assert_eq!(report.critical_chain, vec![1, 2]);
        assert_eq!(report.critical_chain_hours, 5.0);
    }

    #[test]
    fn test_cycle_is_reported_not_fatal() {
        let deps = vec![
            JobDependency::finish_to_start(1, 2),
            JobDependency::finish_to_start(2, 1),
        ];
        let s = snapshot(vec![job(1, 1.0), job(2, 1.0)], deps);
        let report = CriticalPathAnalyzer::new().analyze(&s, d(2));
        assert!(report.cycle_detected);
        assert!(report.execution_order.is_empty());
    }
}
