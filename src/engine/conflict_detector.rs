// ==========================================
// 泊位维修周计划排程系统 - 冲突检测引擎
// ==========================================
// 职责: 扫描计划, 生成当前开放冲突集合
// 检查项:
// - capacity: (日, 人员) 工时超警戒/超上限
// - certification: 分配人员缺少模板要求的有效资质
// - equipment_overlap: 同设备同日作业过多（提示, 不阻断）
// - sla: 超期作业; 周末尾段的紧急/高优先级作业
// - dependency: 数据中存在环; finish_to_start 顺序颠倒
// ==========================================
// 红线:
// - 只替换 Open 冲突; Resolved/Ignored 作为历史保留, 不删除不改写
// - 与 Ignored 冲突指纹相同的新冲突不再生成（已确认知悉）
// - Resolved 后条件仍存在则生成新记录
// ==========================================

use crate::domain::conflict::{ConflictFingerprint, SchedulingConflict};
use crate::domain::plan::{Job, PlanSnapshot};
use crate::domain::types::{
    ConflictSeverity, ConflictStatus, ConflictType, DependencyType, JobId, JobPriority,
    OverdueTier, WorkerId,
};
use crate::domain::worker::WorkerRoster;
use crate::engine::dependency_graph::DependencyGraph;
use crate::engine::priority::PriorityScorer;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, instrument};
use uuid::Uuid;

// ==========================================
// ConflictThresholds - 检测阈值
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictThresholds {
    pub capacity_warning_hours: f64,
    pub capacity_error_hours: f64,
    pub equipment_overlap_jobs: usize,
    /// SLA 尾段: 本周最后 N 个可排日
    pub sla_tail_days: i64,
    pub include_weekends: bool,
}

impl Default for ConflictThresholds {
    fn default() -> Self {
        Self {
            capacity_warning_hours: 10.0,
            capacity_error_hours: 12.0,
            equipment_overlap_jobs: 2,
            sla_tail_days: 2,
            include_weekends: false,
        }
    }
}

/// 冲突对账结果（交由调用方原子落库）
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConflictReconciliation {
    /// 新的开放冲突集合（替换旧 Open 集合）
    pub open: Vec<SchedulingConflict>,
    /// 被替换的旧 Open 冲突 id
    pub superseded_ids: Vec<String>,
    /// 因已忽略而不再生成的数量
    pub suppressed: usize,
}

impl ConflictReconciliation {
    pub fn blocking_count(&self) -> usize {
        self.open.iter().filter(|c| c.is_blocking()).count()
    }
}

// ==========================================
// ConflictDetector - 冲突检测引擎
// ==========================================
pub struct ConflictDetector {
    thresholds: ConflictThresholds,
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::new(ConflictThresholds::default())
    }
}

impl ConflictDetector {
    pub fn new(thresholds: ConflictThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ConflictThresholds {
        &self.thresholds
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 检测 + 对账
    ///
    /// # 参数
    /// - `existing`: 本计划已存冲突（含历史）
    /// - `now`: 检测时间
    #[instrument(skip_all, fields(plan_id = snapshot.plan_id(), existing = existing.len()))]
    pub fn validate(
        &self,
        snapshot: &PlanSnapshot,
        roster: &WorkerRoster,
        existing: &[SchedulingConflict],
        now: NaiveDateTime,
    ) -> ConflictReconciliation {
        let detected = self.detect(snapshot, roster, now);
        let result = Self::reconcile(existing, detected);
        info!(
            open = result.open.len(),
            blocking = result.blocking_count(),
            superseded = result.superseded_ids.len(),
            suppressed = result.suppressed,
            "冲突检测完成"
        );
        result
    }

    /// 新旧冲突对账
    pub fn reconcile(
        existing: &[SchedulingConflict],
        detected: Vec<SchedulingConflict>,
    ) -> ConflictReconciliation {
        let acknowledged: HashSet<ConflictFingerprint> = existing
            .iter()
            .filter(|c| c.status == ConflictStatus::Ignored)
            .map(|c| c.fingerprint())
            .collect();

        let mut result = ConflictReconciliation {
            superseded_ids: existing
                .iter()
                .filter(|c| c.is_open())
                .map(|c| c.conflict_id.clone())
                .collect(),
            ..Default::default()
        };
        for conflict in detected {
            if acknowledged.contains(&conflict.fingerprint()) {
                result.suppressed += 1;
            } else {
                result.open.push(conflict);
            }
        }
        result
    }

    /// 扫描计划, 生成新的 Open 冲突（确定性顺序）
    pub fn detect(
        &self,
        snapshot: &PlanSnapshot,
        roster: &WorkerRoster,
        now: NaiveDateTime,
    ) -> Vec<SchedulingConflict> {
        let mut builder = ConflictBuilder {
            plan_id: snapshot.plan_id(),
            now,
            out: Vec::new(),
        };
        self.check_capacity(snapshot, &mut builder);
        self.check_certifications(snapshot, roster, &mut builder);
        self.check_equipment_overlap(snapshot, &mut builder);
        self.check_sla(snapshot, &mut builder);
        self.check_dependencies(snapshot, &mut builder);
        builder.out
    }

    // ==========================================
    // 检查项
    // ==========================================

    fn check_capacity(&self, snapshot: &PlanSnapshot, b: &mut ConflictBuilder) {
        for day in &snapshot.days {
            let mut per_worker: BTreeMap<WorkerId, (f64, Vec<JobId>)> = BTreeMap::new();
            for job in snapshot.jobs_on_day(day.day_id) {
                for worker_id in job.assigned_worker_ids() {
                    let entry = per_worker.entry(worker_id).or_insert((0.0, Vec::new()));
                    entry.0 += job.estimated_hours;
                    entry.1.push(job.job_id);
                }
            }
            for (worker_id, (hours, job_ids)) in per_worker {
                let severity = if hours > self.thresholds.capacity_error_hours {
                    ConflictSeverity::Error
                } else if hours > self.thresholds.capacity_warning_hours {
                    ConflictSeverity::Warning
                } else {
                    continue;
                };
                b.push(
                    ConflictType::Capacity,
                    severity,
                    job_ids,
                    vec![worker_id],
                    Some(day.date),
                    format!("人员 {} 在 {} 共排 {:.1}h", worker_id, day.date, hours),
                );
            }
        }
    }

    fn check_certifications(
        &self,
        snapshot: &PlanSnapshot,
        roster: &WorkerRoster,
        b: &mut ConflictBuilder,
    ) {
        for job in snapshot.jobs.values() {
            let required = snapshot.required_certifications(job);
            if required.is_empty() {
                continue;
            }
            let Some(date) = snapshot.job_date(job.job_id) else {
                continue;
            };
            for worker_id in job.assigned_worker_ids() {
                let missing = match roster.worker(worker_id) {
                    Some(w) => w.missing_certifications(required, date),
                    None => required.to_vec(),
                };
                if missing.is_empty() {
                    continue;
                }
                b.push(
                    ConflictType::Certification,
                    ConflictSeverity::Error,
                    vec![job.job_id],
                    vec![worker_id],
                    Some(date),
                    format!(
                        "人员 {} 缺少作业 {} 所需资质: {}",
                        worker_id,
                        job.job_id,
                        missing.join(", ")
                    ),
                );
            }
        }
    }

    fn check_equipment_overlap(&self, snapshot: &PlanSnapshot, b: &mut ConflictBuilder) {
        for day in &snapshot.days {
            let mut per_equipment: BTreeMap<&str, Vec<JobId>> = BTreeMap::new();
            for job in snapshot.jobs_on_day(day.day_id) {
                if let Some(eq) = job.equipment_id.as_deref() {
                    per_equipment.entry(eq).or_default().push(job.job_id);
                }
            }
            for (equipment, job_ids) in per_equipment {
                if job_ids.len() <= self.thresholds.equipment_overlap_jobs {
                    continue;
                }
                b.push(
                    ConflictType::EquipmentOverlap,
                    ConflictSeverity::Info,
                    job_ids.clone(),
                    vec![],
                    Some(day.date),
                    format!(
                        "设备 {} 在 {} 安排了 {} 项作业",
                        equipment,
                        day.date,
                        job_ids.len()
                    ),
                );
            }
        }
    }

    fn check_sla(&self, snapshot: &PlanSnapshot, b: &mut ConflictBuilder) {
        let working = snapshot.plan.working_dates(self.thresholds.include_weekends);
        let tail_len = (self.thresholds.sla_tail_days.max(1) as usize).min(working.len());
        let tail_start = working
            .len()
            .checked_sub(tail_len)
            .and_then(|idx| working.get(idx).copied())
            .unwrap_or_else(|| snapshot.plan.week_end());
        for job in snapshot.jobs.values() {
            let date = snapshot.job_date(job.job_id);

            let tier = PriorityScorer::overdue_tier(job.overdue.as_ref());
            if tier != OverdueTier::None {
                let severity = if tier == OverdueTier::Critical {
                    ConflictSeverity::Error
                } else {
                    ConflictSeverity::Warning
                };
                let overdue = job.overdue.map(|o| format!("{} {}", o.magnitude, o.unit));
                b.push(
                    ConflictType::Sla,
                    severity,
                    vec![job.job_id],
                    job.assigned_worker_ids(),
                    date,
                    format!(
                        "作业 {} 已超期 {}",
                        job.job_id,
                        overdue.unwrap_or_default()
                    ),
                );
            }

            if self.thresholds.sla_tail_days > 0
                && matches!(job.priority, JobPriority::Urgent | JobPriority::High)
            {
                if let Some(date) = date.filter(|d| *d >= tail_start) {
                    b.push(
                        ConflictType::Sla,
                        ConflictSeverity::Warning,
                        vec![job.job_id],
                        job.assigned_worker_ids(),
                        Some(date),
                        format!(
                            "{} 优先级作业 {} 排在本周尾段 {}, 存在延误风险",
                            job.priority, job.job_id, date
                        ),
                    );
                }
            }
        }
    }

    fn check_dependencies(&self, snapshot: &PlanSnapshot, b: &mut ConflictBuilder) {
        let graph = DependencyGraph::from_dependencies(&snapshot.dependencies);
        for cycle in graph.detect_cycles() {
            let path: Vec<String> = cycle.iter().map(|id| id.to_string()).collect();
            b.push(
                ConflictType::Dependency,
                ConflictSeverity::Error,
                cycle,
                vec![],
                None,
                format!("作业依赖存在环: {}", path.join(" -> ")),
            );
        }

        for dep in graph.edges() {
            if dep.job_id == dep.depends_on_job_id
                || dep.dependency_type != DependencyType::FinishToStart
            {
                continue;
            }
            let (Some(job), Some(prereq)) =
                (snapshot.job(dep.job_id), snapshot.job(dep.depends_on_job_id))
            else {
                continue;
            };
            if Self::scheduled_before(snapshot, job, prereq) {
                b.push(
                    ConflictType::Dependency,
                    ConflictSeverity::Warning,
                    vec![dep.job_id, dep.depends_on_job_id],
                    vec![],
                    snapshot.job_date(dep.job_id),
                    format!(
                        "作业 {} 依赖作业 {} 完成后开始, 但排在其之前",
                        dep.job_id, dep.depends_on_job_id
                    ),
                );
            }
        }
    }

    /// a 是否排在 b 之前（更早日期, 或同日更靠前位置）
    fn scheduled_before(snapshot: &PlanSnapshot, a: &Job, b: &Job) -> bool {
        match (snapshot.job_date(a.job_id), snapshot.job_date(b.job_id)) {
            (Some(da), Some(db)) if da != db => da < db,
            (Some(_), Some(_)) => a.position < b.position,
            _ => false,
        }
    }
}

/// 冲突记录构造器
struct ConflictBuilder {
    plan_id: i64,
    now: NaiveDateTime,
    out: Vec<SchedulingConflict>,
}

impl ConflictBuilder {
    fn push(
        &mut self,
        conflict_type: ConflictType,
        severity: ConflictSeverity,
        mut job_ids: Vec<JobId>,
        mut worker_ids: Vec<WorkerId>,
        conflict_date: Option<NaiveDate>,
        message: String,
    ) {
        job_ids.sort_unstable();
        job_ids.dedup();
        worker_ids.sort_unstable();
        worker_ids.dedup();
        self.out.push(SchedulingConflict {
            conflict_id: Uuid::new_v4().to_string(),
            plan_id: self.plan_id,
            conflict_type,
            severity,
            status: ConflictStatus::Open,
            job_ids,
            worker_ids,
            conflict_date,
            message,
            detected_at: self.now,
            resolution_note: None,
            resolved_by: None,
            resolved_at: None,
        });
    }
}
