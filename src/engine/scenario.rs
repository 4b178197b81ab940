// ==========================================
// 泊位维修周计划排程系统 - 场景模拟引擎
// ==========================================
// 职责: 对已提交计划施加假设扰动, 只重算受影响区域
// 扰动类型:
//   - WorkerAbsence: 人员缺勤, 为其今日起的作业推荐替代人员
//   - JobDelay: 作业延误, 同日后续作业与后续日期的依赖作业级联顺延
//   - NewJob: 插入新作业, 寻找有余量的日期
// 红线: 只读快照, 不修改真实计划
// ==========================================

use crate::domain::pending::PendingJob;
use crate::domain::plan::{PlanDay, PlanSnapshot};
use crate::domain::types::{
    Berth, DayId, JobId, JobKind, JobPriority, PendingJobStatus, TemplateId, WorkerId,
};
use crate::domain::worker::WorkerRoster;
use crate::engine::auto_scheduler::{AutoScheduler, BerthLoadLedger};
use crate::engine::capacity_model::CapacityModel;
use crate::engine::dependency_graph::DependencyGraph;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::worker_matcher::{MatchRequest, WorkerMatcher, WorkloadLedger};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, instrument};

/// 每个作业最多给出的替代人员数
pub const MAX_REPLACEMENT_SUGGESTIONS: usize = 3;

const EPSILON: f64 = 1e-9;

// ==========================================
// 输入
// ==========================================

/// 新作业描述
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJobSpec {
    pub title: String,
    pub kind: JobKind,
    pub berth: Berth,
    pub equipment_id: Option<String>,
    pub estimated_hours: f64,
    pub priority: JobPriority,
    pub template_id: Option<TemplateId>,
}

/// 扰动
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Perturbation {
    WorkerAbsence { worker_id: WorkerId },
    JobDelay { job_id: JobId, hours: f64 },
    NewJob(NewJobSpec),
}

/// 模拟上下文（只读）
#[derive(Debug, Clone, Copy)]
pub struct ScenarioContext<'a> {
    pub snapshot: &'a PlanSnapshot,
    pub roster: &'a WorkerRoster,
    pub capacity: &'a CapacityModel,
    pub today: NaiveDate,
    pub ceiling_hours: f64,
    pub include_weekends: bool,
}

// ==========================================
// 输出
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImpactKind {
    NeedsReplacement, // 原执行人缺勤
    Delayed,          // 被延误作业本身
    CascadeDelayed,   // 同日后续作业
    DependentDelayed, // 后续日期的依赖作业
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplacementSuggestion {
    pub worker_id: WorkerId,
    pub worker_name: String,
    pub score: f64,
    pub fully_certified: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AffectedJob {
    pub job_id: JobId,
    pub date: Option<NaiveDate>,
    pub estimated_hours: f64,
    pub impact: ImpactKind,
    pub replacements: Vec<ReplacementSuggestion>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImpactSummary {
    pub jobs_affected: usize,
    pub workers_affected: usize,
    pub hours_affected: f64,
}

/// 新作业落位建议
#[derive(Debug, Clone, Serialize)]
pub struct ProposedSlot {
    pub day_id: DayId,
    pub date: NaiveDate,
    pub load_before: f64,
    pub overflow: bool,
    pub suggested_worker: Option<ReplacementSuggestion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub perturbation: Perturbation,
    pub affected_jobs: Vec<AffectedJob>,
    pub affected_workers: Vec<WorkerId>,
    pub summary: ImpactSummary,
    pub proposed_slot: Option<ProposedSlot>,
    pub feasible: bool,
    pub recommendations: Vec<String>,
}

// ==========================================
// ScenarioSimulator - 场景模拟引擎
// ==========================================
pub struct ScenarioSimulator {
    scheduler: AutoScheduler,
    matcher: WorkerMatcher,
}

impl Default for ScenarioSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioSimulator {
    pub fn new() -> Self {
        Self {
            scheduler: AutoScheduler::new(),
            matcher: WorkerMatcher::new(),
        }
    }

    /// 执行模拟
    #[instrument(skip_all, fields(plan_id = ctx.snapshot.plan_id()))]
    pub fn simulate(
        &self,
        ctx: &ScenarioContext<'_>,
        perturbation: &Perturbation,
    ) -> EngineResult<ScenarioResult> {
        let result = match perturbation {
            Perturbation::WorkerAbsence { worker_id } => self.worker_absence(ctx, *worker_id)?,
            Perturbation::JobDelay { job_id, hours } => self.job_delay(ctx, *job_id, *hours)?,
            Perturbation::NewJob(spec) => self.new_job(ctx, spec)?,
        };
        info!(
            jobs = result.summary.jobs_affected,
            workers = result.summary.workers_affected,
            hours = result.summary.hours_affected,
            feasible = result.feasible,
            "场景模拟完成"
        );
        Ok(result)
    }

    // ==========================================
    // 人员缺勤
    // ==========================================
    fn worker_absence(
        &self,
        ctx: &ScenarioContext<'_>,
        worker_id: WorkerId,
    ) -> EngineResult<ScenarioResult> {
        if ctx.roster.worker(worker_id).is_none() {
            return Err(EngineError::not_found("Worker", worker_id));
        }
        let snapshot = ctx.snapshot;

        let mut jobs: Vec<(NaiveDate, i32, JobId)> = snapshot
            .jobs
            .values()
            .filter(|j| j.is_assigned_to(worker_id))
            .filter_map(|j| snapshot.job_date(j.job_id).map(|d| (d, j.position, j.job_id)))
            .filter(|(date, _, _)| *date >= ctx.today)
            .collect();
        jobs.sort();

        // 缺勤人员在受影响日期不可用
        let mut roster = ctx.roster.clone();
        let mut ledger = WorkloadLedger::from_snapshot(snapshot);
        for (date, _, job_id) in &jobs {
            roster.absences.insert((worker_id, *date));
            if let Some(job) = snapshot.job(*job_id) {
                ledger.release(worker_id, *date, job.estimated_hours);
            }
        }

        let mut affected = Vec::new();
        let mut workers: BTreeSet<WorkerId> = BTreeSet::from([worker_id]);
        let mut recommendations = Vec::new();
        let mut all_covered = true;

        for (date, _, job_id) in jobs {
            let Some(job) = snapshot.job(job_id) else {
                continue;
            };
            let exclude = job.assigned_worker_ids();
            let request = MatchRequest {
                date,
                kind: job.kind,
                berth: job.berth,
                equipment_id: job.equipment_id.as_deref(),
                estimated_hours: job.estimated_hours,
                required_skills: snapshot.required_skills(job),
                required_certifications: snapshot.required_certifications(job),
                exclude: &exclude,
            };
            let ranked = self.matcher.rank(&request, &roster, ctx.capacity, &ledger);
            let replacements: Vec<ReplacementSuggestion> = ranked
                .iter()
                .take(MAX_REPLACEMENT_SUGGESTIONS)
                .map(|c| ReplacementSuggestion {
                    worker_id: c.worker_id,
                    worker_name: c.worker_name.clone(),
                    score: c.score,
                    fully_certified: c.fully_certified,
                })
                .collect();

            let note = match replacements.first() {
                Some(top) => {
                    ledger.record(
                        top.worker_id,
                        date,
                        job.estimated_hours,
                        job.berth,
                        job.equipment_id.as_deref(),
                    );
                    workers.insert(top.worker_id);
                    recommendations.push(format!(
                        "作业 {} ({}) 建议由 {} 接替",
                        job.job_id, date, top.worker_name
                    ));
                    None
                }
                None => {
                    all_covered = false;
                    let note = format!("作业 {} ({}) 无可用替代人员", job.job_id, date);
                    recommendations.push(note.clone());
                    Some(note)
                }
            };

            affected.push(AffectedJob {
                job_id: job.job_id,
                date: Some(date),
                estimated_hours: job.estimated_hours,
                impact: ImpactKind::NeedsReplacement,
                replacements,
                note,
            });
        }

        Ok(Self::finish(
            Perturbation::WorkerAbsence { worker_id },
            affected,
            workers,
            None,
            all_covered,
            recommendations,
        ))
    }

    // ==========================================
    // 作业延误
    // ==========================================
    fn job_delay(
        &self,
        ctx: &ScenarioContext<'_>,
        job_id: JobId,
        hours: f64,
    ) -> EngineResult<ScenarioResult> {
        if !hours.is_finite() || hours <= 0.0 {
            return Err(EngineError::Validation(format!("延误时长必须大于0: {}", hours)));
        }
        let snapshot = ctx.snapshot;
        let job = snapshot
            .job(job_id)
            .ok_or_else(|| EngineError::not_found("Job", job_id))?;
        let date = snapshot
            .job_date(job_id)
            .ok_or_else(|| EngineError::not_found("PlanDay", job.day_id))?;

        let mut affected = vec![AffectedJob {
            job_id,
            date: Some(date),
            estimated_hours: job.estimated_hours,
            impact: ImpactKind::Delayed,
            replacements: vec![],
            note: Some(format!("延误 {:.1}h", hours)),
        }];
        let mut seen: BTreeSet<JobId> = BTreeSet::from([job_id]);

        // 同日后续作业
        for later in snapshot
            .jobs_on_day(job.day_id)
            .into_iter()
            .filter(|j| j.position > job.position)
        {
            seen.insert(later.job_id);
            affected.push(AffectedJob {
                job_id: later.job_id,
                date: Some(date),
                estimated_hours: later.estimated_hours,
                impact: ImpactKind::CascadeDelayed,
                replacements: vec![],
                note: Some(format!("顺延 {:.1}h", hours)),
            });
        }

        // 后续日期的(传递)依赖作业
        let graph = DependencyGraph::from_dependencies(&snapshot.dependencies);
        for dependent in graph.transitive_dependents(job_id) {
            if seen.contains(&dependent) {
                continue;
            }
            let Some(dep_job) = snapshot.job(dependent) else {
                continue;
            };
            let Some(dep_date) = snapshot.job_date(dependent).filter(|d| *d > date) else {
                continue;
            };
            seen.insert(dependent);
            affected.push(AffectedJob {
                job_id: dependent,
                date: Some(dep_date),
                estimated_hours: dep_job.estimated_hours,
                impact: ImpactKind::DependentDelayed,
                replacements: vec![],
                note: Some(format!("依赖作业 {} 延误", job_id)),
            });
        }

        let workers: BTreeSet<WorkerId> = affected
            .iter()
            .filter_map(|a| snapshot.job(a.job_id))
            .flat_map(|j| j.assigned_worker_ids())
            .collect();

        let ledger = BerthLoadLedger::from_snapshot(snapshot);
        let load = ledger.load_for(date, job.berth);
        let feasible = load + hours <= ctx.ceiling_hours + EPSILON;
        let mut recommendations = Vec::new();
        if feasible {
            recommendations.push(format!(
                "{} 泊位 {} 负载 {:.1}h, 延误后 {:.1}h 仍在日上限内",
                date,
                job.berth,
                load,
                load + hours
            ));
        } else {
            recommendations.push(format!(
                "{} 泊位 {} 延误后 {:.1}h 超出日上限 {:.1}h",
                date,
                job.berth,
                load + hours,
                ctx.ceiling_hours
            ));
            let others: Vec<&PlanDay> = self
                .eligible_days(ctx)
                .into_iter()
                .filter(|d| d.day_id != job.day_id)
                .collect();
            if let Some(choice) = self.scheduler.select_day(
                &ledger,
                &others,
                job.berth,
                job.estimated_hours,
                ctx.ceiling_hours,
            ) {
                if !choice.overflow {
                    recommendations.push(format!(
                        "建议将作业 {} 移至 {} (当前负载 {:.1}h)",
                        job_id, choice.date, choice.load_before
                    ));
                }
            }
        }

        Ok(Self::finish(
            Perturbation::JobDelay { job_id, hours },
            affected,
            workers,
            None,
            feasible,
            recommendations,
        ))
    }

    // ==========================================
    // 新作业插入
    // ==========================================
    fn new_job(&self, ctx: &ScenarioContext<'_>, spec: &NewJobSpec) -> EngineResult<ScenarioResult> {
        let snapshot = ctx.snapshot;
        let candidate = PendingJob {
            pending_id: 0,
            source_ref: None,
            title: spec.title.clone(),
            kind: spec.kind,
            berth: spec.berth,
            equipment_id: spec.equipment_id.clone(),
            estimated_hours: spec.estimated_hours,
            priority: spec.priority,
            overdue: None,
            required_date: None,
            template_id: spec.template_id,
            defect_severity: None,
            status: PendingJobStatus::Pending,
        };
        candidate.validate()?;
        let template = match spec.template_id {
            Some(id) => Some(
                snapshot
                    .templates
                    .get(&id)
                    .ok_or_else(|| EngineError::not_found("JobTemplate", id))?,
            ),
            None => None,
        };

        let ledger = BerthLoadLedger::from_snapshot(snapshot);
        let days = self.eligible_days(ctx);
        let choice = self.scheduler.select_day(
            &ledger,
            &days,
            spec.berth,
            spec.estimated_hours,
            ctx.ceiling_hours,
        );

        let mut recommendations = Vec::new();
        let mut workers = BTreeSet::new();
        let slot = choice.map(|c| {
            let empty: Vec<String> = Vec::new();
            let request = MatchRequest {
                date: c.date,
                kind: spec.kind,
                berth: spec.berth,
                equipment_id: spec.equipment_id.as_deref(),
                estimated_hours: spec.estimated_hours,
                required_skills: template.map_or(&empty, |t| &t.required_skills),
                required_certifications: template.map_or(&empty, |t| &t.required_certifications),
                exclude: &[],
            };
            let workload = WorkloadLedger::from_snapshot(snapshot);
            let suggested = self
                .matcher
                .best(&request, ctx.roster, ctx.capacity, &workload)
                .map(|best| ReplacementSuggestion {
                    worker_id: best.worker_id,
                    worker_name: best.worker_name,
                    score: best.score,
                    fully_certified: best.fully_certified,
                });
            ProposedSlot {
                day_id: c.day_id,
                date: c.date,
                load_before: c.load_before,
                overflow: c.overflow,
                suggested_worker: suggested,
            }
        });

        let feasible = match &slot {
            Some(s) if !s.overflow => {
                recommendations.push(format!(
                    "建议排在 {} (泊位 {} 当前负载 {:.1}h)",
                    s.date, spec.berth, s.load_before
                ));
                if let Some(w) = &s.suggested_worker {
                    workers.insert(w.worker_id);
                    recommendations.push(format!("建议由 {} 执行", w.worker_name));
                }
                true
            }
            Some(s) => {
                recommendations.push(format!(
                    "所有可用日期均无足够余量, 负载最低日 {} 已排 {:.1}h",
                    s.date, s.load_before
                ));
                false
            }
            None => {
                recommendations.push("今日起无可用计划日".to_string());
                false
            }
        };

        let mut result = Self::finish(
            Perturbation::NewJob(spec.clone()),
            vec![],
            workers,
            slot,
            feasible,
            recommendations,
        );
        result.summary.hours_affected = spec.estimated_hours;
        Ok(result)
    }

    /// 今日起的可排日期
    fn eligible_days<'s>(&self, ctx: &ScenarioContext<'s>) -> Vec<&'s PlanDay> {
        ctx.snapshot
            .days
            .iter()
            .filter(|d| d.date >= ctx.today)
            .filter(|d| ctx.include_weekends || !d.is_weekend())
            .collect()
    }

    fn finish(
        perturbation: Perturbation,
        affected_jobs: Vec<AffectedJob>,
        workers: BTreeSet<WorkerId>,
        proposed_slot: Option<ProposedSlot>,
        feasible: bool,
        recommendations: Vec<String>,
    ) -> ScenarioResult {
        let summary = ImpactSummary {
            jobs_affected: affected_jobs.len(),
            workers_affected: workers.len(),
            hours_affected: affected_jobs.iter().map(|a| a.estimated_hours).sum(),
        };
        ScenarioResult {
            perturbation,
            affected_jobs,
            affected_workers: workers.into_iter().collect(),
            summary,
            proposed_slot,
            feasible,
            recommendations,
        }
    }
}
