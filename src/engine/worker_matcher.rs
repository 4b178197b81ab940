// ==========================================
// 泊位维修周计划排程系统 - 人员匹配引擎
// ==========================================
// 职责: 为单个作业挑选最合适的可用人员
// 评分: 技能匹配 + 资质覆盖 + 同泊位连续 + 同设备连续 + 负载倒数
// 红线: 缺勤人员、超出 (加班阈值+加班上限) 或超出日作业数的人员不参与
// ==========================================

use crate::domain::capacity::CapacityLimits;
use crate::domain::plan::PlanSnapshot;
use crate::domain::types::{Berth, JobKind, WorkerId};
use crate::domain::worker::{WorkerProfile, WorkerRoster};
use crate::engine::capacity_model::CapacityModel;
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

const SKILL_MATCH_WEIGHT: f64 = 10.0;
const SPECIALIZATION_WEIGHT: f64 = 5.0;
const CERTIFICATION_WEIGHT: f64 = 20.0;
const SAME_BERTH_WEIGHT: f64 = 8.0;
const HOME_BERTH_WEIGHT: f64 = 4.0;
const SAME_EQUIPMENT_WEIGHT: f64 = 6.0;
const LOAD_WEIGHT: f64 = 10.0;

// ==========================================
// WorkloadLedger - 人员负载台账
// ==========================================
// 按 (人员, 日期) 累计工时/作业数/泊位, 按人员累计本周设备
#[derive(Debug, Clone, Default)]
pub struct WorkloadLedger {
    hours: HashMap<(WorkerId, NaiveDate), f64>,
    jobs: HashMap<(WorkerId, NaiveDate), u32>,
    berths: HashMap<(WorkerId, NaiveDate), BTreeSet<Berth>>,
    equipment: HashMap<WorkerId, BTreeSet<String>>,
}

impl WorkloadLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由计划快照中已有分配构建
    pub fn from_snapshot(snapshot: &PlanSnapshot) -> Self {
        let mut ledger = Self::new();
        for job in snapshot.jobs.values() {
            let Some(date) = snapshot.day(job.day_id).map(|d| d.date) else {
                continue;
            };
            for worker_id in job.assigned_worker_ids() {
                ledger.record(
                    worker_id,
                    date,
                    job.estimated_hours,
                    job.berth,
                    job.equipment_id.as_deref(),
                );
            }
        }
        ledger
    }

    pub fn record(
        &mut self,
        worker_id: WorkerId,
        date: NaiveDate,
        hours: f64,
        berth: Berth,
        equipment_id: Option<&str>,
    ) {
        *self.hours.entry((worker_id, date)).or_insert(0.0) += hours;
        *self.jobs.entry((worker_id, date)).or_insert(0) += 1;
        if berth != Berth::None {
            self.berths
                .entry((worker_id, date))
                .or_default()
                .insert(berth);
        }
        if let Some(eq) = equipment_id {
            self.equipment
                .entry(worker_id)
                .or_default()
                .insert(eq.to_string());
        }
    }

    /// 撤销一次记录（设备连续性保留, 本周已接触过即视为熟悉）
    pub fn release(&mut self, worker_id: WorkerId, date: NaiveDate, hours: f64) {
        if let Some(h) = self.hours.get_mut(&(worker_id, date)) {
            *h = (*h - hours).max(0.0);
        }
        if let Some(n) = self.jobs.get_mut(&(worker_id, date)) {
            *n = n.saturating_sub(1);
        }
    }

    pub fn hours_on(&self, worker_id: WorkerId, date: NaiveDate) -> f64 {
        self.hours.get(&(worker_id, date)).copied().unwrap_or(0.0)
    }

    pub fn jobs_on(&self, worker_id: WorkerId, date: NaiveDate) -> u32 {
        self.jobs.get(&(worker_id, date)).copied().unwrap_or(0)
    }

    pub fn worked_berth(&self, worker_id: WorkerId, date: NaiveDate, berth: Berth) -> bool {
        if berth == Berth::None {
            return false;
        }
        self.berths
            .get(&(worker_id, date))
            .map_or(false, |set| set.contains(&berth))
    }

    pub fn touched_equipment(&self, worker_id: WorkerId, equipment_id: &str) -> bool {
        self.equipment
            .get(&worker_id)
            .map_or(false, |set| set.contains(equipment_id))
    }
}

// ==========================================
// MatchRequest - 匹配请求
// ==========================================
#[derive(Debug, Clone)]
pub struct MatchRequest<'a> {
    pub date: NaiveDate,
    pub kind: JobKind,
    pub berth: Berth,
    pub equipment_id: Option<&'a str>,
    pub estimated_hours: f64,
    pub required_skills: &'a [String],
    pub required_certifications: &'a [String],
    pub exclude: &'a [WorkerId],
}

/// 候选人评分结果
#[derive(Debug, Clone, Serialize)]
pub struct CandidateScore {
    pub worker_id: WorkerId,
    pub worker_name: String,
    pub score: f64,
    pub fully_certified: bool,
    pub reasons: Vec<String>,
}

// ==========================================
// WorkerMatcher - 人员匹配引擎
// ==========================================
pub struct WorkerMatcher {
    // 无状态引擎
}

impl Default for WorkerMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerMatcher {
    pub fn new() -> Self {
        Self {}
    }

    /// 候选人排序（分数降序, 同分按 worker_id 升序）
    ///
    /// # 参数
    /// - `request`: 作业需求
    /// - `roster`: 人员名册（含缺勤）
    /// - `capacity`: 产能模型
    /// - `ledger`: 当前负载台账
    pub fn rank(
        &self,
        request: &MatchRequest<'_>,
        roster: &WorkerRoster,
        capacity: &CapacityModel,
        ledger: &WorkloadLedger,
    ) -> Vec<CandidateScore> {
        let mut candidates: Vec<CandidateScore> = roster
            .available_on(request.date)
            .into_iter()
            .filter(|w| !request.exclude.contains(&w.worker_id))
            .filter_map(|w| {
                let limits = capacity.limits_for(w, request.date);
                limits
                    .can_take(
                        ledger.hours_on(w.worker_id, request.date),
                        ledger.jobs_on(w.worker_id, request.date),
                        request.estimated_hours,
                    )
                    .then(|| self.score_worker(w, request, ledger, &limits))
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.worker_id.cmp(&b.worker_id))
        });

        debug!(
            date = %request.date,
            berth = %request.berth,
            candidates = candidates.len(),
            "人员候选排序完成"
        );
        candidates
    }

    /// 最佳候选人
    pub fn best(
        &self,
        request: &MatchRequest<'_>,
        roster: &WorkerRoster,
        capacity: &CapacityModel,
        ledger: &WorkloadLedger,
    ) -> Option<CandidateScore> {
        self.rank(request, roster, capacity, ledger).into_iter().next()
    }

    fn score_worker(
        &self,
        worker: &WorkerProfile,
        request: &MatchRequest<'_>,
        ledger: &WorkloadLedger,
        limits: &CapacityLimits,
    ) -> CandidateScore {
        let mut score = 0.0;
        let mut reasons = Vec::new();

        // 技能: 模板声明技能逐项匹配, 否则按作业类型专业标签
        if request.required_skills.is_empty() {
            if worker.has_specialization(request.kind.specialization_tag()) {
                score += SPECIALIZATION_WEIGHT;
                reasons.push(format!("专业匹配 {}", request.kind.specialization_tag()));
            }
        } else {
            let matched = request
                .required_skills
                .iter()
                .filter(|s| worker.has_specialization(s))
                .count();
            if matched > 0 {
                score += SKILL_MATCH_WEIGHT * matched as f64;
                reasons.push(format!(
                    "技能匹配 {}/{}",
                    matched,
                    request.required_skills.len()
                ));
            }
        }

        let fully_certified = worker
            .missing_certifications(request.required_certifications, request.date)
            .is_empty();
        if fully_certified && !request.required_certifications.is_empty() {
            score += CERTIFICATION_WEIGHT;
            reasons.push("资质齐全".to_string());
        }

        if ledger.worked_berth(worker.worker_id, request.date, request.berth) {
            score += SAME_BERTH_WEIGHT;
            reasons.push(format!("当日同泊位 {}", request.berth));
        } else if request.berth != Berth::None && worker.home_berth == Some(request.berth) {
            score += HOME_BERTH_WEIGHT;
            reasons.push(format!("常驻泊位 {}", request.berth));
        }

        if let Some(eq) = request.equipment_id {
            if ledger.touched_equipment(worker.worker_id, eq) {
                score += SAME_EQUIPMENT_WEIGHT;
                reasons.push(format!("本周同设备 {}", eq));
            }
        }

        let current = ledger.hours_on(worker.worker_id, request.date);
        score += LOAD_WEIGHT / (1.0 + current);
        reasons.push(format!("当日已排 {:.1}h", current));
        let overtime = limits.overtime_hours(current + request.estimated_hours);
        if overtime > 0.0 {
            reasons.push(format!("需加班 {:.1}h", overtime));
        }

        CandidateScore {
            worker_id: worker.worker_id,
            worker_name: worker.name.clone(),
            score,
            fully_certified,
            reasons,
        }
    }
}
