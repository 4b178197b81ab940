// ==========================================
// 泊位维修周计划排程系统 - 负载均衡引擎
// ==========================================
// 职责: 对已分配人员的计划, 按日降低人员工时方差
// 输入: 计划快照 + 人员名册
// 输出: 调整建议列表 + 调整前后标准差 (不提交修改)
// ==========================================
// 规则:
// - 过载: 负载 > 均值 + 1h; 欠载: 负载 < 均值 - 1h
// - 可移动作业: 工时 <= 过载人员负载 - 均值, 接收人未在该作业上且资质齐全
// - 同一对人员优先移动工时最大的作业, 同工时取 job_id 最小
// ==========================================

use crate::domain::plan::PlanSnapshot;
use crate::domain::types::{DayId, JobId, WorkerId};
use crate::domain::worker::WorkerRoster;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, instrument};

/// 过载/欠载判定带宽（小时）
pub const IMBALANCE_BAND_HOURS: f64 = 1.0;

const EPSILON: f64 = 1e-9;

/// 调整建议
#[derive(Debug, Clone, Serialize)]
pub struct ProposedMove {
    pub job_id: JobId,
    pub day_id: DayId,
    pub date: NaiveDate,
    pub from_worker: WorkerId,
    pub to_worker: WorkerId,
    pub hours: f64,
    pub reason: String,
}

/// 单日均衡统计
#[derive(Debug, Clone, Serialize)]
pub struct DayBalance {
    pub day_id: DayId,
    pub date: NaiveDate,
    pub mean_hours: f64,
    pub std_dev_before: f64,
    pub std_dev_after: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BalanceResult {
    pub moves: Vec<ProposedMove>,
    pub days: Vec<DayBalance>,
    pub std_dev_before: f64,
    pub std_dev_after: f64,
    pub improvement_score: f64, // 0-100
}

/// 总体标准差
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

/// 改善分数 = 100 × (before - after) / before, 下限 0
pub fn improvement_score(before: f64, after: f64) -> f64 {
    if before <= EPSILON {
        return 0.0;
    }
    (100.0 * (before - after) / before).max(0.0)
}

// ==========================================
// WorkloadBalancer - 负载均衡引擎
// ==========================================
pub struct WorkloadBalancer {
    // 无状态引擎
}

impl Default for WorkloadBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkloadBalancer {
    pub fn new() -> Self {
        Self {}
    }

    /// 生成均衡建议
    #[instrument(skip_all, fields(plan_id = snapshot.plan_id(), jobs = snapshot.jobs.len()))]
    pub fn balance(&self, snapshot: &PlanSnapshot, roster: &WorkerRoster) -> BalanceResult {
        let mut result = BalanceResult::default();
        let mut all_before = Vec::new();
        let mut all_after = Vec::new();

        for day in &snapshot.days {
            let jobs = snapshot.jobs_on_day(day.day_id);
            // 当日各人员工时
            let mut loads: BTreeMap<WorkerId, f64> = BTreeMap::new();
            for job in &jobs {
                for worker_id in job.assigned_worker_ids() {
                    *loads.entry(worker_id).or_insert(0.0) += job.estimated_hours;
                }
            }
            if loads.is_empty() {
                continue;
            }

            let before: Vec<f64> = loads.values().copied().collect();
            let mean = before.iter().sum::<f64>() / before.len() as f64;
            let day_std_before = std_dev(&before);

            // 当日工作副本: 作业 → 人员集合
            let mut crews: BTreeMap<JobId, HashSet<WorkerId>> = jobs
                .iter()
                .map(|j| (j.job_id, j.assigned_worker_ids().into_iter().collect()))
                .collect();
            let mut moved: HashSet<JobId> = HashSet::new();

            let mut overloaded: Vec<WorkerId> = loads
                .iter()
                .filter(|(_, l)| **l > mean + IMBALANCE_BAND_HOURS + EPSILON)
                .map(|(w, _)| *w)
                .collect();
            overloaded.sort_by(|a, b| {
                loads[b]
                    .partial_cmp(&loads[a])
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.cmp(b))
            });
            let mut underloaded: Vec<WorkerId> = loads
                .iter()
                .filter(|(_, l)| **l < mean - IMBALANCE_BAND_HOURS - EPSILON)
                .map(|(w, _)| *w)
                .collect();
            underloaded.sort_by(|a, b| {
                loads[a]
                    .partial_cmp(&loads[b])
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.cmp(b))
            });

            for over in &overloaded {
                for under in &underloaded {
                    if !roster.is_available(*under, day.date) {
                        continue;
                    }
                    loop {
                        let over_load = loads[over];
                        let under_load = loads[under];
                        if over_load <= mean + IMBALANCE_BAND_HOURS + EPSILON
                            || under_load >= mean - IMBALANCE_BAND_HOURS - EPSILON
                        {
                            break;
                        }
                        let room = over_load - mean;
                        let candidate = jobs
                            .iter()
                            .filter(|j| !moved.contains(&j.job_id))
                            .filter(|j| crews.get(&j.job_id).map_or(false, |c| c.contains(over)))
                            .filter(|j| crews.get(&j.job_id).map_or(false, |c| !c.contains(under)))
                            .filter(|j| j.estimated_hours <= room + EPSILON)
                            .filter(|j| {
                                let required = snapshot.required_certifications(j);
                                required.is_empty()
                                    || roster.worker(*under).map_or(false, |w| {
                                        w.missing_certifications(required, day.date).is_empty()
                                    })
                            })
                            .max_by(|a, b| {
                                a.estimated_hours
                                    .partial_cmp(&b.estimated_hours)
                                    .unwrap_or(std::cmp::Ordering::Equal)
                                    .then_with(|| b.job_id.cmp(&a.job_id))
                            });
                        let Some(job) = candidate else {
                            break;
                        };

                        if let Some(crew) = crews.get_mut(&job.job_id) {
                            crew.remove(over);
                            crew.insert(*under);
                        }
                        moved.insert(job.job_id);
                        if let Some(l) = loads.get_mut(over) {
                            *l -= job.estimated_hours;
                        }
                        if let Some(l) = loads.get_mut(under) {
                            *l += job.estimated_hours;
                        }
                        debug!(
                            job_id = job.job_id,
                            from = over,
                            to = under,
                            hours = job.estimated_hours,
                            "建议转移作业"
                        );
                        result.moves.push(ProposedMove {
                            job_id: job.job_id,
                            day_id: day.day_id,
                            date: day.date,
                            from_worker: *over,
                            to_worker: *under,
                            hours: job.estimated_hours,
                            reason: format!(
                                "{} 人员 {} 负载 {:.1}h 高于均值 {:.1}h, 人员 {} 负载 {:.1}h 偏低",
                                day.date, over, over_load, mean, under, under_load
                            ),
                        });
                    }
                }
            }

            let after: Vec<f64> = loads.values().copied().collect();
            result.days.push(DayBalance {
                day_id: day.day_id,
                date: day.date,
                mean_hours: mean,
                std_dev_before: day_std_before,
                std_dev_after: std_dev(&after),
            });
            all_before.extend(before);
            all_after.extend(after);
        }

        result.std_dev_before = std_dev(&all_before);
        result.std_dev_after = std_dev(&all_after);
        result.improvement_score = improvement_score(result.std_dev_before, result.std_dev_after);

        info!(
            moves = result.moves.len(),
            before = result.std_dev_before,
            after = result.std_dev_after,
            "负载均衡建议生成完成"
        );
        result
    }
}
