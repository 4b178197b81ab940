// ==========================================
// 泊位维修周计划排程系统 - 自动排程引擎
// ==========================================
// 职责: 将待排作业池按优先级贪心落位到计划日
// 输入: 计划快照 + 待排作业池 + 日上限/日期范围参数
// 输出: 落位列表 + 跳过列表 + 处理池大小 (不直接落库)
// ==========================================
// 红线:
// 1) 满足日上限的日期中选当前负载最低者, 同负载取最早日期
// 2) 全部超限时回退到全局负载最低日, 记为软溢出, 不丢弃作业
// 3) 无可用日期时记为跳过 (NoEligibleDay), 不中断其余作业
// 4) 相同快照 + 相同参数 ⇒ 相同结果
// ==========================================

use crate::domain::pending::PendingJob;
use crate::domain::plan::{Assignment, JobDraft, PlanDay, PlanSnapshot};
use crate::domain::types::{Berth, DayId, PendingJobId, WorkerId};
use crate::domain::worker::WorkerRoster;
use crate::engine::capacity_model::CapacityModel;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::priority::PriorityScorer;
use crate::engine::worker_matcher::{MatchRequest, WorkerMatcher, WorkloadLedger};
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// 浮点比较容差
const EPSILON: f64 = 1e-9;

/// 默认日上限（小时）
pub const DEFAULT_DAY_CEILING_HOURS: f64 = 8.0;

// ==========================================
// AutoScheduleParams - 排程参数
// ==========================================
#[derive(Debug, Clone)]
pub struct AutoScheduleParams {
    pub ceiling_hours: f64,
    pub include_weekends: bool,
    pub horizon_from: Option<NaiveDate>,
    pub horizon_to: Option<NaiveDate>,
    pub berth_filter: Option<Berth>,
    pub assign_workers: bool,
    pub today: NaiveDate,
}

impl AutoScheduleParams {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            ceiling_hours: DEFAULT_DAY_CEILING_HOURS,
            include_weekends: false,
            horizon_from: None,
            horizon_to: None,
            berth_filter: None,
            assign_workers: false,
            today,
        }
    }

    /// 计划日是否在排程范围内（今日之前的日期不可排）
    pub fn is_eligible(&self, day: &PlanDay) -> bool {
        if day.date < self.today || (!self.include_weekends && day.is_weekend()) {
            return false;
        }
        self.horizon_from.map_or(true, |from| day.date >= from)
            && self.horizon_to.map_or(true, |to| day.date <= to)
    }

    fn validate(&self) -> EngineResult<()> {
        if !self.ceiling_hours.is_finite() || self.ceiling_hours <= 0.0 {
            return Err(EngineError::Validation(format!(
                "日上限必须大于0: {}",
                self.ceiling_hours
            )));
        }
        if let (Some(from), Some(to)) = (self.horizon_from, self.horizon_to) {
            if from > to {
                return Err(EngineError::Validation(format!(
                    "排程范围无效: {} > {}",
                    from, to
                )));
            }
        }
        Ok(())
    }
}

// ==========================================
// BerthLoadLedger - 泊位日负载台账
// ==========================================
// East/West/Both/None 各自独立累计
// Both 作业负载 = max(East, West, Both); 其余 = 自身 + Both
#[derive(Debug, Clone, Default)]
pub struct BerthLoadLedger {
    loads: HashMap<(NaiveDate, Berth), f64>,
}

impl BerthLoadLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由快照已有作业构建
    pub fn from_snapshot(snapshot: &PlanSnapshot) -> Self {
        let mut ledger = Self::new();
        for job in snapshot.jobs.values() {
            if let Some(day) = snapshot.day(job.day_id) {
                ledger.add(day.date, job.berth, job.estimated_hours);
            }
        }
        ledger
    }

    pub fn add(&mut self, date: NaiveDate, berth: Berth, hours: f64) {
        *self.loads.entry((date, berth)).or_insert(0.0) += hours;
    }

    fn accumulator(&self, date: NaiveDate, berth: Berth) -> f64 {
        self.loads.get(&(date, berth)).copied().unwrap_or(0.0)
    }

    /// 某泊位在某日的当前负载
    pub fn load_for(&self, date: NaiveDate, berth: Berth) -> f64 {
        match berth {
            Berth::Both => self
                .accumulator(date, Berth::East)
                .max(self.accumulator(date, Berth::West))
                .max(self.accumulator(date, Berth::Both)),
            other => self.accumulator(date, other) + self.accumulator(date, Berth::Both),
        }
    }
}

// ==========================================
// 结果类型
// ==========================================

/// 日期选择结果
#[derive(Debug, Clone, PartialEq)]
pub struct DayChoice {
    pub day_id: DayId,
    pub date: NaiveDate,
    pub load_before: f64,
    pub overflow: bool,
}

/// 单个作业落位
#[derive(Debug, Clone, Serialize)]
pub struct JobPlacement {
    pub pending_id: PendingJobId,
    pub date: NaiveDate,
    pub job: JobDraft,
    pub score: i64,
    pub overflow: bool, // 软溢出（超过日上限）
    pub load_after: f64,
}

impl JobPlacement {
    pub fn lead_worker(&self) -> Option<WorkerId> {
        self.job
            .assignments
            .iter()
            .find(|a| a.is_lead)
            .map(|a| a.worker_id)
    }
}

/// 跳过原因（非致命）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    NoEligibleDay,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoEligibleDay => write!(f, "NO_ELIGIBLE_DAY"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedJob {
    pub pending_id: PendingJobId,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AutoScheduleResult {
    pub placements: Vec<JobPlacement>,
    pub skipped: Vec<SkippedJob>,
    pub pool_size: usize,
    pub overflow_count: usize,
    pub unassigned_count: usize, // 启用人员匹配但无合格人员的作业数
}

/// 人员匹配上下文（可选增强）
#[derive(Debug, Clone, Copy)]
pub struct WorkerContext<'a> {
    pub roster: &'a WorkerRoster,
    pub capacity: &'a CapacityModel,
}

// ==========================================
// AutoScheduler - 自动排程引擎
// ==========================================
pub struct AutoScheduler {
    scorer: PriorityScorer,
    matcher: WorkerMatcher,
}

impl Default for AutoScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoScheduler {
    pub fn new() -> Self {
        Self {
            scorer: PriorityScorer::new(),
            matcher: WorkerMatcher::new(),
        }
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 执行自动排程
    ///
    /// # 参数
    /// - `snapshot`: 目标计划快照（只读）
    /// - `pool`: 待排作业池
    /// - `params`: 日上限 / 日期范围 / 泊位过滤
    /// - `workers`: 人员匹配上下文（`params.assign_workers` 为 true 时使用）
    ///
    /// # 返回
    /// - `Ok(AutoScheduleResult)`: 全部落位与跳过
    /// - `Err`: 输入校验失败或引用不存在（无任何落位）
    #[instrument(skip_all, fields(
        plan_id = snapshot.plan_id(),
        pool = pool.len(),
        ceiling = params.ceiling_hours
    ))]
    pub fn schedule(
        &self,
        snapshot: &PlanSnapshot,
        pool: &[PendingJob],
        params: &AutoScheduleParams,
        workers: Option<WorkerContext<'_>>,
    ) -> EngineResult<AutoScheduleResult> {
        snapshot.ensure_editable()?;
        params.validate()?;

        // 1. 过滤 + 校验
        let mut candidates: Vec<&PendingJob> = pool
            .iter()
            .filter(|p| p.is_pending())
            .filter(|p| params.berth_filter.map_or(true, |b| p.berth == b))
            .collect();
        for pending in &candidates {
            pending.validate()?;
            if let Some(template_id) = pending.template_id {
                if !snapshot.templates.contains_key(&template_id) {
                    return Err(EngineError::not_found("JobTemplate", template_id));
                }
            }
        }

        // 2. 评分排序
        self.scorer.sort_refs(&mut candidates, params.today);

        let eligible_days: Vec<&PlanDay> =
            snapshot.days.iter().filter(|d| params.is_eligible(d)).collect();

        let mut berth_ledger = BerthLoadLedger::from_snapshot(snapshot);
        let mut workload = WorkloadLedger::from_snapshot(snapshot);
        let mut next_positions: HashMap<DayId, i32> = snapshot
            .days
            .iter()
            .map(|d| (d.day_id, snapshot.next_position(d.day_id)))
            .collect();

        let mut result = AutoScheduleResult {
            pool_size: candidates.len(),
            ..Default::default()
        };

        // 3. 逐个落位
        for pending in candidates {
            let Some(choice) = self.select_day(
                &berth_ledger,
                &eligible_days,
                pending.berth,
                pending.estimated_hours,
                params.ceiling_hours,
            ) else {
                debug!(pending_id = pending.pending_id, "无可用计划日, 跳过");
                result.skipped.push(SkippedJob {
                    pending_id: pending.pending_id,
                    reason: SkipReason::NoEligibleDay,
                });
                continue;
            };

            let position = next_positions.entry(choice.day_id).or_insert(1);
            let template = pending
                .template_id
                .and_then(|id| snapshot.templates.get(&id));
            let mut draft = JobDraft::from_pending(pending, choice.day_id, *position, template);
            *position += 1;

            berth_ledger.add(choice.date, pending.berth, pending.estimated_hours);

            if params.assign_workers {
                if let Some(ctx) = workers {
                    let empty: Vec<String> = Vec::new();
                    let request = MatchRequest {
                        date: choice.date,
                        kind: pending.kind,
                        berth: pending.berth,
                        equipment_id: pending.equipment_id.as_deref(),
                        estimated_hours: pending.estimated_hours,
                        required_skills: template.map_or(&empty, |t| &t.required_skills),
                        required_certifications: template
                            .map_or(&empty, |t| &t.required_certifications),
                        exclude: &[],
                    };
                    match self.matcher.best(&request, ctx.roster, ctx.capacity, &workload) {
                        Some(best) => {
                            draft.assignments.push(Assignment {
                                worker_id: best.worker_id,
                                is_lead: true,
                            });
                            workload.record(
                                best.worker_id,
                                choice.date,
                                pending.estimated_hours,
                                pending.berth,
                                pending.equipment_id.as_deref(),
                            );
                        }
                        None => result.unassigned_count += 1,
                    }
                }
            }

            if choice.overflow {
                warn!(
                    pending_id = pending.pending_id,
                    date = %choice.date,
                    load_before = choice.load_before,
                    hours = pending.estimated_hours,
                    "所有计划日均超日上限, 软溢出到负载最低日"
                );
                result.overflow_count += 1;
            }

            result.placements.push(JobPlacement {
                pending_id: pending.pending_id,
                date: choice.date,
                score: self.scorer.score(pending, params.today),
                overflow: choice.overflow,
                load_after: berth_ledger.load_for(choice.date, pending.berth),
                job: draft,
            });
        }

        info!(
            placed = result.placements.len(),
            skipped = result.skipped.len(),
            overflow = result.overflow_count,
            "自动排程完成"
        );
        Ok(result)
    }

    /// 选择落位日期
    ///
    /// # 返回
    /// - `Some(DayChoice)`: 所选日期（overflow 标记是否超上限）
    /// - `None`: 无可用日期
    pub fn select_day(
        &self,
        ledger: &BerthLoadLedger,
        days: &[&PlanDay],
        berth: Berth,
        hours: f64,
        ceiling: f64,
    ) -> Option<DayChoice> {
        let loads: Vec<(&PlanDay, f64)> = days
            .iter()
            .map(|d| (*d, ledger.load_for(d.date, berth)))
            .collect();

        let fitting = least_loaded(
            loads
                .iter()
                .copied()
                .filter(|(_, load)| load + hours <= ceiling + EPSILON),
        );
        if let Some((day, load)) = fitting {
            return Some(DayChoice {
                day_id: day.day_id,
                date: day.date,
                load_before: load,
                overflow: false,
            });
        }

        least_loaded(loads.iter().copied()).map(|(day, load)| DayChoice {
            day_id: day.day_id,
            date: day.date,
            load_before: load,
            overflow: true,
        })
    }
}

/// 负载最低日（同负载取最早日期）
fn least_loaded<'d>(
    items: impl Iterator<Item = (&'d PlanDay, f64)>,
) -> Option<(&'d PlanDay, f64)> {
    items.min_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.date.cmp(&b.0.date))
    })
}
