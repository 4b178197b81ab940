// ==========================================
// 泊位维修周计划排程系统 - 优先级评分引擎
// ==========================================
// 职责: 将优先级 + 超期量 + 要求日期折算为单一可比分数
// 红线: 纯函数, 确定性排序 (分数降序 → 要求日期升序 → id 升序)
// ==========================================

use crate::domain::pending::PendingJob;
use crate::domain::plan::Job;
use crate::domain::types::{JobPriority, Overdue, OverdueTier, OverdueUnit};
use chrono::NaiveDate;
use std::cmp::Ordering;

/// 严重超期阈值（小时）
pub const CRITICAL_OVERDUE_HOURS: f64 = 100.0;
/// 严重超期阈值（天）
pub const CRITICAL_OVERDUE_DAYS: f64 = 7.0;
/// 临近要求日期窗口（天）
pub const DUE_SOON_DAYS: i64 = 3;

const OVERDUE_CRITICAL_BONUS: i64 = 1000;
const OVERDUE_BONUS: i64 = 500;
const PAST_DUE_BONUS: i64 = 200;
const DUE_SOON_BONUS: i64 = 100;

/// 评分所需的作业事实（待排作业与已排作业共用）
pub trait PriorityFacts {
    fn priority(&self) -> JobPriority;
    fn overdue(&self) -> Option<Overdue>;
    fn required_date(&self) -> Option<NaiveDate>;
    fn sort_id(&self) -> i64;
}

impl PriorityFacts for Job {
    fn priority(&self) -> JobPriority {
        self.priority
    }
    fn overdue(&self) -> Option<Overdue> {
        self.overdue
    }
    fn required_date(&self) -> Option<NaiveDate> {
        self.required_date
    }
    fn sort_id(&self) -> i64 {
        self.job_id
    }
}

impl PriorityFacts for PendingJob {
    fn priority(&self) -> JobPriority {
        self.priority
    }
    fn overdue(&self) -> Option<Overdue> {
        self.overdue
    }
    fn required_date(&self) -> Option<NaiveDate> {
        self.required_date
    }
    fn sort_id(&self) -> i64 {
        self.pending_id
    }
}

// ==========================================
// PriorityScorer - 优先级评分引擎
// ==========================================
pub struct PriorityScorer {
    // 无状态引擎
}

impl Default for PriorityScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl PriorityScorer {
    pub fn new() -> Self {
        Self {}
    }

    /// 优先级基础分
    pub fn base_score(priority: JobPriority) -> i64 {
        match priority {
            JobPriority::Urgent => 400,
            JobPriority::High => 300,
            JobPriority::Normal => 200,
            JobPriority::Low => 100,
        }
    }

    /// 判定超期等级（SLA 冲突严重度复用）
    pub fn overdue_tier(overdue: Option<&Overdue>) -> OverdueTier {
        match overdue {
            Some(o) if o.is_positive() => {
                let critical = match o.unit {
                    OverdueUnit::Hours => o.magnitude > CRITICAL_OVERDUE_HOURS,
                    OverdueUnit::Days => o.magnitude > CRITICAL_OVERDUE_DAYS,
                };
                if critical {
                    OverdueTier::Critical
                } else {
                    OverdueTier::Overdue
                }
            }
            _ => OverdueTier::None,
        }
    }

    /// 计算分数
    ///
    /// # 参数
    /// - `job`: 作业事实
    /// - `today`: 评估基准日
    pub fn score<J: PriorityFacts + ?Sized>(&self, job: &J, today: NaiveDate) -> i64 {
        let overdue = job.overdue();
        let overdue_bonus = match Self::overdue_tier(overdue.as_ref()) {
            OverdueTier::Critical => OVERDUE_CRITICAL_BONUS,
            OverdueTier::Overdue => OVERDUE_BONUS,
            OverdueTier::None => 0,
        };

        let due_bonus = match job.required_date() {
            Some(date) if date < today => PAST_DUE_BONUS,
            Some(date) if (date - today).num_days() <= DUE_SOON_DAYS => DUE_SOON_BONUS,
            _ => 0,
        };

        Self::base_score(job.priority()) + overdue_bonus + due_bonus
    }

    /// 比较两个作业（Less = a 排在前面）
    pub fn compare<J: PriorityFacts + ?Sized>(&self, a: &J, b: &J, today: NaiveDate) -> Ordering {
        self.score(b, today)
            .cmp(&self.score(a, today))
            .then_with(|| match (a.required_date(), b.required_date()) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| a.sort_id().cmp(&b.sort_id()))
    }

    /// 排序（按优先级从高到低）
    pub fn sort<J: PriorityFacts>(&self, items: &mut [J], today: NaiveDate) {
        items.sort_by(|a, b| self.compare(a, b, today));
    }

    /// 排序引用列表
    pub fn sort_refs<J: PriorityFacts>(&self, items: &mut [&J], today: NaiveDate) {
        items.sort_by(|a, b| self.compare(*a, *b, today));
    }
}
