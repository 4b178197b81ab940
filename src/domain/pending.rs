// ==========================================
// 泊位维修周计划排程系统 - 待排作业池领域模型
// ==========================================
// 外部工单导入后沉淀为 PendingJob, 落位后标记为 Scheduled
// ==========================================

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::types::{
    Berth, DefectSeverity, JobKind, JobPriority, Overdue, PendingJobId, PendingJobStatus,
    TemplateId,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// PendingJob - 待排作业
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingJob {
    pub pending_id: PendingJobId,
    pub source_ref: Option<String>, // 外部工单号
    pub title: String,
    pub kind: JobKind,
    pub berth: Berth,
    pub equipment_id: Option<String>,
    pub estimated_hours: f64,
    pub priority: JobPriority,
    pub overdue: Option<Overdue>,
    pub required_date: Option<NaiveDate>,
    pub template_id: Option<TemplateId>,
    pub defect_severity: Option<DefectSeverity>,
    pub status: PendingJobStatus,
}

impl PendingJob {
    pub fn is_pending(&self) -> bool {
        self.status == PendingJobStatus::Pending
    }

    /// 输入校验（工时必须为正、标题不能为空）
    pub fn validate(&self) -> DomainResult<()> {
        if !self.estimated_hours.is_finite() || self.estimated_hours <= 0.0 {
            return Err(DomainError::Validation(format!(
                "待排作业 {} 预估工时必须大于0: {}",
                self.pending_id, self.estimated_hours
            )));
        }
        if self.title.trim().is_empty() {
            return Err(DomainError::Validation(format!(
                "待排作业 {} 标题不能为空",
                self.pending_id
            )));
        }
        if let Some(overdue) = &self.overdue {
            if !overdue.magnitude.is_finite() || overdue.magnitude < 0.0 {
                return Err(DomainError::Validation(format!(
                    "待排作业 {} 超期量无效: {}",
                    self.pending_id, overdue.magnitude
                )));
            }
        }
        Ok(())
    }

    /// 标记为已落位
    pub fn mark_scheduled(&mut self) -> DomainResult<()> {
        if !self.is_pending() {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: PendingJobStatus::Scheduled.to_string(),
            });
        }
        self.status = PendingJobStatus::Scheduled;
        Ok(())
    }
}
