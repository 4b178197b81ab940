// ==========================================
// 泊位维修周计划排程系统 - 排程冲突领域模型
// ==========================================
// 生命周期: Open → Resolved | Ignored (终态不可回退)
// 阻断规则: severity=error 且仍为 Open
// ==========================================

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::types::{
    ConflictSeverity, ConflictStatus, ConflictType, JobId, PlanId, WorkerId,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// SchedulingConflict - 排程冲突记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConflict {
    pub conflict_id: String,
    pub plan_id: PlanId,
    pub conflict_type: ConflictType,
    pub severity: ConflictSeverity,
    pub status: ConflictStatus,
    pub job_ids: Vec<JobId>,
    pub worker_ids: Vec<WorkerId>,
    pub conflict_date: Option<NaiveDate>,
    pub message: String,
    pub detected_at: NaiveDateTime,

    // ===== 处理信息 =====
    pub resolution_note: Option<String>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<NaiveDateTime>,
}

/// 冲突指纹: 用于判定两次检测是否为"同一条件"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConflictFingerprint {
    pub conflict_type: ConflictType,
    pub severity: ConflictSeverity,
    pub conflict_date: Option<NaiveDate>,
    pub job_ids: Vec<JobId>,
    pub worker_ids: Vec<WorkerId>,
}

impl SchedulingConflict {
    pub fn is_open(&self) -> bool {
        self.status == ConflictStatus::Open
    }

    /// 是否阻断发布
    pub fn is_blocking(&self) -> bool {
        self.severity == ConflictSeverity::Error && self.is_open()
    }

    pub fn fingerprint(&self) -> ConflictFingerprint {
        let mut job_ids = self.job_ids.clone();
        job_ids.sort_unstable();
        job_ids.dedup();
        let mut worker_ids = self.worker_ids.clone();
        worker_ids.sort_unstable();
        worker_ids.dedup();
        ConflictFingerprint {
            conflict_type: self.conflict_type,
            severity: self.severity,
            conflict_date: self.conflict_date,
            job_ids,
            worker_ids,
        }
    }

    /// 标记为已解决（需处理说明、处理人）
    pub fn resolve(&mut self, note: &str, resolved_by: &str, at: NaiveDateTime) -> DomainResult<()> {
        self.ensure_open(ConflictStatus::Resolved)?;
        if note.trim().is_empty() {
            return Err(DomainError::Validation("解决冲突必须填写处理说明".to_string()));
        }
        if resolved_by.trim().is_empty() {
            return Err(DomainError::Validation("解决冲突必须记录处理人".to_string()));
        }
        self.status = ConflictStatus::Resolved;
        self.resolution_note = Some(note.trim().to_string());
        self.resolved_by = Some(resolved_by.trim().to_string());
        self.resolved_at = Some(at);
        Ok(())
    }

    /// 标记为已忽略（确认知悉, 无需说明）
    pub fn ignore(&mut self, acknowledged_by: Option<&str>, at: NaiveDateTime) -> DomainResult<()> {
        self.ensure_open(ConflictStatus::Ignored)?;
        self.status = ConflictStatus::Ignored;
        self.resolved_by = acknowledged_by
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        self.resolved_at = Some(at);
        Ok(())
    }

    /// 作业删除后清理成员关系
    ///
    /// # 返回
    /// 清理后是否已无任何作业/人员引用（孤立记录）
    pub fn drop_job(&mut self, job_id: JobId) -> bool {
        self.job_ids.retain(|id| *id != job_id);
        self.job_ids.is_empty() && self.worker_ids.is_empty()
    }

    fn ensure_open(&self, to: ConflictStatus) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }
}

/// 筛选阻断性冲突
pub fn blocking_conflicts(conflicts: &[SchedulingConflict]) -> Vec<&SchedulingConflict> {
    conflicts.iter().filter(|c| c.is_blocking()).collect()
}
