// ==========================================
// 泊位维修周计划排程系统 - 周计划领域模型
// ==========================================
// 所有权: Plan → Day → Job → Assignment (级联删除)
// 依赖与冲突通过 JobId 弱引用作业
// ==========================================

use crate::domain::conflict::{blocking_conflicts, SchedulingConflict};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::pending::PendingJob;
use crate::domain::types::{
    Berth, DayId, DefectSeverity, DependencyType, JobId, JobKind, JobPriority, Overdue, PlanId,
    PlanStatus, TemplateId, WorkerId,
};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ==========================================
// Plan - 周计划
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: PlanId,
    pub name: String,
    pub week_start: NaiveDate, // 周一
    pub status: PlanStatus,
    pub created_at: NaiveDateTime,
    pub published_at: Option<NaiveDateTime>,
}

impl Plan {
    /// 本周最后一天（周日）
    pub fn week_end(&self) -> NaiveDate {
        self.week_start + Duration::days(6)
    }

    /// 本周七天日期（周一至周日）
    pub fn week_dates(&self) -> Vec<NaiveDate> {
        (0..7).map(|i| self.week_start + Duration::days(i)).collect()
    }

    /// 本周可排日期（不含周末时跳过周六、周日）
    pub fn working_dates(&self, include_weekends: bool) -> Vec<NaiveDate> {
        self.week_dates()
            .into_iter()
            .filter(|d| include_weekends || !is_weekend(*d))
            .collect()
    }

    pub fn is_published(&self) -> bool {
        self.status == PlanStatus::Published
    }

    /// 发布计划
    ///
    /// # 参数
    /// - `conflicts`: 本计划当前冲突集合
    ///
    /// # 返回
    /// - `Err(PublishBlocked)`: 存在未处理的 error 级冲突
    pub fn publish(&mut self, conflicts: &[SchedulingConflict], at: NaiveDateTime) -> DomainResult<()> {
        if self.is_published() {
            return Err(DomainError::PlanReadOnly(self.plan_id));
        }
        let blocking = blocking_conflicts(conflicts)
            .into_iter()
            .filter(|c| c.plan_id == self.plan_id)
            .count();
        if blocking > 0 {
            return Err(DomainError::PublishBlocked { count: blocking });
        }
        self.status = PlanStatus::Published;
        self.published_at = Some(at);
        Ok(())
    }

    /// 校验周起始日必须为周一
    pub fn validate_week_start(week_start: NaiveDate) -> DomainResult<()> {
        if week_start.weekday() != Weekday::Mon {
            return Err(DomainError::Validation(format!(
                "周计划起始日必须为周一: {}",
                week_start
            )));
        }
        Ok(())
    }
}

// ==========================================
// PlanDay - 计划日
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDay {
    pub day_id: DayId,
    pub plan_id: PlanId,
    pub date: NaiveDate,
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

impl PlanDay {
    pub fn is_weekend(&self) -> bool {
        is_weekend(self.date)
    }
}

// ==========================================
// Assignment - 作业人员分配
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub worker_id: WorkerId,
    pub is_lead: bool,
}

// ==========================================
// MaterialRequirement - 物料需求
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRequirement {
    pub material_code: String,
    pub quantity: f64,
    pub unit: String,
}

// ==========================================
// JobTemplate - 作业模板
// ==========================================
// 提供所需技能/资质与物料清单
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobTemplate {
    pub template_id: TemplateId,
    pub name: String,
    pub required_skills: Vec<String>,
    pub required_certifications: Vec<String>,
    pub materials: Vec<MaterialRequirement>,
}

// ==========================================
// Job - 作业
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub day_id: DayId,
    pub position: i32, // 当日展示/执行顺序 (从1开始)
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
    pub assignments: Vec<Assignment>,
    pub materials: Vec<MaterialRequirement>,
}

impl Job {
    pub fn assigned_worker_ids(&self) -> Vec<WorkerId> {
        self.assignments.iter().map(|a| a.worker_id).collect()
    }

    pub fn is_assigned_to(&self, worker_id: WorkerId) -> bool {
        self.assignments.iter().any(|a| a.worker_id == worker_id)
    }

    pub fn lead_worker(&self) -> Option<WorkerId> {
        self.assignments
            .iter()
            .find(|a| a.is_lead)
            .map(|a| a.worker_id)
    }

    /// 分配人员（同一作业内同一人员至多出现一次）
    ///
    /// # 返回
    /// - `true`: 新增分配
    /// - `false`: 人员已在该作业上（仅更新 lead 标志）
    pub fn assign(&mut self, worker_id: WorkerId, is_lead: bool) -> bool {
        if is_lead {
            for a in self.assignments.iter_mut() {
                a.is_lead = false;
            }
        }
        if let Some(existing) = self
            .assignments
            .iter_mut()
            .find(|a| a.worker_id == worker_id)
        {
            existing.is_lead = is_lead;
            return false;
        }
        self.assignments.push(Assignment { worker_id, is_lead });
        true
    }

    /// 解除人员分配
    pub fn unassign(&mut self, worker_id: WorkerId) -> bool {
        let before = self.assignments.len();
        self.assignments.retain(|a| a.worker_id != worker_id);
        self.assignments.len() != before
    }
}

// ==========================================
// JobDraft - 待落库作业
// ==========================================
// 排程结果中的新作业: 尚无 job_id, 由写入端分配
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDraft {
    pub day_id: DayId,
    pub position: i32,
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
    pub assignments: Vec<Assignment>,
    pub materials: Vec<MaterialRequirement>,
}

impl JobDraft {
    /// 由待排作业生成（模板物料一并复制）
    pub fn from_pending(
        pending: &PendingJob,
        day_id: DayId,
        position: i32,
        template: Option<&JobTemplate>,
    ) -> Self {
        Self {
            day_id,
            position,
            title: pending.title.clone(),
            kind: pending.kind,
            berth: pending.berth,
            equipment_id: pending.equipment_id.clone(),
            estimated_hours: pending.estimated_hours,
            priority: pending.priority,
            overdue: pending.overdue,
            required_date: pending.required_date,
            template_id: pending.template_id,
            defect_severity: pending.defect_severity,
            assignments: Vec::new(),
            materials: template.map(|t| t.materials.clone()).unwrap_or_default(),
        }
    }

    pub fn into_job(self, job_id: JobId) -> Job {
        Job {
            job_id,
            day_id: self.day_id,
            position: self.position,
            title: self.title,
            kind: self.kind,
            berth: self.berth,
            equipment_id: self.equipment_id,
            estimated_hours: self.estimated_hours,
            priority: self.priority,
            overdue: self.overdue,
            required_date: self.required_date,
            template_id: self.template_id,
            defect_severity: self.defect_severity,
            assignments: self.assignments,
            materials: self.materials,
        }
    }
}

// ==========================================
// JobDependency - 作业依赖
// ==========================================
// job_id depends_on depends_on_job_id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDependency {
    pub job_id: JobId,
    pub depends_on_job_id: JobId,
    pub dependency_type: DependencyType,
    pub lag_minutes: i32,
}

impl JobDependency {
    pub fn finish_to_start(job_id: JobId, depends_on_job_id: JobId) -> Self {
        Self {
            job_id,
            depends_on_job_id,
            dependency_type: DependencyType::FinishToStart,
            lag_minutes: 0,
        }
    }

    pub fn touches(&self, job_id: JobId) -> bool {
        self.job_id == job_id || self.depends_on_job_id == job_id
    }
}

// ==========================================
// PlanSnapshot - 计划快照
// ==========================================
// 引擎只读输入: 由调用方从存储层一次性加载
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSnapshot {
    pub plan: Plan,
    pub days: Vec<PlanDay>,
    pub jobs: BTreeMap<JobId, Job>,
    pub dependencies: Vec<JobDependency>,
    pub templates: HashMap<TemplateId, JobTemplate>,
}

impl PlanSnapshot {
    pub fn new(plan: Plan, mut days: Vec<PlanDay>) -> Self {
        days.sort_by_key(|d| (d.date, d.day_id));
        Self {
            plan,
            days,
            jobs: BTreeMap::new(),
            dependencies: Vec::new(),
            templates: HashMap::new(),
        }
    }

    pub fn plan_id(&self) -> PlanId {
        self.plan.plan_id
    }

    pub fn day(&self, day_id: DayId) -> Option<&PlanDay> {
        self.days.iter().find(|d| d.day_id == day_id)
    }

    pub fn day_by_date(&self, date: NaiveDate) -> Option<&PlanDay> {
        self.days.iter().find(|d| d.date == date)
    }

    pub fn job(&self, job_id: JobId) -> Option<&Job> {
        self.jobs.get(&job_id)
    }

    pub fn job_mut(&mut self, job_id: JobId) -> Option<&mut Job> {
        self.jobs.get_mut(&job_id)
    }

    /// 作业所在日期
    pub fn job_date(&self, job_id: JobId) -> Option<NaiveDate> {
        self.jobs
            .get(&job_id)
            .and_then(|job| self.day(job.day_id))
            .map(|d| d.date)
    }

    /// 某日作业（按 position, job_id 排序）
    pub fn jobs_on_day(&self, day_id: DayId) -> Vec<&Job> {
        let mut jobs: Vec<&Job> = self.jobs.values().filter(|j| j.day_id == day_id).collect();
        jobs.sort_by_key(|j| (j.position, j.job_id));
        jobs
    }

    /// 某日下一个展示位置
    pub fn next_position(&self, day_id: DayId) -> i32 {
        self.jobs
            .values()
            .filter(|j| j.day_id == day_id)
            .map(|j| j.position)
            .max()
            .unwrap_or(0)
            + 1
    }

    pub fn max_job_id(&self) -> JobId {
        self.jobs.keys().next_back().copied().unwrap_or(0)
    }

    pub fn template_for(&self, job: &Job) -> Option<&JobTemplate> {
        job.template_id.and_then(|id| self.templates.get(&id))
    }

    /// 作业模板所需资质（无模板时为空）
    pub fn required_certifications(&self, job: &Job) -> &[String] {
        self.template_for(job)
            .map(|t| t.required_certifications.as_slice())
            .unwrap_or(&[])
    }

    /// 作业模板所需技能（无模板时为空）
    pub fn required_skills(&self, job: &Job) -> &[String] {
        self.template_for(job)
            .map(|t| t.required_skills.as_slice())
            .unwrap_or(&[])
    }

    /// 已发布计划不可修改
    pub fn ensure_editable(&self) -> DomainResult<()> {
        if self.plan.is_published() {
            return Err(DomainError::PlanReadOnly(self.plan.plan_id));
        }
        Ok(())
    }

    /// 移动作业到另一天
    ///
    /// 目标日追加到末尾, 原日期剩余作业重新编号
    ///
    /// # 返回
    /// 新的 position
    pub fn move_job(&mut self, job_id: JobId, to_day_id: DayId) -> DomainResult<i32> {
        self.ensure_editable()?;
        if self.day(to_day_id).is_none() {
            return Err(DomainError::not_found("PlanDay", to_day_id));
        }
        let from_day_id = self
            .jobs
            .get(&job_id)
            .map(|j| j.day_id)
            .ok_or_else(|| DomainError::not_found("Job", job_id))?;
        if from_day_id == to_day_id {
            return Ok(self.jobs.get(&job_id).map(|j| j.position).unwrap_or(1));
        }

        let position = self.next_position(to_day_id);
        if let Some(job) = self.jobs.get_mut(&job_id) {
            job.day_id = to_day_id;
            job.position = position;
        }
        self.renumber_day(from_day_id);
        Ok(position)
    }

    /// 删除作业
    ///
    /// 同时清理引用该作业的依赖边（冲突成员关系由 SchedulingConflict::drop_job 清理）
    pub fn remove_job(&mut self, job_id: JobId) -> DomainResult<Job> {
        self.ensure_editable()?;
        let job = self
            .jobs
            .remove(&job_id)
            .ok_or_else(|| DomainError::not_found("Job", job_id))?;
        self.dependencies.retain(|d| !d.touches(job_id));
        self.renumber_day(job.day_id);
        Ok(job)
    }

    /// 当日作业位置压缩为 1..n
    fn renumber_day(&mut self, day_id: DayId) {
        let mut ids: Vec<(i32, JobId)> = self
            .jobs
            .values()
            .filter(|j| j.day_id == day_id)
            .map(|j| (j.position, j.job_id))
            .collect();
        ids.sort();
        for (idx, (_, id)) in ids.into_iter().enumerate() {
            if let Some(job) = self.jobs.get_mut(&id) {
                job.position = idx as i32 + 1;
            }
        }
    }
}
