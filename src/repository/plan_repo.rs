// ==========================================
// 泊位维修周计划排程系统 - 周计划数据仓储
// ==========================================
// 职责: plan / plan_day / job / job_assignment / job_material /
//       job_dependency / job_template 的读写
// 红线: Repository 不含业务逻辑, 多表写入必须事务化
// ==========================================

use crate::domain::conflict::SchedulingConflict;
use crate::domain::plan::{
    Assignment, Job, JobDependency, JobDraft, JobTemplate, MaterialRequirement, Plan, PlanDay,
    PlanSnapshot,
};
use crate::domain::types::{
    Berth, DayId, DefectSeverity, DependencyType, JobId, JobKind, JobPriority, PendingJobId,
    PlanId, PlanStatus, TemplateId,
};
use crate::repository::conflict_repo::{map_conflict_row, CONFLICT_COLUMNS};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::pending_job_repo::PendingJobRepository;
use crate::repository::row_utils::{
    format_date, format_datetime, get_date, get_datetime, get_enum, get_json, get_opt_date,
    get_opt_datetime, get_opt_enum, get_overdue, overdue_columns,
};
use crate::repository::traits::{PlanSnapshotReader, PlanWriter};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row, Transaction};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tracing::debug;

const JOB_COLUMNS: &str = r#"
    j.job_id, j.day_id, j.position, j.title, j.kind, j.berth, j.equipment_id,
    j.estimated_hours, j.priority, j.overdue_magnitude, j.overdue_unit,
    j.required_date, j.template_id, j.defect_severity
"#;

fn map_job_row(row: &Row<'_>) -> SqliteResult<Job> {
    Ok(Job {
        job_id: row.get(0)?,
        day_id: row.get(1)?,
        position: row.get(2)?,
        title: row.get(3)?,
        kind: get_enum(row, 4, JobKind::from_db_str)?,
        berth: get_enum(row, 5, Berth::from_db_str)?,
        equipment_id: row.get(6)?,
        estimated_hours: row.get(7)?,
        priority: get_enum(row, 8, JobPriority::from_db_str)?,
        overdue: get_overdue(row, 9, 10)?,
        required_date: get_opt_date(row, 11)?,
        template_id: row.get(12)?,
        defect_severity: get_opt_enum(row, 13, DefectSeverity::from_db_str)?,
        assignments: Vec::new(),
        materials: Vec::new(),
    })
}

// ==========================================
// PlanRepository - 周计划仓储
// ==========================================

/// 周计划仓储
/// 职责: 计划快照加载 + 排程结果落库
pub struct PlanRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PlanRepository {
    /// 创建新的周计划仓储实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 读取
    // ==========================================

    fn read_plan(conn: &Connection, plan_id: PlanId) -> RepositoryResult<Plan> {
        conn.query_row(
            r#"
            SELECT plan_id, name, week_start, status, created_at, published_at
            FROM plan
            WHERE plan_id = ?1
            "#,
            params![plan_id],
            |row| {
                Ok(Plan {
                    plan_id: row.get(0)?,
                    name: row.get(1)?,
                    week_start: get_date(row, 2)?,
                    status: get_enum(row, 3, PlanStatus::from_db_str)?,
                    created_at: get_datetime(row, 4)?,
                    published_at: get_opt_datetime(row, 5)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| RepositoryError::not_found("Plan", plan_id))
    }

    fn read_snapshot(&self, plan_id: PlanId) -> RepositoryResult<PlanSnapshot> {
        let conn = self.get_conn()?;
        let plan = Self::read_plan(&conn, plan_id)?;

        let days = conn
            .prepare("SELECT day_id, plan_id, date FROM plan_day WHERE plan_id = ?1")?
            .query_map(params![plan_id], |row| {
                Ok(PlanDay {
                    day_id: row.get(0)?,
                    plan_id: row.get(1)?,
                    date: get_date(row, 2)?,
                })
            })?
            .collect::<SqliteResult<Vec<PlanDay>>>()?;

        let mut snapshot = PlanSnapshot::new(plan, days);

        let job_sql = format!(
            r#"
            SELECT {}
            FROM job j
            JOIN plan_day d ON d.day_id = j.day_id
            WHERE d.plan_id = ?1
            "#,
            JOB_COLUMNS
        );
        let jobs = conn
            .prepare(&job_sql)?
            .query_map(params![plan_id], map_job_row)?
            .collect::<SqliteResult<Vec<Job>>>()?;
        snapshot.jobs = jobs.into_iter().map(|j| (j.job_id, j)).collect();

        let assignments = conn
            .prepare(
                r#"
                SELECT a.job_id, a.worker_id, a.is_lead
                FROM job_assignment a
                JOIN job j ON j.job_id = a.job_id
                JOIN plan_day d ON d.day_id = j.day_id
                WHERE d.plan_id = ?1
                ORDER BY a.job_id, a.is_lead DESC, a.worker_id
                "#,
            )?
            .query_map(params![plan_id], |row| {
                Ok((
                    row.get::<_, JobId>(0)?,
                    Assignment {
                        worker_id: row.get(1)?,
                        is_lead: row.get(2)?,
                    },
                ))
            })?
            .collect::<SqliteResult<Vec<(JobId, Assignment)>>>()?;
        for (job_id, assignment) in assignments {
            if let Some(job) = snapshot.jobs.get_mut(&job_id) {
                job.assignments.push(assignment);
            }
        }

        let materials = conn
            .prepare(
                r#"
                SELECT m.job_id, m.material_code, m.quantity, m.unit
                FROM job_material m
                JOIN job j ON j.job_id = m.job_id
                JOIN plan_day d ON d.day_id = j.day_id
                WHERE d.plan_id = ?1
                ORDER BY m.material_row_id
                "#,
            )?
            .query_map(params![plan_id], |row| {
                Ok((
                    row.get::<_, JobId>(0)?,
                    MaterialRequirement {
                        material_code: row.get(1)?,
                        quantity: row.get(2)?,
                        unit: row.get(3)?,
                    },
                ))
            })?
            .collect::<SqliteResult<Vec<(JobId, MaterialRequirement)>>>()?;
        for (job_id, material) in materials {
            if let Some(job) = snapshot.jobs.get_mut(&job_id) {
                job.materials.push(material);
            }
        }

        snapshot.dependencies = conn
            .prepare(
                r#"
                SELECT dep.job_id, dep.depends_on_job_id, dep.dependency_type, dep.lag_minutes
                FROM job_dependency dep
                JOIN job j ON j.job_id = dep.job_id
                JOIN plan_day d ON d.day_id = j.day_id
                WHERE d.plan_id = ?1
                ORDER BY dep.job_id, dep.depends_on_job_id
                "#,
            )?
            .query_map(params![plan_id], |row| {
                Ok(JobDependency {
                    job_id: row.get(0)?,
                    depends_on_job_id: row.get(1)?,
                    dependency_type: get_enum(row, 2, DependencyType::from_db_str)?,
                    lag_minutes: row.get(3)?,
                })
            })?
            .collect::<SqliteResult<Vec<JobDependency>>>()?;

        let templates = conn
            .prepare(
                r#"
                SELECT template_id, name, required_skills, required_certifications, materials
                FROM job_template
                "#,
            )?
            .query_map([], |row| {
                Ok(JobTemplate {
                    template_id: row.get(0)?,
                    name: row.get(1)?,
                    required_skills: get_json(row, 2)?,
                    required_certifications: get_json(row, 3)?,
                    materials: get_json(row, 4)?,
                })
            })?
            .collect::<SqliteResult<Vec<JobTemplate>>>()?;
        snapshot.templates = templates
            .into_iter()
            .map(|t| (t.template_id, t))
            .collect::<HashMap<TemplateId, JobTemplate>>();

        debug!(
            plan_id,
            days = snapshot.days.len(),
            jobs = snapshot.jobs.len(),
            dependencies = snapshot.dependencies.len(),
            "计划快照加载完成"
        );
        Ok(snapshot)
    }

    fn read_plan_of_job(&self, job_id: JobId) -> RepositoryResult<Option<PlanId>> {
        let conn = self.get_conn()?;
        let plan_id = conn
            .query_row(
                r#"
                SELECT d.plan_id
                FROM job j
                JOIN plan_day d ON d.day_id = j.day_id
                WHERE j.job_id = ?1
                "#,
                params![job_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(plan_id)
    }

    // ==========================================
    // 写入
    // ==========================================

    fn write_plan(
        &self,
        name: &str,
        week_start: NaiveDate,
        created_at: NaiveDateTime,
    ) -> RepositoryResult<PlanId> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO plan (name, week_start, status, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                name,
                format_date(week_start),
                PlanStatus::Draft.to_db_str(),
                format_datetime(created_at)
            ],
        )?;
        let plan_id = tx.last_insert_rowid();
        for offset in 0..7 {
            tx.execute(
                "INSERT INTO plan_day (plan_id, date) VALUES (?1, ?2)",
                params![plan_id, format_date(week_start + Duration::days(offset))],
            )?;
        }
        tx.commit()?;
        Ok(plan_id)
    }

    fn write_template(&self, template: &JobTemplate) -> RepositoryResult<TemplateId> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO job_template (name, required_skills, required_certifications, materials)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                template.name,
                serde_json::to_string(&template.required_skills)?,
                serde_json::to_string(&template.required_certifications)?,
                serde_json::to_string(&template.materials)?,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn insert_job(
        tx: &Transaction<'_>,
        pending_id: Option<PendingJobId>,
        draft: &JobDraft,
    ) -> RepositoryResult<JobId> {
        let (overdue_magnitude, overdue_unit) = overdue_columns(draft.overdue.as_ref());
        tx.execute(
            r#"
            INSERT INTO job (
                day_id, position, title, kind, berth, equipment_id, estimated_hours,
                priority, overdue_magnitude, overdue_unit, required_date, template_id,
                defect_severity, pending_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                draft.day_id,
                draft.position,
                draft.title,
                draft.kind.to_db_str(),
                draft.berth.to_db_str(),
                draft.equipment_id,
                draft.estimated_hours,
                draft.priority.to_db_str(),
                overdue_magnitude,
                overdue_unit,
                draft.required_date.map(format_date),
                draft.template_id,
                draft.defect_severity.map(|s| s.to_db_str()),
                pending_id,
            ],
        )?;
        let job_id = tx.last_insert_rowid();

        for assignment in &draft.assignments {
            tx.execute(
                "INSERT INTO job_assignment (job_id, worker_id, is_lead) VALUES (?1, ?2, ?3)",
                params![job_id, assignment.worker_id, assignment.is_lead],
            )?;
        }
        for material in &draft.materials {
            tx.execute(
                r#"
                INSERT INTO job_material (job_id, material_code, quantity, unit)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![job_id, material.material_code, material.quantity, material.unit],
            )?;
        }
        Ok(job_id)
    }

    fn write_placements(
        &self,
        placements: &[(PendingJobId, JobDraft)],
    ) -> RepositoryResult<Vec<(PendingJobId, JobId)>> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut committed = Vec::with_capacity(placements.len());
        for (pending_id, draft) in placements {
            let job_id = Self::insert_job(&tx, Some(*pending_id), draft)?;
            PendingJobRepository::consume(&tx, *pending_id, job_id)?;
            committed.push((*pending_id, job_id));
        }
        tx.commit()?;
        debug!(count = committed.len(), "排程落位已提交");
        Ok(committed)
    }

    fn write_assignments(&self, job_id: JobId, assignments: &[Assignment]) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM job_assignment WHERE job_id = ?1", params![job_id])?;
        for assignment in assignments {
            tx.execute(
                "INSERT INTO job_assignment (job_id, worker_id, is_lead) VALUES (?1, ?2, ?3)",
                params![job_id, assignment.worker_id, assignment.is_lead],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn write_positions(&self, positions: &[(JobId, DayId, i32)]) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        for (job_id, day_id, position) in positions {
            let updated = tx.execute(
                "UPDATE job SET day_id = ?2, position = ?3 WHERE job_id = ?1",
                params![job_id, day_id, position],
            )?;
            if updated == 0 {
                return Err(RepositoryError::not_found("Job", job_id));
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// 删除作业 + 冲突成员关系清理 + 当日位置压缩
    fn write_delete_job(&self, job_id: JobId) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let (day_id, plan_id): (DayId, PlanId) = tx
            .query_row(
                r#"
                SELECT j.day_id, d.plan_id
                FROM job j
                JOIN plan_day d ON d.day_id = j.day_id
                WHERE j.job_id = ?1
                "#,
                params![job_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| RepositoryError::not_found("Job", job_id))?;

        // 分配/物料/依赖边经外键级联删除
        tx.execute("DELETE FROM job WHERE job_id = ?1", params![job_id])?;

        let conflicts = tx
            .prepare(&format!(
                "SELECT {} FROM scheduling_conflict WHERE plan_id = ?1",
                CONFLICT_COLUMNS
            ))?
            .query_map(params![plan_id], map_conflict_row)?
            .collect::<SqliteResult<Vec<SchedulingConflict>>>()?;
        for mut conflict in conflicts {
            if !conflict.job_ids.contains(&job_id) {
                continue;
            }
            if conflict.drop_job(job_id) {
                tx.execute(
                    "DELETE FROM scheduling_conflict WHERE conflict_id = ?1",
                    params![conflict.conflict_id],
                )?;
            } else {
                tx.execute(
                    "UPDATE scheduling_conflict SET job_ids = ?2 WHERE conflict_id = ?1",
                    params![conflict.conflict_id, serde_json::to_string(&conflict.job_ids)?],
                )?;
            }
        }

        let remaining = tx
            .prepare("SELECT job_id FROM job WHERE day_id = ?1 ORDER BY position, job_id")?
            .query_map(params![day_id], |row| row.get::<_, JobId>(0))?
            .collect::<SqliteResult<Vec<JobId>>>()?;
        for (idx, id) in remaining.iter().enumerate() {
            tx.execute(
                "UPDATE job SET position = ?2 WHERE job_id = ?1",
                params![id, idx as i32 + 1],
            )?;
        }

        tx.commit()?;
        debug!(job_id, plan_id, "作业已删除");
        Ok(())
    }

    fn write_plan_status(&self, plan: &Plan) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let updated = conn.execute(
            "UPDATE plan SET status = ?2, published_at = ?3 WHERE plan_id = ?1",
            params![
                plan.plan_id,
                plan.status.to_db_str(),
                plan.published_at.map(format_datetime)
            ],
        )?;
        if updated == 0 {
            return Err(RepositoryError::not_found("Plan", plan.plan_id));
        }
        Ok(())
    }

    fn write_dependency(&self, dependency: &JobDependency) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO job_dependency (job_id, depends_on_job_id, dependency_type, lag_minutes)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                dependency.job_id,
                dependency.depends_on_job_id,
                dependency.dependency_type.to_db_str(),
                dependency.lag_minutes
            ],
        )?;
        Ok(())
    }

    fn delete_dependency(&self, job_id: JobId, depends_on_job_id: JobId) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let deleted = conn.execute(
            "DELETE FROM job_dependency WHERE job_id = ?1 AND depends_on_job_id = ?2",
            params![job_id, depends_on_job_id],
        )?;
        Ok(deleted > 0)
    }

    /// 计划内各日作业数（用于看板统计）
    pub fn count_jobs_by_day(&self, plan_id: PlanId) -> RepositoryResult<BTreeMap<NaiveDate, usize>> {
        let conn = self.get_conn()?;
        let rows = conn
            .prepare(
                r#"
                SELECT d.date, COUNT(j.job_id)
                FROM plan_day d
                LEFT JOIN job j ON j.day_id = d.day_id
                WHERE d.plan_id = ?1
                GROUP BY d.day_id
                "#,
            )?
            .query_map(params![plan_id], |row| {
                Ok((get_date(row, 0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<SqliteResult<Vec<(NaiveDate, usize)>>>()?;
        Ok(rows.into_iter().collect())
    }
}

#[async_trait]
impl PlanSnapshotReader for PlanRepository {
    async fn load_snapshot(&self, plan_id: PlanId) -> RepositoryResult<PlanSnapshot> {
        self.read_snapshot(plan_id)
    }

    async fn find_plan_of_job(&self, job_id: JobId) -> RepositoryResult<Option<PlanId>> {
        self.read_plan_of_job(job_id)
    }
}

#[async_trait]
impl PlanWriter for PlanRepository {
    async fn create_plan(
        &self,
        name: &str,
        week_start: NaiveDate,
        created_at: NaiveDateTime,
    ) -> RepositoryResult<PlanId> {
        self.write_plan(name, week_start, created_at)
    }

    async fn insert_template(&self, template: &JobTemplate) -> RepositoryResult<TemplateId> {
        self.write_template(template)
    }

    async fn commit_placements(
        &self,
        placements: &[(PendingJobId, JobDraft)],
    ) -> RepositoryResult<Vec<(PendingJobId, JobId)>> {
        self.write_placements(placements)
    }

    async fn save_assignments(
        &self,
        job_id: JobId,
        assignments: &[Assignment],
    ) -> RepositoryResult<()> {
        self.write_assignments(job_id, assignments)
    }

    async fn save_positions(&self, positions: &[(JobId, DayId, i32)]) -> RepositoryResult<()> {
        self.write_positions(positions)
    }

    async fn delete_job(&self, job_id: JobId) -> RepositoryResult<()> {
        self.write_delete_job(job_id)
    }

    async fn save_plan_status(&self, plan: &Plan) -> RepositoryResult<()> {
        self.write_plan_status(plan)
    }

    async fn add_dependency(&self, dependency: &JobDependency) -> RepositoryResult<()> {
        self.write_dependency(dependency)
    }

    async fn remove_dependency(
        &self,
        job_id: JobId,
        depends_on_job_id: JobId,
    ) -> RepositoryResult<bool> {
        self.delete_dependency(job_id, depends_on_job_id)
    }
}
