// ==========================================
// 泊位维修周计划排程系统 - 待排作业池仓储
// ==========================================
// 职责: pending_job 表的读写
// 说明: 外部工单导入由上游负责, 这里只做入池与消费标记
// ==========================================

use crate::domain::pending::PendingJob;
use crate::domain::types::{
    Berth, DefectSeverity, JobId, JobKind, JobPriority, PendingJobId, PendingJobStatus,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{
    format_date, get_enum, get_opt_date, get_opt_enum, get_overdue, overdue_columns,
};
use crate::repository::traits::PendingJobPool;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const PENDING_COLUMNS: &str = r#"
    pending_id, source_ref, title, kind, berth, equipment_id, estimated_hours,
    priority, overdue_magnitude, overdue_unit, required_date, template_id,
    defect_severity, status
"#;

fn map_pending_row(row: &Row<'_>) -> SqliteResult<PendingJob> {
    Ok(PendingJob {
        pending_id: row.get(0)?,
        source_ref: row.get(1)?,
        title: row.get(2)?,
        kind: get_enum(row, 3, JobKind::from_db_str)?,
        berth: get_enum(row, 4, Berth::from_db_str)?,
        equipment_id: row.get(5)?,
        estimated_hours: row.get(6)?,
        priority: get_enum(row, 7, JobPriority::from_db_str)?,
        overdue: get_overdue(row, 8, 9)?,
        required_date: get_opt_date(row, 10)?,
        template_id: row.get(11)?,
        defect_severity: get_opt_enum(row, 12, DefectSeverity::from_db_str)?,
        status: get_enum(row, 13, PendingJobStatus::from_db_str)?,
    })
}

// ==========================================
// PendingJobRepository - 待排作业仓储
// ==========================================
pub struct PendingJobRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PendingJobRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询 PENDING 状态的待排作业
    pub fn find_pending(&self, berth: Option<Berth>) -> RepositoryResult<Vec<PendingJob>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {}
            FROM pending_job
            WHERE status = ?1
              AND (?2 IS NULL OR berth = ?2)
            ORDER BY pending_id
            "#,
            PENDING_COLUMNS
        ))?;
        let jobs = stmt
            .query_map(
                params![
                    PendingJobStatus::Pending.to_db_str(),
                    berth.map(|b| b.to_db_str())
                ],
                map_pending_row,
            )?
            .collect::<SqliteResult<Vec<PendingJob>>>()?;
        Ok(jobs)
    }

    /// 入池（校验通过后写入, 状态固定为 PENDING）
    pub fn insert(&self, pending: &PendingJob) -> RepositoryResult<PendingJobId> {
        pending
            .validate()
            .map_err(|e| RepositoryError::field("pending_job", e.to_string()))?;
        let (overdue_magnitude, overdue_unit) = overdue_columns(pending.overdue.as_ref());
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO pending_job (
                source_ref, title, kind, berth, equipment_id, estimated_hours, priority,
                overdue_magnitude, overdue_unit, required_date, template_id,
                defect_severity, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                pending.source_ref,
                pending.title,
                pending.kind.to_db_str(),
                pending.berth.to_db_str(),
                pending.equipment_id,
                pending.estimated_hours,
                pending.priority.to_db_str(),
                overdue_magnitude,
                overdue_unit,
                pending.required_date.map(format_date),
                pending.template_id,
                pending.defect_severity.map(|s| s.to_db_str()),
                PendingJobStatus::Pending.to_db_str(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 消费待排作业: PENDING → SCHEDULED（在调用方事务内执行）
    ///
    /// # 返回
    /// - Err(NotFound): 待排作业不存在
    /// - Err(FieldValueError): 已被消费
    pub(crate) fn consume(
        conn: &Connection,
        pending_id: PendingJobId,
        job_id: JobId,
    ) -> RepositoryResult<PendingJob> {
        let mut pending = conn
            .query_row(
                &format!(
                    "SELECT {} FROM pending_job WHERE pending_id = ?1",
                    PENDING_COLUMNS
                ),
                params![pending_id],
                map_pending_row,
            )
            .optional()?
            .ok_or_else(|| RepositoryError::not_found("PendingJob", pending_id))?;
        pending
            .mark_scheduled()
            .map_err(|e| RepositoryError::field("pending_job.status", e.to_string()))?;
        conn.execute(
            "UPDATE pending_job SET status = ?2, scheduled_job_id = ?3 WHERE pending_id = ?1",
            params![pending_id, pending.status.to_db_str(), job_id],
        )?;
        Ok(pending)
    }
}

#[async_trait]
impl PendingJobPool for PendingJobRepository {
    async fn list_pending(&self, berth: Option<Berth>) -> RepositoryResult<Vec<PendingJob>> {
        self.find_pending(berth)
    }

    async fn insert_pending(&self, pending: &PendingJob) -> RepositoryResult<PendingJobId> {
        self.insert(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_schema, open_sqlite_connection};
    use crate::domain::types::Overdue;
    use tempfile::NamedTempFile;

    fn pending(title: &str, berth: Berth, hours: f64) -> PendingJob {
        PendingJob {
            pending_id: 0,
            source_ref: Some("WO-1".to_string()),
            title: title.to_string(),
            kind: JobKind::DefectRepair,
            berth,
            equipment_id: None,
            estimated_hours: hours,
            priority: JobPriority::Urgent,
            overdue: Some(Overdue::days(2.0)),
            required_date: None,
            template_id: None,
            defect_severity: Some(DefectSeverity::High),
            status: PendingJobStatus::Pending,
        }
    }

    #[tokio::test]
    async fn test_pool_lifecycle() {
        let file = NamedTempFile::new().unwrap();
        let conn = open_sqlite_connection(file.path().to_str().unwrap()).unwrap();
        init_schema(&conn).unwrap();
        let repo = PendingJobRepository::from_connection(Arc::new(Mutex::new(conn)));

        let east = repo.insert_pending(&pending("pump", Berth::East, 2.0)).await.unwrap();
        repo.insert_pending(&pending("valve", Berth::West, 3.0)).await.unwrap();
        assert!(repo.insert_pending(&pending("bad", Berth::West, -1.0)).await.is_err());

        let all = repo.list_pending(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].overdue, Some(Overdue::days(2.0)));
        assert_eq!(repo.list_pending(Some(Berth::East)).await.unwrap().len(), 1);

        {
            let conn = repo.get_conn().unwrap();
            let consumed = PendingJobRepository::consume(&conn, east, 42).unwrap();
            assert_eq!(consumed.status, PendingJobStatus::Scheduled);
            // 已消费不可再次消费
            assert!(matches!(
                PendingJobRepository::consume(&conn, east, 43),
                Err(RepositoryError::FieldValueError { .. })
            ));
            assert!(matches!(
                PendingJobRepository::consume(&conn, 999, 44),
                Err(RepositoryError::NotFound { .. })
            ));
        }
        assert_eq!(repo.list_pending(None).await.unwrap().len(), 1);
    }
}
