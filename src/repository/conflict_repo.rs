// ==========================================
// 泊位维修周计划排程系统 - 排程冲突仓储
// ==========================================
// 职责: scheduling_conflict 表的读写
// 红线: 替换只作用于 OPEN 记录; RESOLVED/IGNORED 作为历史永久保留
// ==========================================

use crate::domain::conflict::SchedulingConflict;
use crate::domain::types::{ConflictSeverity, ConflictStatus, ConflictType, PlanId};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{
    format_date, format_datetime, get_datetime, get_enum, get_json, get_opt_date,
    get_opt_datetime,
};
use crate::repository::traits::ConflictStore;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};
use tracing::debug;

pub(crate) const CONFLICT_COLUMNS: &str = r#"
    conflict_id, plan_id, conflict_type, severity, status, job_ids, worker_ids,
    conflict_date, message, detected_at, resolution_note, resolved_by, resolved_at
"#;

pub(crate) fn map_conflict_row(row: &Row<'_>) -> SqliteResult<SchedulingConflict> {
    Ok(SchedulingConflict {
        conflict_id: row.get(0)?,
        plan_id: row.get(1)?,
        conflict_type: get_enum(row, 2, ConflictType::from_db_str)?,
        severity: get_enum(row, 3, ConflictSeverity::from_db_str)?,
        status: get_enum(row, 4, ConflictStatus::from_db_str)?,
        job_ids: get_json(row, 5)?,
        worker_ids: get_json(row, 6)?,
        conflict_date: get_opt_date(row, 7)?,
        message: row.get(8)?,
        detected_at: get_datetime(row, 9)?,
        resolution_note: row.get(10)?,
        resolved_by: row.get(11)?,
        resolved_at: get_opt_datetime(row, 12)?,
    })
}

// ==========================================
// ConflictRepository - 冲突仓储
// ==========================================
pub struct ConflictRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ConflictRepository {
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

    fn insert_row(conn: &Connection, c: &SchedulingConflict) -> RepositoryResult<()> {
        conn.execute(
            &format!(
                "INSERT INTO scheduling_conflict ({}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                CONFLICT_COLUMNS
            ),
            params![
                c.conflict_id,
                c.plan_id,
                c.conflict_type.to_db_str(),
                c.severity.to_db_str(),
                c.status.to_db_str(),
                serde_json::to_string(&c.job_ids)?,
                serde_json::to_string(&c.worker_ids)?,
                c.conflict_date.map(format_date),
                c.message,
                format_datetime(c.detected_at),
                c.resolution_note,
                c.resolved_by,
                c.resolved_at.map(format_datetime),
            ],
        )?;
        Ok(())
    }

    pub fn find_by_plan(&self, plan_id: PlanId) -> RepositoryResult<Vec<SchedulingConflict>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM scheduling_conflict WHERE plan_id = ?1 \
             ORDER BY detected_at, conflict_id",
            CONFLICT_COLUMNS
        );
        let conflicts = conn
            .prepare(&sql)?
            .query_map(params![plan_id], map_conflict_row)?
            .collect::<SqliteResult<Vec<SchedulingConflict>>>()?;
        Ok(conflicts)
    }

    pub fn find_by_id(&self, conflict_id: &str) -> RepositoryResult<SchedulingConflict> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM scheduling_conflict WHERE conflict_id = ?1",
            CONFLICT_COLUMNS
        );
        conn.query_row(&sql, params![conflict_id], map_conflict_row)
            .optional()?
            .ok_or_else(|| RepositoryError::not_found("SchedulingConflict", conflict_id))
    }

    /// 原子替换 OPEN 集合
    pub fn replace_open_set(
        &self,
        plan_id: PlanId,
        open: &[SchedulingConflict],
    ) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM scheduling_conflict WHERE plan_id = ?1 AND status = ?2",
            params![plan_id, ConflictStatus::Open.to_db_str()],
        )?;
        for conflict in open {
            if conflict.plan_id != plan_id || !conflict.is_open() {
                return Err(RepositoryError::field(
                    "scheduling_conflict",
                    format!("仅可写入本计划的 OPEN 冲突: {}", conflict.conflict_id),
                ));
            }
            Self::insert_row(&tx, conflict)?;
        }
        tx.commit()?;
        debug!(plan_id, removed, inserted = open.len(), "OPEN 冲突集合已替换");
        Ok(removed)
    }

    /// 保存处理状态（仅 OPEN 行可被更新）
    pub fn save_status(&self, conflict: &SchedulingConflict) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let updated = conn.execute(
            r#"
            UPDATE scheduling_conflict
            SET status = ?2, resolution_note = ?3, resolved_by = ?4, resolved_at = ?5
            WHERE conflict_id = ?1 AND status = ?6
            "#,
            params![
                conflict.conflict_id,
                conflict.status.to_db_str(),
                conflict.resolution_note,
                conflict.resolved_by,
                conflict.resolved_at.map(format_datetime),
                ConflictStatus::Open.to_db_str(),
            ],
        )?;
        if updated == 0 {
            return Err(RepositoryError::not_found(
                "SchedulingConflict(OPEN)",
                &conflict.conflict_id,
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ConflictStore for ConflictRepository {
    async fn list_for_plan(&self, plan_id: PlanId) -> RepositoryResult<Vec<SchedulingConflict>> {
        self.find_by_plan(plan_id)
    }

    async fn get_conflict(&self, conflict_id: &str) -> RepositoryResult<SchedulingConflict> {
        self.find_by_id(conflict_id)
    }

    async fn replace_open(
        &self,
        plan_id: PlanId,
        open: &[SchedulingConflict],
    ) -> RepositoryResult<usize> {
        self.replace_open_set(plan_id, open)
    }

    async fn update_status(&self, conflict: &SchedulingConflict) -> RepositoryResult<()> {
        self.save_status(conflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_schema, open_sqlite_connection};
    use chrono::{NaiveDate, NaiveDateTime};
    use tempfile::NamedTempFile;

    fn ts(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn conflict(id: &str, severity: ConflictSeverity) -> SchedulingConflict {
        SchedulingConflict {
            conflict_id: id.to_string(),
            plan_id: 1,
            conflict_type: ConflictType::Capacity,
            severity,
            status: ConflictStatus::Open,
            job_ids: vec![1, 2],
            worker_ids: vec![7],
            conflict_date: NaiveDate::from_ymd_opt(2026, 3, 3),
            message: "overload".to_string(),
            detected_at: ts(9),
            resolution_note: None,
            resolved_by: None,
            resolved_at: None,
        }
    }

    #[tokio::test]
    async fn test_replace_open_keeps_history() {
        let file = NamedTempFile::new().unwrap();
        let conn = open_sqlite_connection(file.path().to_str().unwrap()).unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO plan (plan_id, name, week_start, created_at) \
             VALUES (1, 'W10', '2026-03-02', '2026-03-01 08:00:00')",
            [],
        )
        .unwrap();
        let repo = ConflictRepository::from_connection(Arc::new(Mutex::new(conn)));

        let first = [
            conflict("a", ConflictSeverity::Warning),
            conflict("b", ConflictSeverity::Error),
        ];
        repo.replace_open(1, &first).await.unwrap();

        let mut b = repo.get_conflict("b").await.unwrap();
        b.resolve("moved job", "lead", ts(10)).unwrap();
        repo.update_status(&b).await.unwrap();
        // 终态行不可再次更新
        assert!(repo.update_status(&b).await.is_err());

        let removed = repo
            .replace_open(1, &[conflict("c", ConflictSeverity::Warning)])
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let all = repo.list_for_plan(1).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|c| c.conflict_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(all[0].status, ConflictStatus::Resolved);
        assert_eq!(all[0].resolved_at, Some(ts(10)));
        assert_eq!(all[1].job_ids, vec![1, 2]);
    }
}
