// ==========================================
// 泊位维修周计划排程系统 - 人员数据仓储
// ==========================================
// 职责: worker / worker_certification / worker_absence 的读写
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::types::{Berth, WorkerId};
use crate::domain::worker::{Certification, WorkerProfile, WorkerRoster};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{format_date, get_date, get_json, get_opt_date, get_opt_enum};
use crate::repository::traits::WorkerDirectory;
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, Result as SqliteResult};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

// ==========================================
// WorkerRepository - 人员仓储
// ==========================================
pub struct WorkerRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WorkerRepository {
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

    /// 读取全部人员（含资质, 按 worker_id 升序）
    fn read_workers(conn: &Connection) -> RepositoryResult<Vec<WorkerProfile>> {
        let mut workers: BTreeMap<WorkerId, WorkerProfile> = conn
            .prepare(
                r#"
                SELECT worker_id, name, role, shift, specializations, home_berth, active
                FROM worker
                ORDER BY worker_id
                "#,
            )?
            .query_map([], |row| {
                Ok(WorkerProfile {
                    worker_id: row.get(0)?,
                    name: row.get(1)?,
                    role: row.get(2)?,
                    shift: row.get(3)?,
                    specializations: get_json(row, 4)?,
                    certifications: Vec::new(),
                    home_berth: get_opt_enum(row, 5, Berth::from_db_str)?,
                    active: row.get(6)?,
                })
            })?
            .collect::<SqliteResult<Vec<WorkerProfile>>>()?
            .into_iter()
            .map(|w| (w.worker_id, w))
            .collect();

        let certifications = conn
            .prepare(
                r#"
                SELECT worker_id, name, verified, expires_on
                FROM worker_certification
                ORDER BY worker_id, cert_id
                "#,
            )?
            .query_map([], |row| {
                Ok((
                    row.get::<_, WorkerId>(0)?,
                    Certification {
                        name: row.get(1)?,
                        verified: row.get(2)?,
                        expires_on: get_opt_date(row, 3)?,
                    },
                ))
            })?
            .collect::<SqliteResult<Vec<(WorkerId, Certification)>>>()?;
        for (worker_id, cert) in certifications {
            if let Some(worker) = workers.get_mut(&worker_id) {
                worker.certifications.push(cert);
            }
        }
        Ok(workers.into_values().collect())
    }

    fn read_absences(
        conn: &Connection,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepositoryResult<Vec<(WorkerId, NaiveDate)>> {
        let absences = conn
            .prepare(
                r#"
                SELECT worker_id, date
                FROM worker_absence
                WHERE date BETWEEN ?1 AND ?2
                "#,
            )?
            .query_map(params![format_date(from), format_date(to)], |row| {
                Ok((row.get(0)?, get_date(row, 1)?))
            })?
            .collect::<SqliteResult<Vec<(WorkerId, NaiveDate)>>>()?;
        Ok(absences)
    }

    fn read_roster(&self, from: NaiveDate, to: NaiveDate) -> RepositoryResult<WorkerRoster> {
        let conn = self.get_conn()?;
        let mut roster = WorkerRoster::new(Self::read_workers(&conn)?);
        roster.absences = Self::read_absences(&conn, from, to)?.into_iter().collect();
        Ok(roster)
    }

    fn read_available(
        &self,
        date: NaiveDate,
        role: Option<&str>,
        specialization: Option<&str>,
    ) -> RepositoryResult<Vec<WorkerProfile>> {
        let roster = self.read_roster(date, date)?;
        Ok(roster
            .available_on(date)
            .into_iter()
            .filter(|w| role.map_or(true, |r| w.role.eq_ignore_ascii_case(r)))
            .filter(|w| specialization.map_or(true, |s| w.has_specialization(s)))
            .cloned()
            .collect())
    }

    fn write_worker(&self, worker: &WorkerProfile) -> RepositoryResult<WorkerId> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO worker (name, role, shift, specializations, home_berth, active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                worker.name,
                worker.role,
                worker.shift,
                serde_json::to_string(&worker.specializations)?,
                worker.home_berth.map(|b| b.to_db_str()),
                worker.active
            ],
        )?;
        let worker_id = tx.last_insert_rowid();
        for cert in &worker.certifications {
            tx.execute(
                r#"
                INSERT INTO worker_certification (worker_id, name, verified, expires_on)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![worker_id, cert.name, cert.verified, cert.expires_on.map(format_date)],
            )?;
        }
        tx.commit()?;
        Ok(worker_id)
    }

    fn write_absence(
        &self,
        worker_id: WorkerId,
        date: NaiveDate,
        reason: Option<&str>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO worker_absence (worker_id, date, reason) VALUES (?1, ?2, ?3)
            ON CONFLICT(worker_id, date) DO UPDATE SET reason = excluded.reason
            "#,
            params![worker_id, format_date(date), reason],
        )?;
        Ok(())
    }
}

#[async_trait]
impl WorkerDirectory for WorkerRepository {
    async fn load_roster(&self, from: NaiveDate, to: NaiveDate) -> RepositoryResult<WorkerRoster> {
        self.read_roster(from, to)
    }

    async fn find_available(
        &self,
        date: NaiveDate,
        role: Option<&str>,
        specialization: Option<&str>,
    ) -> RepositoryResult<Vec<WorkerProfile>> {
        self.read_available(date, role, specialization)
    }

    async fn insert_worker(&self, worker: &WorkerProfile) -> RepositoryResult<WorkerId> {
        self.write_worker(worker)
    }

    async fn record_absence(
        &self,
        worker_id: WorkerId,
        date: NaiveDate,
        reason: Option<&str>,
    ) -> RepositoryResult<()> {
        self.write_absence(worker_id, date, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_schema, open_sqlite_connection};
    use tempfile::NamedTempFile;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    fn worker(name: &str, role: &str) -> WorkerProfile {
        WorkerProfile {
            worker_id: 0,
            name: name.to_string(),
            role: role.to_string(),
            shift: Some("day".to_string()),
            specializations: vec!["electrical".to_string()],
            certifications: vec![Certification {
                name: "HV".to_string(),
                verified: true,
                expires_on: Some(d(31)),
            }],
            home_berth: Some(Berth::East),
            active: true,
        }
    }

    #[tokio::test]
    async fn test_roster_and_availability() {
        let file = NamedTempFile::new().unwrap();
        let conn = open_sqlite_connection(file.path().to_str().unwrap()).unwrap();
        init_schema(&conn).unwrap();
        let repo = WorkerRepository::from_connection(Arc::new(Mutex::new(conn)));

        let a = repo.insert_worker(&worker("Li", "technician")).await.unwrap();
        let b = repo.insert_worker(&worker("Wang", "welder")).await.unwrap();
        repo.record_absence(a, d(3), Some("leave")).await.unwrap();

        let roster = repo.load_roster(d(2), d(8)).await.unwrap();
        assert_eq!(roster.workers.len(), 2);
        assert_eq!(roster.worker(a).unwrap().certifications.len(), 1);
        assert!(!roster.is_available(a, d(3)));
        assert!(roster.is_available(b, d(3)));

        let techs = repo.find_available(d(3), Some("technician"), None).await.unwrap();
        assert!(techs.is_empty());
        let techs = repo
            .find_available(d(4), Some("TECHNICIAN"), Some("Electrical"))
            .await
            .unwrap();
        assert_eq!(techs.len(), 1);
    }
}
