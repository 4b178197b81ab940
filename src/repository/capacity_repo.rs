// ==========================================
// 泊位维修周计划排程系统 - 产能配置数据仓储
// ==========================================
// 职责: capacity_config 表的读写
// 红线: Repository 不含业务逻辑（匹配规则在 CapacityModel）
// ==========================================

use crate::domain::capacity::CapacityConfig;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{format_date, get_opt_date};
use crate::repository::traits::CapacityConfigStore;
use async_trait::async_trait;
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

// ==========================================
// CapacityConfigRepository - 产能配置仓储
// ==========================================

/// 产能配置仓储
/// 职责: 管理 capacity_config 表的 CRUD 操作
pub struct CapacityConfigRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CapacityConfigRepository {
    /// 创建新的产能配置仓储实例
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

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询全部配置（按 config_id 升序）
    ///
    /// # 返回
    /// - Ok(Vec<CapacityConfig>): 配置列表
    /// - Err: 数据库错误
    pub fn find_all(&self) -> RepositoryResult<Vec<CapacityConfig>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT
                config_id, name, role, shift, max_hours_per_day, max_jobs_per_day,
                min_rest_hours, overtime_threshold_hours, overtime_cap_hours,
                concurrent_jobs_allowed, effective_from, effective_to
            FROM capacity_config
            ORDER BY config_id
            "#,
        )?;
        let configs = stmt
            .query_map([], |row| {
                Ok(CapacityConfig {
                    config_id: row.get(0)?,
                    name: row.get(1)?,
                    role: row.get(2)?,
                    shift: row.get(3)?,
                    max_hours_per_day: row.get(4)?,
                    max_jobs_per_day: row.get(5)?,
                    min_rest_hours: row.get(6)?,
                    overtime_threshold_hours: row.get(7)?,
                    overtime_cap_hours: row.get(8)?,
                    concurrent_jobs_allowed: row.get(9)?,
                    effective_from: get_opt_date(row, 10)?,
                    effective_to: get_opt_date(row, 11)?,
                })
            })?
            .collect::<SqliteResult<Vec<CapacityConfig>>>()?;
        Ok(configs)
    }

    /// 插入配置
    ///
    /// # 返回
    /// 新配置的 config_id
    pub fn insert(&self, config: &CapacityConfig) -> RepositoryResult<i64> {
        if config.max_hours_per_day <= 0.0 {
            return Err(RepositoryError::field(
                "max_hours_per_day",
                format!("必须大于0: {}", config.max_hours_per_day),
            ));
        }
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO capacity_config (
                name, role, shift, max_hours_per_day, max_jobs_per_day, min_rest_hours,
                overtime_threshold_hours, overtime_cap_hours, concurrent_jobs_allowed,
                effective_from, effective_to
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                config.name,
                config.role,
                config.shift,
                config.max_hours_per_day,
                config.max_jobs_per_day,
                config.min_rest_hours,
                config.overtime_threshold_hours,
                config.overtime_cap_hours,
                config.concurrent_jobs_allowed,
                config.effective_from.map(format_date),
                config.effective_to.map(format_date),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

#[async_trait]
impl CapacityConfigStore for CapacityConfigRepository {
    async fn list_configs(&self) -> RepositoryResult<Vec<CapacityConfig>> {
        self.find_all()
    }

    async fn insert_config(&self, config: &CapacityConfig) -> RepositoryResult<i64> {
        self.insert(config)
    }
}
