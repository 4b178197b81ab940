// ==========================================
// 泊位维修周计划排程系统 - SQLite 连接与建库
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 统一建表脚本, 写入 schema_version
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 日期存储格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// 时间戳存储格式
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS plan (
    plan_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    week_start TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'DRAFT',
    created_at TEXT NOT NULL,
    published_at TEXT
);

CREATE TABLE IF NOT EXISTS plan_day (
    day_id INTEGER PRIMARY KEY AUTOINCREMENT,
    plan_id INTEGER NOT NULL REFERENCES plan(plan_id) ON DELETE CASCADE,
    date TEXT NOT NULL,
    UNIQUE (plan_id, date)
);

CREATE TABLE IF NOT EXISTS job_template (
    template_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    required_skills TEXT NOT NULL DEFAULT '[]',
    required_certifications TEXT NOT NULL DEFAULT '[]',
    materials TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS worker (
    worker_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    role TEXT NOT NULL,
    shift TEXT,
    specializations TEXT NOT NULL DEFAULT '[]',
    home_berth TEXT,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS worker_certification (
    cert_id INTEGER PRIMARY KEY AUTOINCREMENT,
    worker_id INTEGER NOT NULL REFERENCES worker(worker_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    verified INTEGER NOT NULL DEFAULT 0,
    expires_on TEXT
);

CREATE TABLE IF NOT EXISTS worker_absence (
    worker_id INTEGER NOT NULL REFERENCES worker(worker_id) ON DELETE CASCADE,
    date TEXT NOT NULL,
    reason TEXT,
    PRIMARY KEY (worker_id, date)
);

CREATE TABLE IF NOT EXISTS job (
    job_id INTEGER PRIMARY KEY AUTOINCREMENT,
    day_id INTEGER NOT NULL REFERENCES plan_day(day_id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    title TEXT NOT NULL,
    kind TEXT NOT NULL,
    berth TEXT NOT NULL,
    equipment_id TEXT,
    estimated_hours REAL NOT NULL CHECK (estimated_hours > 0),
    priority TEXT NOT NULL,
    overdue_magnitude REAL,
    overdue_unit TEXT,
    required_date TEXT,
    template_id INTEGER REFERENCES job_template(template_id) ON DELETE SET NULL,
    defect_severity TEXT,
    pending_id INTEGER
);

CREATE INDEX IF NOT EXISTS idx_job_day ON job(day_id, position);

CREATE TABLE IF NOT EXISTS job_assignment (
    job_id INTEGER NOT NULL REFERENCES job(job_id) ON DELETE CASCADE,
    worker_id INTEGER NOT NULL REFERENCES worker(worker_id) ON DELETE CASCADE,
    is_lead INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (job_id, worker_id)
);

CREATE TABLE IF NOT EXISTS job_material (
    material_row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL REFERENCES job(job_id) ON DELETE CASCADE,
    material_code TEXT NOT NULL,
    quantity REAL NOT NULL,
    unit TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS job_dependency (
    job_id INTEGER NOT NULL REFERENCES job(job_id) ON DELETE CASCADE,
    depends_on_job_id INTEGER NOT NULL REFERENCES job(job_id) ON DELETE CASCADE,
    dependency_type TEXT NOT NULL,
    lag_minutes INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (job_id, depends_on_job_id),
    CHECK (job_id <> depends_on_job_id)
);

CREATE TABLE IF NOT EXISTS capacity_config (
    config_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    role TEXT,
    shift TEXT,
    max_hours_per_day REAL NOT NULL,
    max_jobs_per_day INTEGER NOT NULL,
    min_rest_hours REAL NOT NULL,
    overtime_threshold_hours REAL NOT NULL,
    overtime_cap_hours REAL NOT NULL,
    concurrent_jobs_allowed INTEGER NOT NULL DEFAULT 1,
    effective_from TEXT,
    effective_to TEXT
);

CREATE TABLE IF NOT EXISTS pending_job (
    pending_id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_ref TEXT,
    title TEXT NOT NULL,
    kind TEXT NOT NULL,
    berth TEXT NOT NULL,
    equipment_id TEXT,
    estimated_hours REAL NOT NULL,
    priority TEXT NOT NULL,
    overdue_magnitude REAL,
    overdue_unit TEXT,
    required_date TEXT,
    template_id INTEGER,
    defect_severity TEXT,
    status TEXT NOT NULL DEFAULT 'PENDING',
    scheduled_job_id INTEGER
);

CREATE TABLE IF NOT EXISTS scheduling_conflict (
    conflict_id TEXT PRIMARY KEY,
    plan_id INTEGER NOT NULL REFERENCES plan(plan_id) ON DELETE CASCADE,
    conflict_type TEXT NOT NULL,
    severity TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'OPEN',
    job_ids TEXT NOT NULL DEFAULT '[]',
    worker_ids TEXT NOT NULL DEFAULT '[]',
    conflict_date TEXT,
    message TEXT NOT NULL,
    detected_at TEXT NOT NULL,
    resolution_note TEXT,
    resolved_by TEXT,
    resolved_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_conflict_plan_status ON scheduling_conflict(plan_id, status);
"#;

/// 初始化全部表结构（幂等）并记录 schema_version
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    if read_schema_version(conn)?.is_none() {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [CURRENT_SCHEMA_VERSION],
        )?;
    }
    Ok(())
}

/// 读取 schema_version（若表不存在或为空则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }
}
