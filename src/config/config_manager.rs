// ==========================================
// 泊位维修周计划排程系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::scheduling_config_trait::{ConfigResult, SchedulingConfigReader};
use crate::db::open_sqlite_connection;
use crate::engine::conflict_detector::ConflictThresholds;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// 配置键
pub mod config_keys {
    pub const DAY_CEILING_HOURS: &str = "day_ceiling_hours";
    pub const INCLUDE_WEEKENDS: &str = "include_weekends";
    pub const AUTO_ASSIGN_WORKERS: &str = "auto_assign_workers";
    pub const CAPACITY_WARNING_HOURS: &str = "capacity_warning_hours";
    pub const CAPACITY_ERROR_HOURS: &str = "capacity_error_hours";
    pub const EQUIPMENT_OVERLAP_JOBS: &str = "equipment_overlap_jobs";
    pub const SLA_TAIL_DAYS: &str = "sla_tail_days";
}

/// 配置作用域（目前仅 global 生效）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope {
    Global,
}

impl ConfigScope {
    pub fn scope_id(&self) -> &'static str {
        match self {
            ConfigScope::Global => "global",
        }
    }
}

// ==========================================
// EngineSettings - 引擎参数汇总
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub day_ceiling_hours: f64,
    pub include_weekends: bool,
    pub auto_assign_workers: bool,
    pub capacity_warning_hours: f64,
    pub capacity_error_hours: f64,
    pub equipment_overlap_jobs: usize,
    pub sla_tail_days: i64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            day_ceiling_hours: 8.0,
            include_weekends: false,
            auto_assign_workers: true,
            capacity_warning_hours: 10.0,
            capacity_error_hours: 12.0,
            equipment_overlap_jobs: 2,
            sla_tail_days: 2,
        }
    }
}

impl EngineSettings {
    pub fn conflict_thresholds(&self) -> ConflictThresholds {
        ConflictThresholds {
            capacity_warning_hours: self.capacity_warning_hours,
            capacity_error_hours: self.capacity_error_hours,
            equipment_overlap_jobs: self.equipment_overlap_jobs,
            sla_tail_days: self.sla_tail_days,
            include_weekends: self.include_weekends,
        }
    }
}

/// 通过配置读取器加载全部引擎参数
pub async fn load_settings<C>(reader: &C) -> ConfigResult<EngineSettings>
where
    C: SchedulingConfigReader + ?Sized,
{
    Ok(EngineSettings {
        day_ceiling_hours: reader.get_day_ceiling_hours().await?,
        include_weekends: reader.get_include_weekends().await?,
        auto_assign_workers: reader.get_auto_assign_workers().await?,
        capacity_warning_hours: reader.get_capacity_warning_hours().await?,
        capacity_error_hours: reader.get_capacity_error_hours().await?,
        equipment_overlap_jobs: reader.get_equipment_overlap_jobs().await?,
        sla_tail_days: reader.get_sla_tail_days().await?,
    })
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
            params![ConfigScope::Global.scope_id(), key],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取并解析配置, 缺失或格式错误时使用默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: FromStr + Copy + std::fmt::Display,
    {
        match self.get_config_value(key)? {
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    warn!(key, value = %raw, default = %default, "配置值格式错误, 使用默认值");
                    Ok(default)
                }
            },
            None => Ok(default),
        }
    }

    /// 写入 global 配置（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3",
            params![ConfigScope::Global.scope_id(), key, value],
        )?;
        Ok(())
    }

    /// 获取所有 global 配置的快照（JSON 格式）
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![ConfigScope::Global.scope_id()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }
        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 从配置快照恢复（覆盖同名 global 配置）
    ///
    /// # 返回
    /// 恢复的配置项数量
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> ConfigResult<usize> {
        let config_map: BTreeMap<String, String> = serde_json::from_str(snapshot_json)?;

        let mut conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let tx = conn.transaction()?;
        let mut count = 0;
        for (key, value) in &config_map {
            count += tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3",
                params![ConfigScope::Global.scope_id(), key, value],
            )?;
        }
        tx.commit()?;
        Ok(count)
    }
}

#[async_trait]
impl SchedulingConfigReader for ConfigManager {
    async fn get_day_ceiling_hours(&self) -> ConfigResult<f64> {
        self.get_parsed_or_default(config_keys::DAY_CEILING_HOURS, 8.0)
    }

    async fn get_include_weekends(&self) -> ConfigResult<bool> {
        self.get_parsed_or_default(config_keys::INCLUDE_WEEKENDS, false)
    }

    async fn get_auto_assign_workers(&self) -> ConfigResult<bool> {
        self.get_parsed_or_default(config_keys::AUTO_ASSIGN_WORKERS, true)
    }

    async fn get_capacity_warning_hours(&self) -> ConfigResult<f64> {
        self.get_parsed_or_default(config_keys::CAPACITY_WARNING_HOURS, 10.0)
    }

    async fn get_capacity_error_hours(&self) -> ConfigResult<f64> {
        self.get_parsed_or_default(config_keys::CAPACITY_ERROR_HOURS, 12.0)
    }

    async fn get_equipment_overlap_jobs(&self) -> ConfigResult<usize> {
        self.get_parsed_or_default(config_keys::EQUIPMENT_OVERLAP_JOBS, 2)
    }

    async fn get_sla_tail_days(&self) -> ConfigResult<i64> {
        self.get_parsed_or_default(config_keys::SLA_TAIL_DAYS, 2)
    }
}
