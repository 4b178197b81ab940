// ==========================================
// 泊位维修周计划排程系统 - 命令行入口
// ==========================================
// 职责: 初始化日志与数据库, 输出当前配置
// 用法: berth-maint-scheduler [db_path]  (或环境变量 BERTH_DB_PATH)
// ==========================================

use berth_maint_scheduler::config::{load_settings, ConfigManager};
use berth_maint_scheduler::db::{init_schema, open_sqlite_connection, read_schema_version};
use berth_maint_scheduler::{logging, APP_NAME, VERSION};
use std::sync::{Arc, Mutex};

const DB_PATH_ENV: &str = "BERTH_DB_PATH";
const DEFAULT_DB_PATH: &str = "berth_maint.db";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", APP_NAME);
    tracing::info!("系统版本: {}", VERSION);
    tracing::info!("==================================================");

    let db_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(DB_PATH_ENV).ok())
        .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
    tracing::info!("使用数据库: {}", db_path);

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;
    let version = read_schema_version(&conn)?;
    tracing::info!(schema_version = ?version, "数据库表结构就绪");

    let config = ConfigManager::from_connection(Arc::new(Mutex::new(conn)))
        .map_err(|e| anyhow::anyhow!("配置管理器初始化失败: {}", e))?;
    let settings = load_settings(&config)
        .await
        .map_err(|e| anyhow::anyhow!("配置读取失败: {}", e))?;
    tracing::info!(
        day_ceiling_hours = settings.day_ceiling_hours,
        include_weekends = settings.include_weekends,
        auto_assign_workers = settings.auto_assign_workers,
        "当前排程配置"
    );
    Ok(())
}
