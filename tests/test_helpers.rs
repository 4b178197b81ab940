// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的快照/人员/待排作业构造, 以及临时数据库与 API 初始化
// 约定: 测试周为 2026-03-02(周一) ~ 2026-03-08(周日), day_id 1..7 依次对应
// ==========================================

#![allow(dead_code)]

use berth_maint_scheduler::api::{PlanningApi, PlanningPorts};
use berth_maint_scheduler::config::ConfigManager;
use berth_maint_scheduler::db::open_sqlite_connection;
use berth_maint_scheduler::domain::pending::PendingJob;
use berth_maint_scheduler::domain::plan::{Assignment, Job, Plan, PlanDay, PlanSnapshot};
use berth_maint_scheduler::domain::types::{
    Berth, DayId, JobId, JobKind, JobPriority, PendingJobId, PendingJobStatus, PlanStatus,
    WorkerId,
};
use berth_maint_scheduler::domain::worker::{Certification, WorkerProfile, WorkerRoster};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

// ==========================================
// 日期
// ==========================================

/// 2026 年 3 月的某一天
pub fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
}

/// 测试周周一
pub fn week_start() -> NaiveDate {
    date(2)
}

pub fn at(day: u32, hour: u32) -> NaiveDateTime {
    date(day).and_hms_opt(hour, 0, 0).unwrap()
}

/// 测试周内日期对应的 day_id（周一=1）
pub fn day_id_of(day: u32) -> DayId {
    (day - 1) as DayId
}

// ==========================================
// 领域对象构造
// ==========================================

/// 创建测试用周计划快照（草稿, 七个计划日）
pub fn create_test_snapshot(plan_id: i64) -> PlanSnapshot {
    let plan = Plan {
        plan_id,
        name: "W10".to_string(),
        week_start: week_start(),
        status: PlanStatus::Draft,
        created_at: at(1, 8),
        published_at: None,
    };
    let days = (2..=8)
        .map(|day| PlanDay {
            day_id: day_id_of(day),
            plan_id,
            date: date(day),
        })
        .collect();
    PlanSnapshot::new(plan, days)
}

/// 创建测试用待排作业（普通优先级, 无超期）
pub fn create_test_pending(pending_id: PendingJobId, berth: Berth, hours: f64) -> PendingJob {
    PendingJob {
        pending_id,
        source_ref: Some(format!("WO-{}", pending_id)),
        title: format!("pending-{}", pending_id),
        kind: JobKind::Pm,
        berth,
        equipment_id: None,
        estimated_hours: hours,
        priority: JobPriority::Normal,
        overdue: None,
        required_date: None,
        template_id: None,
        defect_severity: None,
        status: PendingJobStatus::Pending,
    }
}

/// 创建测试用作业
pub fn create_test_job(
    job_id: JobId,
    day_id: DayId,
    position: i32,
    hours: f64,
    workers: &[WorkerId],
) -> Job {
    Job {
        job_id,
        day_id,
        position,
        title: format!("job-{}", job_id),
        kind: JobKind::Pm,
        berth: Berth::East,
        equipment_id: None,
        estimated_hours: hours,
        priority: JobPriority::Normal,
        overdue: None,
        required_date: None,
        template_id: None,
        defect_severity: None,
        assignments: workers
            .iter()
            .enumerate()
            .map(|(idx, w)| Assignment {
                worker_id: *w,
                is_lead: idx == 0,
            })
            .collect(),
        materials: vec![],
    }
}

/// 把作业放入快照
pub fn with_jobs(mut snapshot: PlanSnapshot, jobs: Vec<Job>) -> PlanSnapshot {
    for job in jobs {
        snapshot.jobs.insert(job.job_id, job);
    }
    snapshot
}

/// 创建测试用人员
pub fn create_test_worker(worker_id: WorkerId, specializations: &[&str]) -> WorkerProfile {
    WorkerProfile {
        worker_id,
        name: format!("worker-{}", worker_id),
        role: "technician".to_string(),
        shift: Some("day".to_string()),
        specializations: specializations.iter().map(|s| s.to_string()).collect(),
        certifications: vec![],
        home_berth: None,
        active: true,
    }
}

/// 已核验且在有效期内的资质
pub fn create_test_certification(name: &str) -> Certification {
    Certification {
        name: name.to_string(),
        verified: true,
        expires_on: Some(date(31)),
    }
}

pub fn create_test_roster(workers: Vec<WorkerProfile>) -> WorkerRoster {
    WorkerRoster::new(workers)
}

// ==========================================
// 数据库 / API
// ==========================================

/// 创建临时测试数据库连接
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - Arc<Mutex<Connection>>: 共享连接
pub fn create_test_db() -> Result<(NamedTempFile, Arc<Mutex<Connection>>), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().ok_or("临时路径非 UTF-8")?.to_string();
    let conn = open_sqlite_connection(&db_path)?;
    Ok((temp_file, Arc::new(Mutex::new(conn))))
}

/// 创建基于临时数据库的 PlanningApi
pub fn create_test_api(
) -> Result<(NamedTempFile, Arc<ConfigManager>, PlanningApi<ConfigManager>), Box<dyn Error>> {
    let (temp_file, conn) = create_test_db()?;
    let ports = PlanningPorts::sqlite(conn.clone())?;
    let config = Arc::new(
        ConfigManager::from_connection(conn).map_err(|e| format!("配置初始化失败: {}", e))?,
    );
    let api = PlanningApi::new(ports, config.clone());
    Ok((temp_file, config, api))
}
