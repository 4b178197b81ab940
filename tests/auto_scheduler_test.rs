// ==========================================
// 自动排程引擎集成测试
// ==========================================
// 职责: 验证确定性、作业不丢失、日上限、优先级顺序与人员匹配
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

use berth_maint_scheduler::domain::pending::PendingJob;
use berth_maint_scheduler::domain::types::{Berth, JobPriority, Overdue, PendingJobStatus};
use berth_maint_scheduler::engine::{
    AutoScheduleParams, AutoScheduler, BerthLoadLedger, CapacityModel, SkipReason,
    WorkerContext,
};
use proptest::prelude::*;
use test_helpers::*;

fn params() -> AutoScheduleParams {
    AutoScheduleParams::new(week_start())
}

// ==========================================
// 场景: 3 个 4h 作业 / 两天可用 / 日上限 8h
// ==========================================
#[test]
fn test_three_jobs_fill_least_loaded_days_within_ceiling() {
    let snapshot = create_test_snapshot(1);
    let pool: Vec<_> = (1..=3)
        .map(|id| create_test_pending(id, Berth::East, 4.0))
        .collect();
    let mut p = params();
    p.horizon_from = Some(date(2));
    p.horizon_to = Some(date(3));

    let result = AutoScheduler::new().schedule(&snapshot, &pool, &p, None).unwrap();

    let dates: Vec<_> = result.placements.iter().map(|pl| pl.date).collect();
    assert_eq!(dates, vec![date(2), date(3), date(2)]);
    assert!(result.skipped.is_empty());
    assert_eq!(result.overflow_count, 0);
    assert!(result.placements.iter().all(|pl| pl.load_after <= 8.0));
    // 同日第二个作业排在 position 2
    assert_eq!(result.placements[2].job.position, 2);
}

// ==========================================
// 生成策略
// ==========================================
const BERTHS: [Berth; 4] = [Berth::East, Berth::West, Berth::Both, Berth::None];
const PRIORITIES: [JobPriority; 4] = [
    JobPriority::Urgent,
    JobPriority::High,
    JobPriority::Normal,
    JobPriority::Low,
];

prop_compose! {
    fn arb_pool()(
        specs in prop::collection::vec(
            (0usize..4, 1u32..=16, 0usize..4, prop::option::of(1u32..200)),
            0..24,
        ),
    ) -> Vec<PendingJob> {
        specs
            .into_iter()
            .enumerate()
            .map(|(idx, (berth, half_hours, priority, overdue))| {
                let mut pending =
                    create_test_pending(idx as i64 + 1, BERTHS[berth], half_hours as f64 * 0.5);
                pending.priority = PRIORITIES[priority];
                pending.overdue = overdue.map(|h| Overdue::hours(h as f64));
                pending
            })
            .collect()
    }
}

prop_compose! {
    fn arb_params()(
        today_offset in 0u32..7,
        horizon in prop::option::of((0u32..7, 0u32..7)),
        include_weekends in any::<bool>(),
        berth_filter in prop::option::of(0usize..4),
    ) -> AutoScheduleParams {
        let mut p = AutoScheduleParams::new(date(2 + today_offset));
        p.include_weekends = include_weekends;
        p.berth_filter = berth_filter.map(|b| BERTHS[b]);
        if let Some((a, b)) = horizon {
            p.horizon_from = Some(date(2 + a.min(b)));
            p.horizon_to = Some(date(2 + a.max(b)));
        }
        p
    }
}

proptest! {
    // ==========================================
    // 确定性
    // ==========================================
    #[test]
    fn test_same_snapshot_same_result(pool in arb_pool(), p in arb_params()) {
        let snapshot = create_test_snapshot(1);
        let scheduler = AutoScheduler::new();
        let first = scheduler.schedule(&snapshot, &pool, &p, None).unwrap();
        let second = scheduler.schedule(&snapshot, &pool, &p, None).unwrap();

        prop_assert_eq!(
            serde_json::to_value(&first.placements).unwrap(),
            serde_json::to_value(&second.placements).unwrap()
        );
        prop_assert_eq!(
            serde_json::to_value(&first.skipped).unwrap(),
            serde_json::to_value(&second.skipped).unwrap()
        );
    }

    // ==========================================
    // 作业不丢失, 且只落在可排日期
    // ==========================================
    #[test]
    fn test_no_job_lost_and_only_eligible_days_used(pool in arb_pool(), p in arb_params()) {
        let snapshot = create_test_snapshot(1);
        let result = AutoScheduler::new().schedule(&snapshot, &pool, &p, None).unwrap();

        let expected = pool
            .iter()
            .filter(|pending| p.berth_filter.map_or(true, |b| pending.berth == b))
            .count();
        prop_assert_eq!(result.pool_size, expected);
        prop_assert_eq!(result.placements.len() + result.skipped.len(), expected);

        let any_eligible = snapshot.days.iter().any(|d| p.is_eligible(d));
        prop_assert_eq!(result.skipped.is_empty(), any_eligible || expected == 0);
        for pl in &result.placements {
            let day = snapshot.day_by_date(pl.date).unwrap();
            prop_assert!(p.is_eligible(day));
            prop_assert!(pl.date >= p.today);
        }
        prop_assert!(result.skipped.iter().all(|s| s.reason == SkipReason::NoEligibleDay));
    }

    // ==========================================
    // 可行时不超日上限 (5 个工作日 × 8h = 40h / 泊位)
    // ==========================================
    #[test]
    fn test_ceiling_respected_when_total_fits(
        (east_size, east_jobs) in prop::sample::select(vec![1.0, 2.0, 4.0, 8.0])
            .prop_flat_map(|size| (Just(size), 0usize..=(40.0 / size) as usize)),
        (west_size, west_jobs) in prop::sample::select(vec![1.0, 2.0, 4.0, 8.0])
            .prop_flat_map(|size| (Just(size), 0usize..=(40.0 / size) as usize)),
    ) {
        let snapshot = create_test_snapshot(1);
        let mut pool = Vec::new();
        for _ in 0..east_jobs {
            pool.push(create_test_pending(pool.len() as i64 + 1, Berth::East, east_size));
        }
        for _ in 0..west_jobs {
            pool.push(create_test_pending(pool.len() as i64 + 1, Berth::West, west_size));
        }

        let result = AutoScheduler::new().schedule(&snapshot, &pool, &params(), None).unwrap();
        prop_assert_eq!(result.overflow_count, 0);

        let mut ledger = BerthLoadLedger::new();
        for pl in &result.placements {
            ledger.add(pl.date, pl.job.berth, pl.job.estimated_hours);
        }
        for day in 2..=6 {
            prop_assert!(ledger.load_for(date(day), Berth::East) <= 8.0);
            prop_assert!(ledger.load_for(date(day), Berth::West) <= 8.0);
        }
    }
}

// ==========================================
// 仅周末范围 / 含周末
// ==========================================
#[test]
fn test_weekend_only_horizon_skips_unless_weekends_included() {
    let snapshot = create_test_snapshot(1);
    let mut pool: Vec<_> = (1..=6)
        .map(|id| create_test_pending(id, Berth::West, 3.0))
        .collect();
    pool.push(create_test_pending(7, Berth::East, 2.0));
    // 已消费的待排作业不参与
    let mut consumed = create_test_pending(8, Berth::West, 2.0);
    consumed.status = PendingJobStatus::Scheduled;
    pool.push(consumed);

    let scheduler = AutoScheduler::new();
    let mut weekend = params();
    weekend.horizon_from = Some(date(7));
    weekend.horizon_to = Some(date(8));
    let result = scheduler.schedule(&snapshot, &pool, &weekend, None).unwrap();
    assert_eq!(result.pool_size, 7);
    assert!(result.placements.is_empty());
    assert_eq!(result.skipped.len(), 7);

    weekend.include_weekends = true;
    let result = scheduler.schedule(&snapshot, &pool, &weekend, None).unwrap();
    assert_eq!(result.placements.len(), 7);
    assert!(result.skipped.is_empty());
}

// ==========================================
// 周中排程: 已过去的日期不可排
// ==========================================
#[test]
fn test_midweek_run_never_places_on_past_days() {
    // 周一至周三已有负载, 周四排程: 负载最低的周一不再可选
    let snapshot = with_jobs(
        create_test_snapshot(1),
        vec![create_test_job(1, day_id_of(5), 1, 3.0, &[])],
    );
    let pool = vec![
        create_test_pending(1, Berth::East, 2.0),
        create_test_pending(2, Berth::East, 2.0),
    ];
    let thursday = AutoScheduleParams::new(date(5));

    let result = AutoScheduler::new()
        .schedule(&snapshot, &pool, &thursday, None)
        .unwrap();
    let dates: Vec<_> = result.placements.iter().map(|pl| pl.date).collect();
    assert_eq!(dates, vec![date(6), date(6)]);

    // 范围完全落在今日之前: 全部跳过
    let mut past = thursday.clone();
    past.horizon_from = Some(date(2));
    past.horizon_to = Some(date(4));
    let result = AutoScheduler::new()
        .schedule(&snapshot, &pool, &past, None)
        .unwrap();
    assert!(result.placements.is_empty());
    assert_eq!(result.skipped.len(), 2);
    assert!(result
        .skipped
        .iter()
        .all(|s| s.reason == SkipReason::NoEligibleDay));
}

// ==========================================
// 优先级顺序
// ==========================================
#[test]
fn test_overdue_urgent_job_placed_first() {
    let snapshot = create_test_snapshot(1);
    let normal = create_test_pending(1, Berth::East, 4.0);
    let mut urgent = create_test_pending(2, Berth::East, 4.0);
    urgent.priority = JobPriority::Urgent;
    urgent.overdue = Some(Overdue::days(10.0));

    let result = AutoScheduler::new()
        .schedule(&snapshot, &[normal, urgent], &params(), None)
        .unwrap();

    assert_eq!(result.placements[0].pending_id, 2);
    assert_eq!(result.placements[0].date, date(2));
    assert!(result.placements[0].score > result.placements[1].score);
}

// ==========================================
// 人员匹配增强
// ==========================================
#[test]
fn test_worker_assignment_prefers_specialist_and_reports_unassigned() {
    let snapshot = create_test_snapshot(1);
    let roster = create_test_roster(vec![
        create_test_worker(1, &["inspection"]),
        create_test_worker(2, &["pm"]),
    ]);
    let capacity = CapacityModel::new(vec![]);
    let pool = vec![create_test_pending(1, Berth::East, 4.0)];

    let mut p = params();
    p.assign_workers = true;
    let result = AutoScheduler::new()
        .schedule(
            &snapshot,
            &pool,
            &p,
            Some(WorkerContext {
                roster: &roster,
                capacity: &capacity,
            }),
        )
        .unwrap();
    assert_eq!(result.placements[0].lead_worker(), Some(2));
    assert_eq!(result.unassigned_count, 0);

    // 全员缺勤: 仍落位, 但无人员
    let absent = create_test_roster(vec![create_test_worker(2, &["pm"])])
        .with_absence(2, date(2));
    let mut p = params();
    p.assign_workers = true;
    p.horizon_to = Some(date(2));
    let result = AutoScheduler::new()
        .schedule(
            &snapshot,
            &pool,
            &p,
            Some(WorkerContext {
                roster: &absent,
                capacity: &capacity,
            }),
        )
        .unwrap();
    assert_eq!(result.placements.len(), 1);
    assert!(result.placements[0].job.assignments.is_empty());
    assert_eq!(result.unassigned_count, 1);
}
