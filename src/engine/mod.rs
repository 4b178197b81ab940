// ==========================================
// 泊位维修周计划排程系统 - 引擎层
// ==========================================
// 职责: 实现排程规则引擎, 不拼 SQL
// 红线: Engine 不做 I/O, 输入为内存快照, 输出为待提交的变更
// ==========================================

pub mod auto_scheduler;
pub mod balancer;
pub mod capacity_model;
pub mod conflict_detector;
pub mod critical_path;
pub mod dependency_graph;
pub mod error;
pub mod orchestrator;
pub mod priority;
pub mod scenario;
pub mod worker_matcher;

// 重导出核心引擎
pub use auto_scheduler::{
    AutoScheduleParams, AutoScheduleResult, AutoScheduler, BerthLoadLedger, DayChoice,
    JobPlacement, SkipReason, SkippedJob, WorkerContext, DEFAULT_DAY_CEILING_HOURS,
};
pub use balancer::{BalanceResult, DayBalance, ProposedMove, WorkloadBalancer};
pub use capacity_model::CapacityModel;
pub use conflict_detector::{ConflictDetector, ConflictReconciliation, ConflictThresholds};
pub use critical_path::{
    CriticalJob, CriticalPathAnalyzer, CriticalPathReport, CriticalReason, SlackJob,
};
pub use dependency_graph::DependencyGraph;
pub use error::{EngineError, EngineResult};
pub use orchestrator::{
    project_placements, ScheduleOrchestrator, WeeklyPlanRequest, WeeklyPlanResult,
};
pub use priority::{PriorityFacts, PriorityScorer};
pub use scenario::{
    AffectedJob, ImpactKind, ImpactSummary, NewJobSpec, Perturbation, ProposedSlot,
    ReplacementSuggestion, ScenarioContext, ScenarioResult, ScenarioSimulator,
};
pub use worker_matcher::{CandidateScore, MatchRequest, WorkerMatcher, WorkloadLedger};
