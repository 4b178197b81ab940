// ==========================================
// 泊位维修周计划排程系统 - 领域类型定义
// ==========================================
// 职责: 作业/泊位/优先级/冲突等枚举类型
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// 实体 ID（与 SQLite rowid 对齐）
pub type PlanId = i64;
pub type DayId = i64;
pub type JobId = i64;
pub type WorkerId = i64;
pub type PendingJobId = i64;
pub type TemplateId = i64;

// ==========================================
// 作业类型 (Job Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobKind {
    Pm,           // 预防性维护
    DefectRepair, // 缺陷维修
    Inspection,   // 巡检
}

impl JobKind {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            JobKind::Pm => "PM",
            JobKind::DefectRepair => "DEFECT_REPAIR",
            JobKind::Inspection => "INSPECTION",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PM" => Some(JobKind::Pm),
            "DEFECT_REPAIR" => Some(JobKind::DefectRepair),
            "INSPECTION" => Some(JobKind::Inspection),
            _ => None,
        }
    }

    /// 作业类型对应的专业标签（模板未声明技能时用于技能匹配）
    pub fn specialization_tag(&self) -> &'static str {
        match self {
            JobKind::Pm => "pm",
            JobKind::DefectRepair => "defect_repair",
            JobKind::Inspection => "inspection",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 泊位归属 (Berth)
// ==========================================
// 作为共享产能轴: East/West 各自独立, Both 同时占用两侧
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Berth {
    East,
    West,
    Both,
    None,
}

impl Berth {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            Berth::East => "EAST",
            Berth::West => "WEST",
            Berth::Both => "BOTH",
            Berth::None => "NONE",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "EAST" => Some(Berth::East),
            "WEST" => Some(Berth::West),
            "BOTH" => Some(Berth::Both),
            "NONE" | "" => Some(Berth::None),
            _ => None,
        }
    }
}

impl fmt::Display for Berth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 作业优先级 (Job Priority)
// ==========================================
// 顺序: Low < Normal < High < Urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl JobPriority {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            JobPriority::Low => "LOW",
            JobPriority::Normal => "NORMAL",
            JobPriority::High => "HIGH",
            JobPriority::Urgent => "URGENT",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Some(JobPriority::Low),
            "NORMAL" => Some(JobPriority::Normal),
            "HIGH" => Some(JobPriority::High),
            "URGENT" => Some(JobPriority::Urgent),
            _ => None,
        }
    }
}

impl fmt::Display for JobPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 超期单位 (Overdue Unit)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverdueUnit {
    Hours,
    Days,
}

impl OverdueUnit {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            OverdueUnit::Hours => "HOURS",
            OverdueUnit::Days => "DAYS",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "HOURS" => Some(OverdueUnit::Hours),
            "DAYS" => Some(OverdueUnit::Days),
            _ => None,
        }
    }
}

impl fmt::Display for OverdueUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

/// 超期量（数值 + 单位）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Overdue {
    pub magnitude: f64,
    pub unit: OverdueUnit,
}

impl Overdue {
    pub fn hours(magnitude: f64) -> Self {
        Self {
            magnitude,
            unit: OverdueUnit::Hours,
        }
    }

    pub fn days(magnitude: f64) -> Self {
        Self {
            magnitude,
            unit: OverdueUnit::Days,
        }
    }

    /// 是否存在正的超期量
    pub fn is_positive(&self) -> bool {
        self.magnitude.is_finite() && self.magnitude > 0.0
    }
}

// ==========================================
// 超期等级 (Overdue Tier)
// ==========================================
// 由优先级评分器判定, SLA 冲突严重度复用同一阈值
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverdueTier {
    None,     // 未超期
    Overdue,  // 已超期
    Critical, // 严重超期 (>100小时 或 >7天)
}

// ==========================================
// 计划状态 (Plan Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    Draft,     // 草稿（可排程）
    Published, // 已发布（只读）
}

impl PlanStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            PlanStatus::Draft => "DRAFT",
            PlanStatus::Published => "PUBLISHED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "DRAFT" => Some(PlanStatus::Draft),
            "PUBLISHED" => Some(PlanStatus::Published),
            _ => None,
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 缺陷严重度 (Defect Severity)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DefectSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl DefectSeverity {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            DefectSeverity::Low => "LOW",
            DefectSeverity::Medium => "MEDIUM",
            DefectSeverity::High => "HIGH",
            DefectSeverity::Critical => "CRITICAL",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Some(DefectSeverity::Low),
            "MEDIUM" => Some(DefectSeverity::Medium),
            "HIGH" => Some(DefectSeverity::High),
            "CRITICAL" => Some(DefectSeverity::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for DefectSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 依赖类型 (Dependency Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    FinishToStart,
    StartToStart,
    FinishToFinish,
    StartToFinish,
}

impl DependencyType {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            DependencyType::FinishToStart => "finish_to_start",
            DependencyType::StartToStart => "start_to_start",
            DependencyType::FinishToFinish => "finish_to_finish",
            DependencyType::StartToFinish => "start_to_finish",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "finish_to_start" => Some(DependencyType::FinishToStart),
            "start_to_start" => Some(DependencyType::StartToStart),
            "finish_to_finish" => Some(DependencyType::FinishToFinish),
            "start_to_finish" => Some(DependencyType::StartToFinish),
            _ => None,
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 冲突类型 (Conflict Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    Capacity,
    Certification,
    EquipmentOverlap,
    Sla,
    Dependency,
}

impl ConflictType {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ConflictType::Capacity => "capacity",
            ConflictType::Certification => "certification",
            ConflictType::EquipmentOverlap => "equipment_overlap",
            ConflictType::Sla => "sla",
            ConflictType::Dependency => "dependency",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "capacity" => Some(ConflictType::Capacity),
            "certification" => Some(ConflictType::Certification),
            "equipment_overlap" => Some(ConflictType::EquipmentOverlap),
            "sla" => Some(ConflictType::Sla),
            "dependency" => Some(ConflictType::Dependency),
            _ => None,
        }
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 冲突严重度 (Conflict Severity)
// ==========================================
// 顺序: Info < Warning < Error
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Info,    // 提示（不阻断）
    Warning, // 警告
    Error,   // 错误（未处理时阻断发布）
}

impl ConflictSeverity {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ConflictSeverity::Info => "info",
            ConflictSeverity::Warning => "warning",
            ConflictSeverity::Error => "error",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "info" => Some(ConflictSeverity::Info),
            "warning" => Some(ConflictSeverity::Warning),
            "error" => Some(ConflictSeverity::Error),
            _ => None,
        }
    }
}

impl fmt::Display for ConflictSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 冲突生命周期 (Conflict Status)
// ==========================================
// Open → Resolved | Ignored, 终态不可回退
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictStatus {
    Open,
    Resolved,
    Ignored,
}

impl ConflictStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ConflictStatus::Open => "OPEN",
            ConflictStatus::Resolved => "RESOLVED",
            ConflictStatus::Ignored => "IGNORED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "OPEN" => Some(ConflictStatus::Open),
            "RESOLVED" => Some(ConflictStatus::Resolved),
            "IGNORED" => Some(ConflictStatus::Ignored),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConflictStatus::Open)
    }
}

impl fmt::Display for ConflictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 待排作业状态 (Pending Job Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PendingJobStatus {
    Pending,   // 待排
    Scheduled, // 已落位（已消费）
}

impl PendingJobStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            PendingJobStatus::Pending => "PENDING",
            PendingJobStatus::Scheduled => "SCHEDULED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Some(PendingJobStatus::Pending),
            "SCHEDULED" => Some(PendingJobStatus::Scheduled),
            _ => None,
        }
    }
}

impl fmt::Display for PendingJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_str_round_trip_for_conflict_type() {
        for t in [
            ConflictType::Capacity,
            ConflictType::Certification,
            ConflictType::EquipmentOverlap,
            ConflictType::Sla,
            ConflictType::Dependency,
        ] {
            assert_eq!(ConflictType::from_db_str(t.to_db_str()), Some(t));
        }
    }

    #[test]
    fn test_priority_ordering() {
        assert!(JobPriority::Urgent > JobPriority::High);
        assert!(JobPriority::High > JobPriority::Normal);
        assert!(JobPriority::Normal > JobPriority::Low);
    }

    #[test]
    fn test_severity_ordering_and_serde() {
        assert!(ConflictSeverity::Error > ConflictSeverity::Warning);
        let json = serde_json::to_string(&ConflictSeverity::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
    }

    #[test]
    fn test_overdue_positive() {
        assert!(Overdue::hours(1.5).is_positive());
        assert!(!Overdue::days(0.0).is_positive());
        assert!(!Overdue::days(f64::NAN).is_positive());
    }

    #[test]
    fn test_berth_parse_empty_as_none() {
        assert_eq!(Berth::from_db_str(""), Some(Berth::None));
        assert_eq!(Berth::from_db_str("west"), Some(Berth::West));
        assert_eq!(Berth::from_db_str("north"), None);
    }
}
