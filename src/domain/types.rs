// ==========================================
// 班次生产数据采集 - 领域类型定义
// ==========================================
// 职责: 小时类型、时段状态、资质状态、班组角色、班组确认状态、通知级别
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// 远端记录标识
pub type RecordId = i64;

// ==========================================
// 小时类型 (Hour Type)
// ==========================================
// 每个类型携带目标百分比，用于缩放时段目标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HourType {
    Normal,     // 正常生产
    Setup,      // 换型调试
    Break,      // 休息
    ExtraBreak, // 额外休息
}

impl HourType {
    pub const ALL: [HourType; 4] = [
        HourType::Normal,
        HourType::Setup,
        HourType::Break,
        HourType::ExtraBreak,
    ];

    /// 默认目标百分比（可被配置覆写）
    pub fn default_percentage(&self) -> u32 {
        match self {
            HourType::Normal => 100,
            HourType::Setup => 50,
            HourType::Break => 0,
            HourType::ExtraBreak => 50,
        }
    }

    /// 远端小时类型代码
    pub fn code(&self) -> &'static str {
        match self {
            HourType::Normal => "NORMAL",
            HourType::Setup => "SETUP",
            HourType::Break => "BREAK",
            HourType::ExtraBreak => "EXTRA_BREAK",
        }
    }

    /// 从字符串解析（未知值返回 None）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "NORMAL" => Some(HourType::Normal),
            "SETUP" => Some(HourType::Setup),
            "BREAK" => Some(HourType::Break),
            "EXTRA_BREAK" => Some(HourType::ExtraBreak),
            _ => None,
        }
    }
}

impl fmt::Display for HourType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ==========================================
// 时段状态 (Slot Status)
// ==========================================
// 单调: NotStarted -> InProgress -> Completed
// 仅在主记录保存失败时回退到 NotStarted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotStatus::NotStarted => write!(f, "NOT_STARTED"),
            SlotStatus::InProgress => write!(f, "IN_PROGRESS"),
            SlotStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

// ==========================================
// 资质状态 (Qualification Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualificationStatus {
    Valid,
    Expired,
    #[default]
    Missing,
}

impl fmt::Display for QualificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualificationStatus::Valid => write!(f, "VALID"),
            QualificationStatus::Expired => write!(f, "EXPIRED"),
            QualificationStatus::Missing => write!(f, "MISSING"),
        }
    }
}

// ==========================================
// 班组角色 (Team Role)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeamRole {
    #[default]
    Operator,
    LineLeader,
    QualityAgent,
    MaintenanceTech,
    Pqc,
}

impl fmt::Display for TeamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeamRole::Operator => write!(f, "OPERATOR"),
            TeamRole::LineLeader => write!(f, "LINE_LEADER"),
            TeamRole::QualityAgent => write!(f, "QUALITY_AGENT"),
            TeamRole::MaintenanceTech => write!(f, "MAINTENANCE_TECH"),
            TeamRole::Pqc => write!(f, "PQC"),
        }
    }
}

// ==========================================
// 班组确认状态 (Team State)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeamState {
    NeedsConfirmation, // 待确认
    AutoConfirmed,     // 自动沿用
    UserConfirmed,     // 人工确认
}

impl TeamState {
    /// 是否允许保存生产数据
    pub fn is_confirmed(&self) -> bool {
        matches!(self, TeamState::AutoConfirmed | TeamState::UserConfirmed)
    }
}

impl fmt::Display for TeamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeamState::NeedsConfirmation => write!(f, "NEEDS_CONFIRMATION"),
            TeamState::AutoConfirmed => write!(f, "AUTO_CONFIRMED"),
            TeamState::UserConfirmed => write!(f, "USER_CONFIRMED"),
        }
    }
}

// ==========================================
// 通知级别 (Severity)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Success => write!(f, "SUCCESS"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// 面向操作员的通知（级别 + 可读消息）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

impl Notification {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Severity::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hour_type_default_percentages() {
        assert_eq!(HourType::Normal.default_percentage(), 100);
        assert_eq!(HourType::Setup.default_percentage(), 50);
        assert_eq!(HourType::Break.default_percentage(), 0);
        assert_eq!(HourType::ExtraBreak.default_percentage(), 50);
    }

    #[test]
    fn test_hour_type_parse() {
        assert_eq!(HourType::parse(" extra_break "), Some(HourType::ExtraBreak));
        assert_eq!(HourType::parse("unknown"), None);
    }

    #[test]
    fn test_team_state_confirmed() {
        assert!(!TeamState::NeedsConfirmation.is_confirmed());
        assert!(TeamState::AutoConfirmed.is_confirmed());
        assert!(TeamState::UserConfirmed.is_confirmed());
    }
}
