// ==========================================
// 班次生产数据采集 - 小时时段领域模型
// ==========================================
// 职责: HourSlot、远端身份（Unsaved / Pending / Confirmed）、派生指标计算
// 红线: 派生字段（目标、效率、报废率、停机合计）只能由本模块计算
// ==========================================

use crate::domain::downtime::DowntimeRecord;
use crate::domain::shift::{HourTypePercentages, Part};
use crate::domain::team::TeamMember;
use crate::domain::types::{HourType, RecordId, SlotStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// NaturalKey - 自然键（日期 + 班次 + 小时序号）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    pub date: NaiveDate,
    pub shift_id: RecordId,
    pub hour_number: u32,
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/H{}", self.date, self.shift_id, self.hour_number)
    }
}

// ==========================================
// RemoteIdentity - 时段远端身份
// ==========================================
// 合法迁移: Unsaved -> Pending -> Confirmed
//           Confirmed -> Unsaved -> Confirmed(新)（检测到过期后重建）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteIdentity {
    #[default]
    Unsaved,
    Pending(NaturalKey),
    Confirmed(RecordId),
}

impl RemoteIdentity {
    pub fn confirmed_id(&self) -> Option<RecordId> {
        match self {
            RemoteIdentity::Confirmed(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, RemoteIdentity::Confirmed(_))
    }

    /// Unsaved -> Pending；已确认的身份不会回退
    pub fn mark_pending(&mut self, key: NaturalKey) -> bool {
        match self {
            RemoteIdentity::Unsaved | RemoteIdentity::Pending(_) => {
                *self = RemoteIdentity::Pending(key);
                true
            }
            RemoteIdentity::Confirmed(_) => false,
        }
    }

    /// Unsaved/Pending -> Confirmed；已确认为其他 id 时拒绝
    pub fn confirm(&mut self, id: RecordId) -> bool {
        match self {
            RemoteIdentity::Confirmed(current) if *current != id => false,
            _ => {
                *self = RemoteIdentity::Confirmed(id);
                true
            }
        }
    }

    /// Confirmed -> Unsaved（远端报告记录不存在），返回过期 id
    pub fn clear_stale(&mut self) -> Option<RecordId> {
        match *self {
            RemoteIdentity::Confirmed(id) => {
                *self = RemoteIdentity::Unsaved;
                Some(id)
            }
            _ => None,
        }
    }
}

/// 子记录远端身份（停机记录）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordIdentity {
    #[default]
    Unsaved,
    Confirmed(RecordId),
}

impl RecordIdentity {
    pub fn id(&self) -> Option<RecordId> {
        match self {
            RecordIdentity::Confirmed(id) => Some(*id),
            RecordIdentity::Unsaved => None,
        }
    }
}

/// 按百分比缩放目标: round(base × pct / 100)
pub fn scale_by_percentage(base: u32, percentage: u32) -> u32 {
    (base as f64 * percentage as f64 / 100.0).round() as u32
}

// ==========================================
// HourSlot - 小时时段
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourSlot {
    // ===== 时段定位 =====
    pub hour_number: u32,
    pub start_hour: u32,
    pub end_hour: u32,

    // ===== 类型与状态 =====
    pub hour_type: HourType,
    #[serde(default)]
    pub status: SlotStatus,

    // ===== 录入值 =====
    #[serde(default)]
    pub output: Option<u32>,
    #[serde(default)]
    pub scrap: Option<u32>,

    // ===== 派生值 =====
    #[serde(default)]
    pub target: u32,
    #[serde(default)]
    pub scrap_target: u32,
    #[serde(default)]
    pub efficiency: Option<u32>,
    #[serde(default)]
    pub scrap_rate: Option<f64>,

    // ===== 子记录 =====
    #[serde(default)]
    pub downtimes: Vec<DowntimeRecord>,
    #[serde(default)]
    pub total_downtime: u32,
    #[serde(default)]
    pub team: Vec<TeamMember>,

    // ===== 远端身份 =====
    #[serde(default)]
    pub remote_identity: RemoteIdentity,
}

impl HourSlot {
    /// 创建空白时段（NotStarted、无录入、Unsaved）
    pub fn scaffold(
        hour_number: u32,
        start_hour: u32,
        end_hour: u32,
        hour_type: HourType,
        part: &Part,
        percentages: &HourTypePercentages,
    ) -> Self {
        let mut slot = Self {
            hour_number,
            start_hour,
            end_hour,
            hour_type,
            status: SlotStatus::NotStarted,
            output: None,
            scrap: None,
            target: 0,
            scrap_target: 0,
            efficiency: None,
            scrap_rate: None,
            downtimes: Vec::new(),
            total_downtime: 0,
            team: Vec::new(),
            remote_identity: RemoteIdentity::Unsaved,
        };
        slot.apply_hour_type(hour_type, part, percentages);
        slot
    }

    pub fn start_time(&self) -> String {
        format!("{:02}:00", self.start_hour)
    }

    pub fn end_time(&self) -> String {
        format!("{:02}:00", self.end_hour)
    }

    pub fn time_range(&self) -> String {
        format!("{} - {}", self.start_time(), self.end_time())
    }

    pub fn natural_key(&self, date: NaiveDate, shift_id: RecordId) -> NaturalKey {
        NaturalKey {
            date,
            shift_id,
            hour_number: self.hour_number,
        }
    }

    /// 切换小时类型并重算目标
    pub fn apply_hour_type(
        &mut self,
        hour_type: HourType,
        part: &Part,
        percentages: &HourTypePercentages,
    ) {
        let percentage = percentages.percentage(hour_type);
        self.hour_type = hour_type;
        self.target = scale_by_percentage(part.target_per_hour, percentage);
        self.scrap_target = scale_by_percentage(part.scrap_target_per_hour, percentage);
        self.recompute_derived();
    }

    /// 录入产量与报废
    pub fn record_production(&mut self, output: Option<u32>, scrap: Option<u32>) {
        self.output = output;
        self.scrap = scrap;
        self.recompute_derived();
    }

    /// 重算效率与报废率
    pub fn recompute_derived(&mut self) {
        self.efficiency = match self.output {
            Some(output) if self.target > 0 => {
                Some((output as f64 / self.target as f64 * 100.0).round() as u32)
            }
            _ => None,
        };

        self.scrap_rate = match (self.output, self.scrap) {
            (None, None) => None,
            (output, scrap) => {
                let output = output.unwrap_or(0) as f64;
                let scrap = scrap.unwrap_or(0) as f64;
                let total = output + scrap;
                if total > 0.0 {
                    Some((scrap / total * 1000.0).round() / 10.0)
                } else {
                    Some(0.0)
                }
            }
        };
    }

    /// 停机合计 = Σ duration
    pub fn recompute_total_downtime(&mut self) {
        self.total_downtime = self.downtimes.iter().map(|d| d.duration_minutes).sum();
    }

    pub fn headcount(&self) -> usize {
        self.team.len()
    }

    /// 是否已有录入数据（用于恢复时判断）
    pub fn has_recorded_data(&self) -> bool {
        self.output.is_some()
            || self.scrap.is_some()
            || !self.downtimes.is_empty()
            || self.status != SlotStatus::NotStarted
    }
}
