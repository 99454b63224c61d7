// ==========================================
// 班次生产数据采集 - 班次领域模型
// ==========================================
// 职责: 班次定义、零件目标、生产位置、班次上下文、小时类型百分比
// 红线: 班次定义在会话开始后不可变
// ==========================================

use crate::domain::types::{HourType, RecordId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 领域层错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("班次小时越界: {field}={value} (应为 0-23)")]
    HourOutOfRange { field: String, value: u32 },

    #[error("班次起止小时相同: {0}")]
    ZeroLengthShift(u32),

    #[error("小时类型百分比越界: {hour_type}={percentage}")]
    PercentageOutOfRange { hour_type: HourType, percentage: u32 },
}

// ==========================================
// ShiftDefinition - 班次定义
// ==========================================
// end_hour <= start_hour 表示跨零点（例如 22:00 -> 06:00）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftDefinition {
    pub shift_id: RecordId,
    pub name: String,
    pub start_hour: u32,
    pub end_hour: u32,
}

impl ShiftDefinition {
    /// 创建班次定义（校验小时范围，拒绝起止相同）
    pub fn new(
        shift_id: RecordId,
        name: impl Into<String>,
        start_hour: u32,
        end_hour: u32,
    ) -> Result<Self, DomainError> {
        let shift = Self {
            shift_id,
            name: name.into(),
            start_hour,
            end_hour,
        };
        shift.validate()?;
        Ok(shift)
    }

    /// 校验小时范围（远端返回的班次定义同样需要校验）
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.start_hour > 23 {
            return Err(DomainError::HourOutOfRange {
                field: "start_hour".to_string(),
                value: self.start_hour,
            });
        }
        if self.end_hour > 23 {
            return Err(DomainError::HourOutOfRange {
                field: "end_hour".to_string(),
                value: self.end_hour,
            });
        }
        if self.start_hour == self.end_hour {
            return Err(DomainError::ZeroLengthShift(self.start_hour));
        }
        Ok(())
    }

    /// 是否跨零点
    pub fn is_overnight(&self) -> bool {
        self.end_hour <= self.start_hour
    }
}

// ==========================================
// Part - 零件（目标来源）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub part_id: RecordId,
    pub part_number: String,
    /// 每小时产量目标
    pub target_per_hour: u32,
    /// 每小时报废目标
    #[serde(default)]
    pub scrap_target_per_hour: u32,
}

// ==========================================
// LocationRef - 产线或工序
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationRef {
    Line(RecordId),
    Process(RecordId),
}

// ==========================================
// ShiftContext - 班次上下文
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftContext {
    pub shift: ShiftDefinition,
    pub date: NaiveDate,
    pub project_id: RecordId,
    pub location: LocationRef,
    pub part: Part,
    pub zone_id: Option<RecordId>,
}

// ==========================================
// HourTypePercentages - 小时类型百分比表
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourTypePercentages {
    pub normal: u32,
    pub setup: u32,
    pub break_time: u32,
    pub extra_break: u32,
    /// 新生成时段使用的默认类型
    pub default_type: HourType,
}

impl Default for HourTypePercentages {
    fn default() -> Self {
        Self {
            normal: HourType::Normal.default_percentage(),
            setup: HourType::Setup.default_percentage(),
            break_time: HourType::Break.default_percentage(),
            extra_break: HourType::ExtraBreak.default_percentage(),
            default_type: HourType::Normal,
        }
    }
}

impl HourTypePercentages {
    pub fn percentage(&self, hour_type: HourType) -> u32 {
        match hour_type {
            HourType::Normal => self.normal,
            HourType::Setup => self.setup,
            HourType::Break => self.break_time,
            HourType::ExtraBreak => self.extra_break,
        }
    }

    /// 校验所有百分比在 0..=100
    pub fn validate(&self) -> Result<(), DomainError> {
        for hour_type in HourType::ALL {
            let percentage = self.percentage(hour_type);
            if percentage > 100 {
                return Err(DomainError::PercentageOutOfRange {
                    hour_type,
                    percentage,
                });
            }
        }
        Ok(())
    }
}
