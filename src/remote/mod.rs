// ==========================================
// 班次生产数据采集 - 远端持久化接口
// ==========================================
// 职责: 定义远端存储协作方的窄接口（不包含实现）
// 说明: 创建/查询响应以原始 JSON 返回，由 identity 模块在边界处一次性解码
// ==========================================

pub mod identity;
pub mod memory;

use crate::domain::downtime::DowntimeRecord;
use crate::domain::shift::{LocationRef, ShiftDefinition};
use crate::domain::slot::{NaturalKey, RecordIdentity};
use crate::domain::types::RecordId;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub use identity::{decode_created_identity, extract_record_id};
pub use memory::{InMemoryRemoteStore, RemoteOp, ResponseShape};

// ==========================================
// 远端错误
// ==========================================
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("远端记录不存在: {entity} id={id}")]
    NotFound { entity: String, id: String },

    #[error("远端拒绝请求 (status={status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("远端请求失败: {0}")]
    Transport(String),

    #[error("远端响应解析失败: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        RemoteError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

// ==========================================
// 请求/响应载荷
// ==========================================

/// 小时生产记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourRecordPayload {
    pub date: NaiveDate,
    pub shift_id: RecordId,
    pub hour_number: u32,
    pub hour_type_code: String,
    pub part_id: RecordId,
    pub location: LocationRef,
    pub zone_id: Option<RecordId>,
    pub result: Option<u32>,
    pub scrap: Option<u32>,
    pub target: u32,
    pub headcount: u32,
    pub order_number: Option<String>,
    pub line_leader_badge: Option<String>,
    pub quality_agent_badge: Option<String>,
    pub maintenance_tech_badge: Option<String>,
    pub pqc_badge: Option<String>,
}

impl HourRecordPayload {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            date: self.date,
            shift_id: self.shift_id,
            hour_number: self.hour_number,
        }
    }
}

/// 停机记录写入
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DowntimePayload {
    pub hour_record_id: RecordId,
    pub duration_minutes: u32,
    pub comment: String,
    pub problem_type_id: RecordId,
    pub machine_id: Option<RecordId>,
}

/// 远端停机记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDowntime {
    pub id: RecordId,
    pub hour_record_id: RecordId,
    pub duration_minutes: u32,
    pub comment: String,
    pub problem_type_id: RecordId,
    pub machine_id: Option<RecordId>,
}

impl RemoteDowntime {
    /// 转换为本地停机记录（已确认身份）
    pub fn into_record(self) -> DowntimeRecord {
        DowntimeRecord {
            client_key: Uuid::new_v4().to_string(),
            duration_minutes: self.duration_minutes,
            problem_type_id: self.problem_type_id,
            machine_id: self.machine_id,
            comment: self.comment,
            remote_identity: RecordIdentity::Confirmed(self.id),
        }
    }
}

/// 班组分配写入
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamAssignmentPayload {
    pub hour_record_id: RecordId,
    pub employee_id: RecordId,
    pub workstation_id: Option<RecordId>,
    pub machine_id: Option<RecordId>,
}

/// 远端班组分配记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamAssignmentRecord {
    pub id: RecordId,
    pub hour_record_id: RecordId,
    pub employee_id: RecordId,
    pub workstation_id: Option<RecordId>,
    pub machine_id: Option<RecordId>,
    #[serde(default)]
    pub badge: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// 员工（按工牌查询）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRecord {
    pub employee_id: RecordId,
    pub badge: String,
    pub first_name: String,
    pub last_name: String,
    pub qualification_valid_until: Option<NaiveDate>,
}

impl EmployeeRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

// ==========================================
// RemoteStore Trait
// ==========================================
// 实现者: InMemoryRemoteStore（进程内实现）；真实 HTTP 客户端由宿主应用提供
#[async_trait]
pub trait RemoteStore: Send + Sync {
    // ===== 小时生产记录 =====

    /// 创建小时记录，返回原始响应
    async fn create_hour_record(&self, payload: &HourRecordPayload) -> RemoteResult<Value>;

    /// 更新小时记录；记录不存在时返回 NotFound
    async fn update_hour_record(
        &self,
        id: RecordId,
        payload: &HourRecordPayload,
    ) -> RemoteResult<Value>;

    /// 按自然键查询小时记录
    async fn find_hour_record(&self, key: &NaturalKey) -> RemoteResult<Option<Value>>;

    // ===== 停机记录 =====

    async fn fetch_downtimes(&self, hour_record_id: RecordId) -> RemoteResult<Vec<RemoteDowntime>>;

    async fn create_downtime(&self, payload: &DowntimePayload) -> RemoteResult<Value>;

    async fn update_downtime(&self, id: RecordId, payload: &DowntimePayload) -> RemoteResult<()>;

    async fn delete_downtime(&self, id: RecordId) -> RemoteResult<()>;

    // ===== 班组分配 =====

    async fn create_team_assignment(&self, payload: &TeamAssignmentPayload) -> RemoteResult<Value>;

    async fn fetch_team_assignments(
        &self,
        hour_record_id: RecordId,
    ) -> RemoteResult<Vec<TeamAssignmentRecord>>;

    // ===== 主数据 =====

    async fn find_employee_by_badge(&self, badge: &str) -> RemoteResult<Option<EmployeeRecord>>;

    /// 当前班次定义（不存在返回 None）
    async fn fetch_shift(&self, shift_id: RecordId) -> RemoteResult<Option<ShiftDefinition>>;

    async fn project_exists(&self, project_id: RecordId) -> RemoteResult<bool>;
}
