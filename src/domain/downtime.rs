// ==========================================
// 班次生产数据采集 - 停机记录领域模型
// ==========================================
// 红线: duration > 0，comment 非空
// ==========================================

use crate::domain::slot::RecordIdentity;
use crate::domain::types::RecordId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// DowntimeRecord - 停机记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DowntimeRecord {
    /// 本地键（界面定位未保存行用）
    pub client_key: String,
    pub duration_minutes: u32,
    pub problem_type_id: RecordId,
    #[serde(default)]
    pub machine_id: Option<RecordId>,
    pub comment: String,
    #[serde(default)]
    pub remote_identity: RecordIdentity,
}

impl DowntimeRecord {
    /// 新建未保存的停机记录
    pub fn new(
        duration_minutes: u32,
        problem_type_id: RecordId,
        machine_id: Option<RecordId>,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            client_key: Uuid::new_v4().to_string(),
            duration_minutes,
            problem_type_id,
            machine_id,
            comment: comment.into(),
            remote_identity: RecordIdentity::Unsaved,
        }
    }

    /// 与已持久化记录比较业务字段（忽略本地键与身份）
    pub fn same_content(&self, other: &DowntimeRecord) -> bool {
        self.duration_minutes == other.duration_minutes
            && self.problem_type_id == other.problem_type_id
            && self.machine_id == other.machine_id
            && self.comment.trim() == other.comment.trim()
    }

    pub fn remote_id(&self) -> Option<RecordId> {
        self.remote_identity.id()
    }
}
