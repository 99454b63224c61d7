// ==========================================
// 班次生产数据采集 - 班组领域模型
// ==========================================
// 职责: 班组成员、四个岗位角色（线长/质量/维修/PQC）
// ==========================================

use crate::domain::types::{QualificationStatus, RecordId, TeamRole};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// TeamMember - 班组成员
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub employee_id: RecordId,
    pub badge: String,
    pub name: String,
    #[serde(default)]
    pub workstation_id: Option<RecordId>,
    #[serde(default)]
    pub machine_id: Option<RecordId>,
    #[serde(default)]
    pub qualification: QualificationStatus,
    #[serde(default)]
    pub role: TeamRole,
}

/// 按员工去重合并（保留先出现者）
pub fn merge_unique_members<'a, I>(target: &mut Vec<TeamMember>, incoming: I)
where
    I: IntoIterator<Item = &'a TeamMember>,
{
    for member in incoming {
        if !target.iter().any(|m| m.employee_id == member.employee_id) {
            target.push(member.clone());
        }
    }
}

/// 由资质有效期推导资质状态
pub fn qualification_on(valid_until: Option<NaiveDate>, date: NaiveDate) -> QualificationStatus {
    match valid_until {
        Some(until) if until >= date => QualificationStatus::Valid,
        Some(_) => QualificationStatus::Expired,
        None => QualificationStatus::Missing,
    }
}

// ==========================================
// ActorSlot - 岗位角色（按工牌）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorSlot {
    pub employee_id: RecordId,
    pub badge: String,
    pub name: String,
    pub qualification: QualificationStatus,
}

/// 班次四个岗位
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actors {
    #[serde(default)]
    pub line_leader: Option<ActorSlot>,
    #[serde(default)]
    pub quality_agent: Option<ActorSlot>,
    #[serde(default)]
    pub maintenance_tech: Option<ActorSlot>,
    #[serde(default)]
    pub pqc: Option<ActorSlot>,
}

impl Actors {
    /// 按角色取岗位；Operator 无岗位
    pub fn slot_mut(&mut self, role: TeamRole) -> Option<&mut Option<ActorSlot>> {
        match role {
            TeamRole::LineLeader => Some(&mut self.line_leader),
            TeamRole::QualityAgent => Some(&mut self.quality_agent),
            TeamRole::MaintenanceTech => Some(&mut self.maintenance_tech),
            TeamRole::Pqc => Some(&mut self.pqc),
            TeamRole::Operator => None,
        }
    }

    pub fn badge(&self, role: TeamRole) -> Option<&str> {
        let slot = match role {
            TeamRole::LineLeader => &self.line_leader,
            TeamRole::QualityAgent => &self.quality_agent,
            TeamRole::MaintenanceTech => &self.maintenance_tech,
            TeamRole::Pqc => &self.pqc,
            TeamRole::Operator => return None,
        };
        slot.as_ref().map(|a| a.badge.as_str())
    }
}
