// ==========================================
// 班次生产数据采集 - 班组沿用引擎
// ==========================================
// 种子选择优先级（确定性，按序判断）:
// (a) 时段已保存班组 -> AutoConfirmed
// (b) 自前一时段向前回溯到第 1 时段，取最近的非空班组 -> AutoConfirmed
// (c) 第 1 时段且班次班组非空 -> AutoConfirmed
// (c') 第 n>1 时段、前面均无班组、班次班组非空 -> 以班次班组为种子，NeedsConfirmation
// (d) 空班组 -> NeedsConfirmation
// 状态机:
//   NeedsConfirmation --accept/confirm--> UserConfirmed
//   AutoConfirmed/UserConfirmed --modify--> NeedsConfirmation（保留成员）
//   成员增删仅允许在 NeedsConfirmation 下进行
// ==========================================

use crate::domain::slot::HourSlot;
use crate::domain::team::TeamMember;
use crate::domain::types::{RecordId, TeamState};
use thiserror::Error;

/// 班组错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TeamError {
    #[error("班组未确认: 第{hour}小时")]
    NotConfirmed { hour: u32 },

    #[error("未分配班组: 第{hour}小时")]
    Empty { hour: u32 },

    #[error("当前状态不允许编辑班组: 第{hour}小时 state={state}")]
    EditNotAllowed { hour: u32, state: TeamState },

    #[error("员工已在班组中: 第{hour}小时 employee_id={employee_id}")]
    DuplicateMember { hour: u32, employee_id: RecordId },

    #[error("员工不在班组中: 第{hour}小时 employee_id={employee_id}")]
    MemberNotFound { hour: u32, employee_id: RecordId },
}

/// 种子来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedSource {
    SavedOnSlot,
    CarriedFrom(u32),
    ShiftTeam,
    Empty,
}

/// 种子结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamSeed {
    pub members: Vec<TeamMember>,
    pub state: TeamState,
    pub source: SeedSource,
}

/// 为时段选择初始班组
pub fn seed_team(slots: &[HourSlot], hour_number: u32, shift_team: &[TeamMember]) -> TeamSeed {
    // (a) 已保存
    if let Some(slot) = slots.iter().find(|s| s.hour_number == hour_number) {
        if !slot.team.is_empty() {
            return TeamSeed {
                members: slot.team.clone(),
                state: TeamState::AutoConfirmed,
                source: SeedSource::SavedOnSlot,
            };
        }
    }

    // (b) 向前回溯
    let carried = (1..hour_number)
        .rev()
        .filter_map(|h| slots.iter().find(|s| s.hour_number == h))
        .find(|s| !s.team.is_empty());
    if let Some(previous) = carried {
        return TeamSeed {
            members: previous.team.clone(),
            state: TeamState::AutoConfirmed,
            source: SeedSource::CarriedFrom(previous.hour_number),
        };
    }

    // (c) / (c') 班次班组
    if !shift_team.is_empty() {
        let state = if hour_number == 1 {
            TeamState::AutoConfirmed
        } else {
            TeamState::NeedsConfirmation
        };
        return TeamSeed {
            members: shift_team.to_vec(),
            state,
            source: SeedSource::ShiftTeam,
        };
    }

    // (d) 空
    TeamSeed {
        members: Vec::new(),
        state: TeamState::NeedsConfirmation,
        source: SeedSource::Empty,
    }
}

// ==========================================
// TeamEditor - 单个时段的班组确认状态机
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamEditor {
    hour_number: u32,
    members: Vec<TeamMember>,
    state: TeamState,
    source: SeedSource,
}

impl TeamEditor {
    /// 打开时段，按种子策略初始化
    pub fn open(slots: &[HourSlot], hour_number: u32, shift_team: &[TeamMember]) -> Self {
        let seed = seed_team(slots, hour_number, shift_team);
        tracing::debug!(
            hour = hour_number,
            state = %seed.state,
            source = ?seed.source,
            members = seed.members.len(),
            "班组种子"
        );
        Self {
            hour_number,
            members: seed.members,
            state: seed.state,
            source: seed.source,
        }
    }

    pub fn hour_number(&self) -> u32 {
        self.hour_number
    }

    pub fn members(&self) -> &[TeamMember] {
        &self.members
    }

    pub fn state(&self) -> TeamState {
        self.state
    }

    pub fn source(&self) -> SeedSource {
        self.source
    }

    /// 接受种子班组（不做修改）
    pub fn accept(&mut self) {
        if self.state == TeamState::NeedsConfirmation {
            self.state = TeamState::UserConfirmed;
        }
    }

    /// 编辑完成后显式确认
    pub fn confirm(&mut self) {
        self.accept();
    }

    /// 从已确认状态回到手动编辑，保留当前成员
    pub fn modify(&mut self) {
        self.state = TeamState::NeedsConfirmation;
    }

    fn ensure_editable(&self) -> Result<(), TeamError> {
        if self.state == TeamState::NeedsConfirmation {
            Ok(())
        } else {
            Err(TeamError::EditNotAllowed {
                hour: self.hour_number,
                state: self.state,
            })
        }
    }

    pub fn add_member(&mut self, member: TeamMember) -> Result<(), TeamError> {
        self.ensure_editable()?;
        if self.members.iter().any(|m| m.employee_id == member.employee_id) {
            return Err(TeamError::DuplicateMember {
                hour: self.hour_number,
                employee_id: member.employee_id,
            });
        }
        self.members.push(member);
        Ok(())
    }

    pub fn remove_member(&mut self, employee_id: RecordId) -> Result<TeamMember, TeamError> {
        self.ensure_editable()?;
        let index = self
            .members
            .iter()
            .position(|m| m.employee_id == employee_id)
            .ok_or(TeamError::MemberNotFound {
                hour: self.hour_number,
                employee_id,
            })?;
        Ok(self.members.remove(index))
    }

    /// 保存前快照（同步获取，先于任何异步调用）
    pub fn snapshot_for_save(&self) -> Result<Vec<TeamMember>, TeamError> {
        if !self.state.is_confirmed() {
            return Err(TeamError::NotConfirmed {
                hour: self.hour_number,
            });
        }
        if self.members.is_empty() {
            return Err(TeamError::Empty {
                hour: self.hour_number,
            });
        }
        Ok(self.members.clone())
    }
}
