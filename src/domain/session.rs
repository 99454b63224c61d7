// ==========================================
// 班次生产数据采集 - 生产会话聚合
// ==========================================
// 职责: 班次上下文、班次班组、四个岗位、小时时段序列、流程标记
// 红线: 会话只通过 crate 内的入口修改（ProductionApi / 各引擎），不对外暴露可变引用
// ==========================================

use crate::domain::shift::ShiftContext;
use crate::domain::slot::{HourSlot, NaturalKey};
use crate::domain::team::{Actors, TeamMember};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 订单相关表单字段
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormValues {
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

// ==========================================
// ProductionSession - 生产会话
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionSession {
    pub(crate) session_id: String,
    #[serde(default)]
    pub(crate) context: Option<ShiftContext>,
    #[serde(default)]
    pub(crate) shift_team: Vec<TeamMember>,
    #[serde(default)]
    pub(crate) actors: Actors,
    #[serde(default)]
    pub(crate) slots: Vec<HourSlot>,
    #[serde(default)]
    pub(crate) is_setup_complete: bool,
    #[serde(default)]
    pub(crate) is_team_complete: bool,
}

impl Default for ProductionSession {
    fn default() -> Self {
        Self::empty()
    }
}

impl ProductionSession {
    /// 空会话（未完成班次设置）
    pub fn empty() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            context: None,
            shift_team: Vec::new(),
            actors: Actors::default(),
            slots: Vec::new(),
            is_setup_complete: false,
            is_team_complete: false,
        }
    }

    /// 班次设置完成时创建会话
    pub(crate) fn begin(
        context: ShiftContext,
        slots: Vec<HourSlot>,
        shift_team: Vec<TeamMember>,
        actors: Actors,
    ) -> Self {
        let is_team_complete = !shift_team.is_empty();
        Self {
            session_id: Uuid::new_v4().to_string(),
            context: Some(context),
            shift_team,
            actors,
            slots,
            is_setup_complete: true,
            is_team_complete,
        }
    }

    // ===== 只读访问 =====

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn context(&self) -> Option<&ShiftContext> {
        self.context.as_ref()
    }

    pub fn shift_team(&self) -> &[TeamMember] {
        &self.shift_team
    }

    pub fn actors(&self) -> &Actors {
        &self.actors
    }

    pub fn slots(&self) -> &[HourSlot] {
        &self.slots
    }

    pub fn slot(&self, hour_number: u32) -> Option<&HourSlot> {
        self.slots.iter().find(|s| s.hour_number == hour_number)
    }

    pub fn is_setup_complete(&self) -> bool {
        self.is_setup_complete
    }

    pub fn is_team_complete(&self) -> bool {
        self.is_team_complete
    }

    pub fn natural_key(&self, hour_number: u32) -> Option<NaturalKey> {
        self.context.as_ref().map(|ctx| NaturalKey {
            date: ctx.date,
            shift_id: ctx.shift.shift_id,
            hour_number,
        })
    }

    // ===== crate 内修改入口 =====

    pub(crate) fn slot_mut(&mut self, hour_number: u32) -> Option<&mut HourSlot> {
        self.slots.iter_mut().find(|s| s.hour_number == hour_number)
    }

    pub(crate) fn set_shift_team(&mut self, members: Vec<TeamMember>) {
        self.is_team_complete = !members.is_empty();
        self.shift_team = members;
    }

    // ===== 班次汇总 =====

    pub fn total_target(&self) -> u32 {
        self.slots.iter().map(|s| s.target).sum()
    }

    pub fn total_output(&self) -> u32 {
        self.slots.iter().filter_map(|s| s.output).sum()
    }

    pub fn total_scrap(&self) -> u32 {
        self.slots.iter().filter_map(|s| s.scrap).sum()
    }

    pub fn total_downtime(&self) -> u32 {
        self.slots.iter().map(|s| s.total_downtime).sum()
    }

    /// 已录入时段的整体效率: round(Σoutput / Σtarget × 100)
    pub fn shift_efficiency(&self) -> Option<u32> {
        let recorded: Vec<&HourSlot> = self.slots.iter().filter(|s| s.output.is_some()).collect();
        let target: u32 = recorded.iter().map(|s| s.target).sum();
        if recorded.is_empty() || target == 0 {
            return None;
        }
        let output: u32 = recorded.iter().filter_map(|s| s.output).sum();
        Some((output as f64 / target as f64 * 100.0).round() as u32)
    }

    /// 各时段班组人数之和（恢复时用作期望值）
    pub fn recorded_headcount(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.remote_identity.is_confirmed())
            .map(|s| s.team.len())
            .sum()
    }
}
