// ==========================================
// 班次生产数据采集 - 生产录入 API
// ==========================================
// 职责: 持有生产会话，编排时段生成、班组确认、时段保存与会话恢复
// 保存顺序（单个时段）:
//   1. 班组快照（同步，先于任何异步调用）
//   2. 停机记录校验（同步，失败不发出任何远端请求）
//   3. 状态置为 InProgress，重算派生指标
//   4. 主记录保存（经身份解析器）；失败则回退 NotStarted 并报错
//   5. 若因过期身份重建，子记录身份全部重置
//   6. 写入班组分配（跳过远端已存在的员工）
//   7. 停机记录对账
//   8. 状态置为 Completed
// 每次会话变更后重写本地镜像
// ==========================================

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::config::CaptureConfigReader;
use crate::domain::downtime::DowntimeRecord;
use crate::domain::session::{FormValues, ProductionSession};
use crate::domain::shift::{HourTypePercentages, LocationRef, Part, ShiftContext};
use crate::domain::slot::{HourSlot, RecordIdentity};
use crate::domain::team::{merge_unique_members, qualification_on, ActorSlot, Actors, TeamMember};
use crate::domain::types::{HourType, Notification, RecordId, SlotStatus, TeamRole};
use crate::engine::downtime_reconciler::{
    validate_downtimes, DowntimeReconciler, ReconcileOutcome, ReconcileReport,
};
use crate::engine::fan_out::fan_out;
use crate::engine::hour_schedule::generate_hour_slots;
use crate::engine::identity_resolver::{IdentityResolver, ResolveError};
use crate::engine::session_persistence::{RestoreOutcome, SessionPersistenceManager};
use crate::engine::team_carry_forward::TeamEditor;
use crate::i18n::t_with_args;
use crate::remote::{HourRecordPayload, RemoteDowntime, RemoteStore, TeamAssignmentPayload};
use crate::repository::SessionSnapshotRepository;

// ==========================================
// 请求/响应 DTO
// ==========================================

/// 班次设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftSetup {
    pub shift_id: RecordId,
    pub date: NaiveDate,
    pub project_id: RecordId,
    pub location: LocationRef,
    pub part: Part,
    pub zone_id: Option<RecordId>,
}

/// 时段录入
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotEntry {
    pub output: Option<u32>,
    pub scrap: Option<u32>,
    /// 期望的停机记录列表（已保存的条目携带身份，新条目为 Unsaved）
    pub downtimes: Vec<DowntimeRecord>,
}

/// 时段保存结果
#[derive(Debug, Clone, PartialEq)]
pub struct SlotSaveReport {
    pub hour_number: u32,
    pub record_id: RecordId,
    pub created: bool,
    pub recreated: bool,
    pub team_assigned: usize,
    pub team_skipped: usize,
    pub team_failed: usize,
    pub downtime: ReconcileReport,
    pub notifications: Vec<Notification>,
}

// ==========================================
// ProductionApi - 生产录入 API
// ==========================================

/// 生产录入API
///
/// 职责：
/// 1. 班次设置与时段生成
/// 2. 岗位与班组成员（按工牌查询）
/// 3. 时段班组确认与保存编排
/// 4. 本地镜像与启动恢复
///
/// 单一编辑者：所有修改入口均为 `&mut self`
pub struct ProductionApi<R: RemoteStore> {
    remote: Arc<R>,
    config: Arc<dyn CaptureConfigReader>,
    persistence: SessionPersistenceManager,
    session: ProductionSession,
    form_values: FormValues,
    team_editor: Option<TeamEditor>,
}

impl<R: RemoteStore> ProductionApi<R> {
    /// 创建新的ProductionApi实例（空会话）
    pub fn new(
        remote: Arc<R>,
        repo: Arc<SessionSnapshotRepository>,
        config: Arc<dyn CaptureConfigReader>,
    ) -> Self {
        let persistence = SessionPersistenceManager::new(repo, Arc::clone(&config));
        Self {
            remote,
            config,
            persistence,
            session: ProductionSession::empty(),
            form_values: FormValues::default(),
            team_editor: None,
        }
    }

    // ===== 只读访问 =====

    pub fn session(&self) -> &ProductionSession {
        &self.session
    }

    pub fn form_values(&self) -> &FormValues {
        &self.form_values
    }

    /// 当前打开时段的班组编辑器
    pub fn team_editor(&self) -> Option<&TeamEditor> {
        self.team_editor.as_ref()
    }

    pub fn remote(&self) -> &R {
        self.remote.as_ref()
    }

    // ==========================================
    // 会话生命周期
    // ==========================================

    /// 完成班次设置，生成小时时段
    ///
    /// # 参数
    /// - setup: 班次、日期、项目、产线/工序、零件
    ///
    /// # 返回
    /// - Ok(&ProductionSession): 新会话
    /// - Err(ReferenceNotFound): 班次或项目在远端不存在
    pub async fn start_session(&mut self, setup: ShiftSetup) -> ApiResult<&ProductionSession> {
        let shift = self
            .remote
            .fetch_shift(setup.shift_id)
            .await?
            .ok_or_else(|| ApiError::ReferenceNotFound(format!("shift_id={}", setup.shift_id)))?;
        shift.validate()?;
        if !self.remote.project_exists(setup.project_id).await? {
            return Err(ApiError::ReferenceNotFound(format!(
                "project_id={}",
                setup.project_id
            )));
        }

        let percentages = self.percentages().await?;
        let slots = generate_hour_slots(&shift, &setup.part, &percentages);

        // 班次班组: 沿用内存中的班组，其次读取上一班次留下的镜像
        let mut shift_team = self.session.shift_team.clone();
        if shift_team.is_empty() {
            if let Some(mirrored) = self.persistence.restore_shift_team(Utc::now()).await? {
                shift_team = mirrored;
            }
        }

        let context = ShiftContext {
            shift,
            date: setup.date,
            project_id: setup.project_id,
            location: setup.location,
            part: setup.part,
            zone_id: setup.zone_id,
        };
        let actors = self.session.actors.clone();
        self.session = ProductionSession::begin(context, slots, shift_team, actors);
        self.team_editor = None;
        self.mirror()?;

        info!(
            session_id = self.session.session_id(),
            slots = self.session.slots().len(),
            date = %setup.date,
            "班次会话已开始"
        );
        Ok(&self.session)
    }

    /// 启动时恢复会话
    pub async fn restore(&mut self) -> ApiResult<RestoreOutcome> {
        self.restore_at(Utc::now()).await
    }

    /// 以指定当前时间恢复会话
    pub async fn restore_at(&mut self, now: DateTime<Utc>) -> ApiResult<RestoreOutcome> {
        let outcome = self.persistence.restore(self.remote.as_ref(), now).await?;
        match &outcome {
            RestoreOutcome::Restored {
                session,
                form_values,
                ..
            } => {
                self.session = session.clone();
                self.form_values = form_values.clone();
            }
            RestoreOutcome::Expired { .. } | RestoreOutcome::Cleared { .. } => {
                self.session = ProductionSession::empty();
                self.form_values = FormValues::default();
            }
            RestoreOutcome::NoSnapshot => {}
        }
        self.team_editor = None;
        Ok(outcome)
    }

    /// 开始新的生产（丢弃当前会话，保留班次班组镜像）
    pub fn new_production(&mut self) -> ApiResult<()> {
        self.persistence.discard_session()?;
        self.session = ProductionSession::empty();
        self.form_values = FormValues::default();
        self.team_editor = None;
        info!("已开始新的生产会话");
        Ok(())
    }

    // ==========================================
    // 班组与岗位
    // ==========================================

    /// 设置班次班组（按员工去重）
    pub fn set_shift_team(&mut self, members: Vec<TeamMember>) -> ApiResult<()> {
        let mut unique = Vec::with_capacity(members.len());
        merge_unique_members(&mut unique, members.iter());
        self.session.set_shift_team(unique);
        self.mirror()
    }

    /// 按工牌指派岗位（线长/质量/维修/PQC）
    pub async fn assign_actor(&mut self, role: TeamRole, badge: &str) -> ApiResult<ActorSlot> {
        if role == TeamRole::Operator {
            return Err(ApiError::InvalidInput("操作工不是岗位角色".to_string()));
        }
        let employee = self
            .remote
            .find_employee_by_badge(badge.trim())
            .await?
            .ok_or_else(|| ApiError::EmployeeNotFound(badge.trim().to_string()))?;

        let actor = ActorSlot {
            employee_id: employee.employee_id,
            badge: employee.badge.clone(),
            name: employee.full_name(),
            qualification: qualification_on(employee.qualification_valid_until, self.reference_date()),
        };

        if let Some(slot) = self.session.actors.slot_mut(role) {
            *slot = Some(actor.clone());
        }
        self.mirror()?;
        info!(role = %role, badge = %actor.badge, "岗位已指派");
        Ok(actor)
    }

    /// 按工牌查询班组成员（不修改会话）
    pub async fn lookup_team_member(
        &self,
        badge: &str,
        workstation_id: Option<RecordId>,
        machine_id: Option<RecordId>,
    ) -> ApiResult<TeamMember> {
        let employee = self
            .remote
            .find_employee_by_badge(badge.trim())
            .await?
            .ok_or_else(|| ApiError::EmployeeNotFound(badge.trim().to_string()))?;

        Ok(TeamMember {
            employee_id: employee.employee_id,
            badge: employee.badge.clone(),
            name: employee.full_name(),
            workstation_id,
            machine_id,
            qualification: qualification_on(employee.qualification_valid_until, self.reference_date()),
            role: TeamRole::Operator,
        })
    }

    // ==========================================
    // 表单与时段
    // ==========================================

    pub fn set_order_number(&mut self, order_number: Option<String>) -> ApiResult<()> {
        self.form_values.order_number = order_number
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self.mirror()
    }

    /// 班次备注（仅本地表单，随会话镜像）
    pub fn set_comment(&mut self, comment: Option<String>) -> ApiResult<()> {
        self.form_values.comment = comment
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self.mirror()
    }

    /// 切换时段小时类型并重算目标
    pub async fn set_hour_type(&mut self, hour_number: u32, hour_type: HourType) -> ApiResult<&HourSlot> {
        let part = self
            .session
            .context
            .as_ref()
            .map(|ctx| ctx.part.clone())
            .ok_or(ApiError::SessionNotStarted)?;
        let percentages = self.percentages().await?;

        self.session
            .slot_mut(hour_number)
            .ok_or(ApiError::SlotNotFound(hour_number))?
            .apply_hour_type(hour_type, &part, &percentages);
        self.mirror()?;

        self.session
            .slot(hour_number)
            .ok_or(ApiError::SlotNotFound(hour_number))
    }

    /// 打开时段，按沿用规则初始化班组
    pub fn open_slot(&mut self, hour_number: u32) -> ApiResult<&TeamEditor> {
        if !self.session.is_setup_complete() {
            return Err(ApiError::SessionNotStarted);
        }
        if self.session.slot(hour_number).is_none() {
            return Err(ApiError::SlotNotFound(hour_number));
        }
        let editor = TeamEditor::open(self.session.slots(), hour_number, self.session.shift_team());
        Ok(self.team_editor.insert(editor))
    }

    pub fn accept_team(&mut self) -> ApiResult<()> {
        self.editor_mut()?.accept();
        Ok(())
    }

    pub fn modify_team(&mut self) -> ApiResult<()> {
        self.editor_mut()?.modify();
        Ok(())
    }

    pub fn add_team_member(&mut self, member: TeamMember) -> ApiResult<()> {
        self.editor_mut()?.add_member(member)?;
        Ok(())
    }

    pub fn remove_team_member(&mut self, employee_id: RecordId) -> ApiResult<TeamMember> {
        Ok(self.editor_mut()?.remove_member(employee_id)?)
    }

    pub fn confirm_team(&mut self) -> ApiResult<()> {
        self.editor_mut()?.confirm();
        Ok(())
    }

    // ==========================================
    // 时段保存
    // ==========================================

    /// 保存时段（主记录 + 班组分配 + 停机记录）
    ///
    /// # 返回
    /// - Ok(SlotSaveReport): 主记录已保存；子记录部分失败时在通知中说明
    /// - Err(TeamNotConfirmed / NoTeamAssigned / DowntimeValidation): 校验失败，未发出远端请求
    /// - Err(RecordNotFound): 待确认记录查询未命中，身份保持 Pending
    /// - Err(StaleAfterRecreate): 重建后仍不存在，时段回退 NotStarted
    pub async fn save_slot(&mut self, hour_number: u32, entry: SlotEntry) -> ApiResult<SlotSaveReport> {
        // ===== 1. 班组快照（同步） =====
        let team = self
            .team_editor
            .as_ref()
            .filter(|editor| editor.hour_number() == hour_number)
            .ok_or(ApiError::NoSlotOpen)?
            .snapshot_for_save()?;

        // ===== 2. 停机记录校验 =====
        validate_downtimes(&entry.downtimes).map_err(ApiError::DowntimeValidation)?;

        let context = self.session.context.clone().ok_or(ApiError::SessionNotStarted)?;

        // ===== 3. InProgress =====
        let previous_team = {
            let slot = self
                .session
                .slot_mut(hour_number)
                .ok_or(ApiError::SlotNotFound(hour_number))?;
            slot.status = SlotStatus::InProgress;
            slot.record_production(entry.output, entry.scrap);
            std::mem::replace(&mut slot.team, team.clone())
        };
        self.mirror()?;

        let payload = {
            let slot = self
                .session
                .slot(hour_number)
                .ok_or(ApiError::SlotNotFound(hour_number))?;
            build_hour_payload(&context, slot, &self.form_values, self.session.actors())
        };

        // ===== 4. 主记录 =====
        let remote = Arc::clone(&self.remote);
        let resolver = IdentityResolver::new(remote.as_ref());
        let primary = match self.session.slot_mut(hour_number) {
            Some(slot) => resolver.save_primary(&mut slot.remote_identity, &payload).await,
            None => return Err(ApiError::SlotNotFound(hour_number)),
        };
        let primary = match primary {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(hour = hour_number, error = %e, "主记录保存失败");
                if let Some(slot) = self.session.slot_mut(hour_number) {
                    slot.status = SlotStatus::NotStarted;
                    slot.team = previous_team;
                }
                self.mirror_or_log();
                return Err(e.into());
            }
        };

        let mut notifications = Vec::new();

        // ===== 5. 重建后子记录身份重置 =====
        let mut desired = entry.downtimes;
        if primary.recreated {
            for downtime in desired.iter_mut() {
                downtime.remote_identity = RecordIdentity::Unsaved;
            }
            notifications.push(Notification::warning(t_with_args(
                "slot.recreated",
                &[("hour", &hour_number.to_string())],
            )));
        }

        let record_id = match self.session.slot_mut(hour_number) {
            Some(slot) => {
                resolver
                    .resolve_for_child_write(&mut slot.remote_identity, primary.recreated)
                    .await
            }
            None => return Err(ApiError::SlotNotFound(hour_number)),
        };
        let record_id = match record_id {
            Ok(id) => id,
            Err(e) => {
                warn!(hour = hour_number, error = %e, "子记录写入前身份解析失败");
                // 重建后的第二次未命中: 本动作失败，时段回退
                if matches!(e, ResolveError::StaleAfterRecreate(_)) {
                    if let Some(slot) = self.session.slot_mut(hour_number) {
                        slot.status = SlotStatus::NotStarted;
                        slot.team = previous_team;
                    }
                }
                self.mirror_or_log();
                return Err(e.into());
            }
        };

        // ===== 6. 班组分配 =====
        let already_assigned: HashSet<RecordId> = if primary.created {
            HashSet::new()
        } else {
            match remote.fetch_team_assignments(record_id).await {
                Ok(records) => records.into_iter().map(|r| r.employee_id).collect(),
                Err(e) => {
                    warn!(hour = hour_number, error = %e, "读取已有班组分配失败，按全部新增处理");
                    HashSet::new()
                }
            }
        };
        let to_assign: Vec<TeamMember> = team
            .iter()
            .filter(|m| !already_assigned.contains(&m.employee_id))
            .cloned()
            .collect();
        let team_skipped = team.len() - to_assign.len();

        let assignment_report = fan_out(to_assign, |member| {
            let payload = TeamAssignmentPayload {
                hour_record_id: record_id,
                employee_id: member.employee_id,
                workstation_id: member.workstation_id,
                machine_id: member.machine_id,
            };
            let remote = Arc::clone(&remote);
            async move { remote.create_team_assignment(&payload).await }
        })
        .await;
        if assignment_report.failure_count() > 0 {
            notifications.push(Notification::warning(t_with_args(
                "slot.team_assign_failed",
                &[("count", &assignment_report.failure_count().to_string())],
            )));
        }

        // ===== 7. 停机记录对账 =====
        let persisted: Vec<DowntimeRecord> = if primary.created {
            Vec::new()
        } else {
            match remote.fetch_downtimes(record_id).await {
                Ok(list) => list.into_iter().map(RemoteDowntime::into_record).collect(),
                Err(e) => {
                    warn!(hour = hour_number, error = %e, "读取远端停机记录失败，使用本地已确认记录");
                    self.session
                        .slot(hour_number)
                        .map(|s| {
                            s.downtimes
                                .iter()
                                .filter(|d| d.remote_id().is_some())
                                .cloned()
                                .collect()
                        })
                        .unwrap_or_default()
                }
            }
        };

        let reconciler = DowntimeReconciler::new(remote.as_ref());
        let downtime = match self.session.slot_mut(hour_number) {
            Some(slot) => reconciler.reconcile(slot, desired, &persisted).await,
            None => return Err(ApiError::SlotNotFound(hour_number)),
        };
        if let ReconcileOutcome::Partial { saved, failed } = downtime.outcome {
            notifications.push(Notification::warning(t_with_args(
                "slot.downtime_partial",
                &[("saved", &saved.to_string()), ("failed", &failed.to_string())],
            )));
        }

        // ===== 8. Completed =====
        if let Some(slot) = self.session.slot_mut(hour_number) {
            slot.status = SlotStatus::Completed;
        }
        self.team_editor = None;
        self.mirror()?;

        notifications.insert(
            0,
            Notification::success(t_with_args("slot.saved", &[("hour", &hour_number.to_string())])),
        );

        info!(
            hour = hour_number,
            record_id,
            created = primary.created,
            recreated = primary.recreated,
            team_assigned = assignment_report.success_count(),
            team_failed = assignment_report.failure_count(),
            downtime_total = downtime.total_downtime,
            "时段保存完成"
        );

        Ok(SlotSaveReport {
            hour_number,
            record_id,
            created: primary.created,
            recreated: primary.recreated,
            team_assigned: assignment_report.success_count(),
            team_skipped,
            team_failed: assignment_report.failure_count(),
            downtime,
            notifications,
        })
    }

    // ==========================================
    // 内部工具
    // ==========================================

    fn editor_mut(&mut self) -> ApiResult<&mut TeamEditor> {
        self.team_editor.as_mut().ok_or(ApiError::NoSlotOpen)
    }

    fn mirror(&self) -> ApiResult<()> {
        self.persistence.mirror(&self.session, &self.form_values)?;
        Ok(())
    }

    /// 错误路径上的镜像写入：失败仅记录日志，保留原始错误
    fn mirror_or_log(&self) {
        if let Err(e) = self.mirror() {
            error!(error = %e, "会话镜像写入失败");
        }
    }

    async fn percentages(&self) -> ApiResult<HourTypePercentages> {
        let percentages = self
            .config
            .get_hour_type_percentages()
            .await
            .map_err(|e| ApiError::Config(e.to_string()))?;
        percentages.validate()?;
        Ok(percentages)
    }

    /// 资质判定日期：班次日期，未设置时取今天
    fn reference_date(&self) -> NaiveDate {
        self.session
            .context()
            .map(|ctx| ctx.date)
            .unwrap_or_else(|| Utc::now().date_naive())
    }
}

/// 组装小时记录载荷
fn build_hour_payload(
    context: &ShiftContext,
    slot: &HourSlot,
    form_values: &FormValues,
    actors: &Actors,
) -> HourRecordPayload {
    HourRecordPayload {
        date: context.date,
        shift_id: context.shift.shift_id,
        hour_number: slot.hour_number,
        hour_type_code: slot.hour_type.code().to_string(),
        part_id: context.part.part_id,
        location: context.location,
        zone_id: context.zone_id,
        result: slot.output,
        scrap: slot.scrap,
        target: slot.target,
        headcount: slot.headcount() as u32,
        order_number: form_values.order_number.clone(),
        line_leader_badge: actors.badge(TeamRole::LineLeader).map(str::to_string),
        quality_agent_badge: actors.badge(TeamRole::QualityAgent).map(str::to_string),
        maintenance_tech_badge: actors.badge(TeamRole::MaintenanceTech).map(str::to_string),
        pqc_badge: actors.badge(TeamRole::Pqc).map(str::to_string),
    }
}
