// ==========================================
// 班次生产数据采集 - 会话持久化管理器
// ==========================================
// 职责: 会话本地镜像（每次变更后整体重写）+ 启动时恢复
// 恢复流程:
//   1. 读取快照；不存在则不恢复
//   2. 按时间戳计算年龄；超过有效期（默认 12 小时）则丢弃
//   3. 缺失的时段字段由 serde 默认值补齐
//   4. 远端校验班次与项目仍存在；任一缺失则丢弃并提示"会话已清除"
//   5. 按当前班次定义重建时段骨架，按小时序号移植可变字段
//   6. 并发重新拉取已确认时段的班组分配，按小时合并并汇入班次班组；
//      远端无记录而本地有班组时，保留本地班组
// ==========================================

use crate::config::CaptureConfigReader;
use crate::config::DEFAULT_SESSION_TTL_HOURS;
use crate::domain::session::{FormValues, ProductionSession};
use crate::domain::shift::{DomainError, HourTypePercentages};
use crate::domain::slot::HourSlot;
use crate::domain::team::{merge_unique_members, TeamMember};
use crate::domain::types::{Notification, RecordId};
use crate::engine::fan_out::{fan_out, TeamResolution};
use crate::engine::hour_schedule::generate_hour_slots;
use crate::i18n::{t, t_with_args};
use crate::remote::{RemoteError, RemoteStore, TeamAssignmentRecord};
use crate::repository::{RepositoryError, SessionSnapshotRepository, StoredSnapshot, SESSION_KEY};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

// ==========================================
// 错误与结果
// ==========================================
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("本地存储错误: {0}")]
    Repository(#[from] RepositoryError),

    #[error("远端校验失败: {0}")]
    Remote(#[from] RemoteError),

    #[error("班次定义无效: {0}")]
    Domain(#[from] DomainError),
}

/// 会话被清除的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    ShiftGone,
    ProjectGone,
    Corrupt,
}

impl ClearReason {
    fn message_key(&self) -> &'static str {
        match self {
            ClearReason::ShiftGone => "session.cleared_shift_gone",
            ClearReason::ProjectGone => "session.cleared_project_gone",
            ClearReason::Corrupt => "session.cleared_corrupt",
        }
    }
}

/// 恢复结果
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreOutcome {
    /// 无本地快照
    NoSnapshot,
    /// 快照超过有效期，已丢弃
    Expired { age_hours: i64 },
    /// 快照失效，已丢弃并重置为空会话
    Cleared { reason: ClearReason },
    /// 恢复成功
    Restored {
        session: ProductionSession,
        form_values: FormValues,
        resolution: Option<TeamResolution>,
        notifications: Vec<Notification>,
    },
}

impl RestoreOutcome {
    /// 需要提示操作员的通知
    pub fn notifications(&self) -> Vec<Notification> {
        match self {
            RestoreOutcome::NoSnapshot => Vec::new(),
            RestoreOutcome::Expired { age_hours } => vec![Notification::info(t_with_args(
                "session.expired",
                &[("hours", &age_hours.to_string())],
            ))],
            RestoreOutcome::Cleared { reason } => {
                vec![Notification::warning(t(reason.message_key()))]
            }
            RestoreOutcome::Restored { notifications, .. } => notifications.clone(),
        }
    }
}

// ==========================================
// SessionPersistenceManager
// ==========================================
pub struct SessionPersistenceManager {
    repo: Arc<SessionSnapshotRepository>,
    config: Arc<dyn CaptureConfigReader>,
}

impl SessionPersistenceManager {
    pub fn new(repo: Arc<SessionSnapshotRepository>, config: Arc<dyn CaptureConfigReader>) -> Self {
        Self { repo, config }
    }

    /// 会话变更后整体重写本地镜像（含班次班组窄镜像）
    pub fn mirror(
        &self,
        session: &ProductionSession,
        form_values: &FormValues,
    ) -> Result<(), PersistenceError> {
        self.mirror_at(session, form_values, Utc::now())
    }

    /// 以指定时间戳写入镜像
    pub fn mirror_at(
        &self,
        session: &ProductionSession,
        form_values: &FormValues,
        timestamp: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let snapshot = StoredSnapshot {
            session: session.clone(),
            form_values: form_values.clone(),
            timestamp,
        };
        self.repo.save_snapshot(&snapshot)?;
        self.repo.save_shift_team(session.shift_team(), timestamp)?;
        tracing::debug!(session_id = session.session_id(), "会话镜像已写入");
        Ok(())
    }

    /// 删除会话快照与班组镜像
    pub fn discard(&self) -> Result<(), PersistenceError> {
        let removed = self.repo.clear()?;
        info!(removed, "本地会话快照已删除");
        Ok(())
    }

    /// 仅删除会话快照，保留班次班组镜像（供下一班次预填）
    pub fn discard_session(&self) -> Result<(), PersistenceError> {
        let removed = self.repo.delete(SESSION_KEY)?;
        info!(removed, "本地会话快照已删除，保留班组镜像");
        Ok(())
    }

    /// 仅读取班次班组窄镜像（有效期内）
    pub async fn restore_shift_team(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<Vec<TeamMember>>, PersistenceError> {
        let stored = match self.repo.load_shift_team() {
            Ok(Some(stored)) => stored,
            Ok(None) => return Ok(None),
            Err(RepositoryError::SerializationError(msg)) => {
                warn!(error = %msg, "班组镜像损坏，忽略");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let ttl = self.ttl().await;
        if now - stored.timestamp > ttl {
            return Ok(None);
        }
        Ok(Some(stored.members))
    }

    /// 启动时恢复会话
    #[instrument(skip(self, remote))]
    pub async fn restore<R>(
        &self,
        remote: &R,
        now: DateTime<Utc>,
    ) -> Result<RestoreOutcome, PersistenceError>
    where
        R: RemoteStore + ?Sized,
    {
        // ===== 1. 读取快照 =====
        let snapshot = match self.repo.load_snapshot() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return Ok(RestoreOutcome::NoSnapshot),
            Err(RepositoryError::SerializationError(msg)) => {
                warn!(error = %msg, "会话快照损坏，丢弃");
                self.discard()?;
                return Ok(RestoreOutcome::Cleared {
                    reason: ClearReason::Corrupt,
                });
            }
            Err(e) => return Err(e.into()),
        };

        // ===== 2. 有效期 =====
        let age = now - snapshot.timestamp;
        if age > self.ttl().await {
            info!(age_hours = age.num_hours(), "会话快照已过期，丢弃");
            self.discard()?;
            return Ok(RestoreOutcome::Expired {
                age_hours: age.num_hours(),
            });
        }

        let StoredSnapshot {
            mut session,
            form_values,
            timestamp,
        } = snapshot;

        let context = match session.context.clone() {
            Some(context) => context,
            None => {
                // 班次设置尚未完成，无需远端校验
                return Ok(RestoreOutcome::Restored {
                    session,
                    form_values,
                    resolution: None,
                    notifications: Vec::new(),
                });
            }
        };

        // ===== 4. 远端校验 =====
        let shift = match remote.fetch_shift(context.shift.shift_id).await? {
            Some(shift) => shift,
            None => return self.clear(ClearReason::ShiftGone),
        };
        shift.validate()?;
        if !remote.project_exists(context.project_id).await? {
            return self.clear(ClearReason::ProjectGone);
        }

        // ===== 5. 重建骨架并移植字段 =====
        let percentages = self.percentages().await;
        let previous = std::mem::take(&mut session.slots);
        session.slots = transplant_slots(
            generate_hour_slots(&shift, &context.part, &percentages),
            previous,
            &context.part,
            &percentages,
        );
        if let Some(ctx) = session.context.as_mut() {
            ctx.shift = shift;
        }

        // ===== 6. 班组重新加载 =====
        let mut notifications = vec![Notification::success(t("session.restored"))];
        let resolution = reload_teams(remote, &mut session, &mut notifications).await;

        // 保持原时间戳，恢复本身不延长有效期
        self.mirror_at(&session, &form_values, timestamp)?;

        info!(
            session_id = session.session_id(),
            slots = session.slots.len(),
            "会话已恢复"
        );

        Ok(RestoreOutcome::Restored {
            session,
            form_values,
            resolution: Some(resolution),
            notifications,
        })
    }

    fn clear(&self, reason: ClearReason) -> Result<RestoreOutcome, PersistenceError> {
        warn!(reason = ?reason, "会话引用的主数据已失效，清除本地会话");
        self.discard()?;
        Ok(RestoreOutcome::Cleared { reason })
    }

    async fn ttl(&self) -> Duration {
        let hours = self.config.get_session_ttl_hours().await.unwrap_or_else(|e| {
            warn!(error = %e, "读取会话有效期失败，使用默认值");
            DEFAULT_SESSION_TTL_HOURS
        });
        Duration::hours(hours)
    }

    async fn percentages(&self) -> HourTypePercentages {
        self.config.get_hour_type_percentages().await.unwrap_or_else(|e| {
            warn!(error = %e, "读取小时类型百分比失败，使用默认值");
            HourTypePercentages::default()
        })
    }
}

// ==========================================
// 字段移植
// ==========================================

/// 将旧时段的可变字段按小时序号移植到新骨架
fn transplant_slots(
    mut scaffold: Vec<HourSlot>,
    previous: Vec<HourSlot>,
    part: &crate::domain::shift::Part,
    percentages: &HourTypePercentages,
) -> Vec<HourSlot> {
    for old in previous {
        match scaffold.iter_mut().find(|s| s.hour_number == old.hour_number) {
            Some(slot) => {
                slot.apply_hour_type(old.hour_type, part, percentages);
                slot.status = old.status;
                slot.downtimes = old.downtimes;
                slot.team = old.team;
                slot.remote_identity = old.remote_identity;
                slot.record_production(old.output, old.scrap);
                slot.recompute_total_downtime();
            }
            None if old.has_recorded_data() => {
                warn!(
                    hour_number = old.hour_number,
                    "班次定义变更后时段不存在，丢弃已录入数据"
                );
            }
            None => {}
        }
    }
    scaffold
}

// ==========================================
// 班组重新加载
// ==========================================

async fn reload_teams<R>(
    remote: &R,
    session: &mut ProductionSession,
    notifications: &mut Vec<Notification>,
) -> TeamResolution
where
    R: RemoteStore + ?Sized,
{
    let keys: Vec<(u32, RecordId)> = session
        .slots
        .iter()
        .filter_map(|s| s.remote_identity.confirmed_id().map(|id| (s.hour_number, id)))
        .collect();

    let expected = session.recorded_headcount();

    let report = fan_out(keys, |(_, id)| remote.fetch_team_assignments(id)).await;

    if report.failure_count() > 0 {
        notifications.push(Notification::warning(t_with_args(
            "team.restore_fetch_failed",
            &[("count", &report.failure_count().to_string())],
        )));
    }

    let found: usize = report.succeeded.iter().map(|(_, records)| records.len()).sum();
    let resolution = TeamResolution::decide(found, expected);

    match resolution {
        TeamResolution::KeepLocal => {
            info!(expected, "远端无班组分配记录，保留本地班组");
            notifications.push(Notification::info(t("team.restore_kept_local")));
        }
        TeamResolution::TrustRemote | TeamResolution::PartialWarning { .. } => {
            let shift_team = session.shift_team.clone();
            for ((hour_number, _), records) in report.succeeded {
                if records.is_empty() {
                    continue;
                }
                if let Some(slot) = session.slot_mut(hour_number) {
                    let remote_members: Vec<TeamMember> = records
                        .iter()
                        .map(|r| member_from_assignment(r, &slot.team, &shift_team))
                        .collect();
                    if matches!(resolution, TeamResolution::TrustRemote) {
                        slot.team = remote_members;
                    } else {
                        merge_unique_members(&mut slot.team, remote_members.iter());
                    }
                }
            }
            if let TeamResolution::PartialWarning { found, expected } = resolution {
                notifications.push(Notification::warning(t_with_args(
                    "team.restore_partial",
                    &[("found", &found.to_string()), ("expected", &expected.to_string())],
                )));
            }
        }
    }

    let mut merged = session.shift_team.clone();
    for slot in &session.slots {
        merge_unique_members(&mut merged, slot.team.iter());
    }
    session.set_shift_team(merged);

    resolution
}

/// 远端分配记录转换为班组成员；优先沿用本地已知的工牌、姓名与资质
fn member_from_assignment(
    record: &TeamAssignmentRecord,
    slot_team: &[TeamMember],
    shift_team: &[TeamMember],
) -> TeamMember {
    let known = slot_team
        .iter()
        .chain(shift_team.iter())
        .find(|m| m.employee_id == record.employee_id);

    match known {
        Some(member) => TeamMember {
            workstation_id: record.workstation_id.or(member.workstation_id),
            machine_id: record.machine_id.or(member.machine_id),
            ..member.clone()
        },
        None => TeamMember {
            employee_id: record.employee_id,
            badge: record.badge.clone().unwrap_or_default(),
            name: record.name.clone().unwrap_or_default(),
            workstation_id: record.workstation_id,
            machine_id: record.machine_id,
            qualification: Default::default(),
            role: Default::default(),
        },
    }
}
