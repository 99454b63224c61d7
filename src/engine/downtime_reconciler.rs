// ==========================================
// 班次生产数据采集 - 停机记录集合对账
// ==========================================
// 输入: 本地编辑后的期望列表 + 最近一次已持久化列表
// 步骤:
// 1. 校验（duration > 0, comment 非空），失败则整体放弃，不发任何请求
// 2. toDelete = 已持久化 id 中不在期望列表里的
// 3. 期望列表: 无 id -> create；有 id 且内容变化 -> update；未变化 -> 跳过
// 4. 删除与写入并发执行，单项失败不影响其他项
// 5. 全部结束后按期望列表重建，回填新 id，重算停机合计
// 红线: 所属时段身份未 Confirmed 时不写任何停机记录
// ==========================================

use crate::domain::downtime::DowntimeRecord;
use crate::domain::slot::{HourSlot, RecordIdentity};
use crate::domain::types::RecordId;
use crate::remote::{extract_record_id, DowntimePayload, RemoteError, RemoteStore};
use futures::future::{join, join_all};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

// ==========================================
// 校验
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DowntimeViolationReason {
    ZeroDuration,
    EmptyComment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DowntimeViolation {
    pub index: usize,
    pub client_key: String,
    pub reason: DowntimeViolationReason,
}

/// 校验期望列表，返回全部违规项
pub fn validate_downtimes(desired: &[DowntimeRecord]) -> Result<(), Vec<DowntimeViolation>> {
    let mut violations = Vec::new();
    for (index, entry) in desired.iter().enumerate() {
        if entry.duration_minutes == 0 {
            violations.push(DowntimeViolation {
                index,
                client_key: entry.client_key.clone(),
                reason: DowntimeViolationReason::ZeroDuration,
            });
        }
        if entry.comment.trim().is_empty() {
            violations.push(DowntimeViolation {
                index,
                client_key: entry.client_key.clone(),
                reason: DowntimeViolationReason::EmptyComment,
            });
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

// ==========================================
// 计划
// ==========================================

/// 对账计划（索引指向期望列表）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DowntimePlan {
    pub to_delete: Vec<RecordId>,
    pub to_create: Vec<usize>,
    pub to_update: Vec<(usize, RecordId)>,
    pub unchanged: Vec<usize>,
}

impl DowntimePlan {
    pub fn is_noop(&self) -> bool {
        self.to_delete.is_empty() && self.to_create.is_empty() && self.to_update.is_empty()
    }

    pub fn operation_count(&self) -> usize {
        self.to_delete.len() + self.to_create.len() + self.to_update.len()
    }
}

/// 计算 create/update/delete 集合
pub fn plan_downtimes(desired: &[DowntimeRecord], persisted: &[DowntimeRecord]) -> DowntimePlan {
    let desired_ids: HashSet<RecordId> = desired.iter().filter_map(|d| d.remote_id()).collect();

    let mut plan = DowntimePlan {
        to_delete: persisted
            .iter()
            .filter_map(|p| p.remote_id())
            .filter(|id| !desired_ids.contains(id))
            .collect(),
        ..DowntimePlan::default()
    };

    for (index, entry) in desired.iter().enumerate() {
        match entry.remote_id() {
            None => plan.to_create.push(index),
            Some(id) => {
                let same = persisted
                    .iter()
                    .find(|p| p.remote_id() == Some(id))
                    .map(|p| p.same_content(entry))
                    .unwrap_or(false);
                if same {
                    plan.unchanged.push(index);
                } else {
                    plan.to_update.push((index, id));
                }
            }
        }
    }

    plan
}

// ==========================================
// 结果
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbandonReason {
    Invalid(Vec<DowntimeViolation>),
    OwnerNotConfirmed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// 所有操作成功（含无操作）
    Success { saved: usize },
    /// 部分失败，成功部分已保留
    Partial { saved: usize, failed: usize },
    /// 未发出任何请求
    Abandoned(AbandonReason),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub outcome: ReconcileOutcome,
    pub stats: ReconcileStats,
    pub total_downtime: u32,
}

#[derive(Debug, Clone, Copy)]
enum WriteOp {
    Create,
    Update(RecordId),
}

// ==========================================
// DowntimeReconciler
// ==========================================
pub struct DowntimeReconciler<'a, R: RemoteStore + ?Sized> {
    remote: &'a R,
}

impl<'a, R: RemoteStore + ?Sized> DowntimeReconciler<'a, R> {
    pub fn new(remote: &'a R) -> Self {
        Self { remote }
    }

    /// 将时段停机记录对账为期望列表
    ///
    /// # 说明
    /// - 成功与否都会用期望列表重建 `slot.downtimes` 并重算合计（Abandoned 除外）
    /// - 创建失败的条目以 Unsaved 保留在本地，下次保存会再次创建
    pub async fn reconcile(
        &self,
        slot: &mut HourSlot,
        desired: Vec<DowntimeRecord>,
        persisted: &[DowntimeRecord],
    ) -> ReconcileReport {
        if let Err(violations) = validate_downtimes(&desired) {
            warn!(hour = slot.hour_number, count = violations.len(), "停机记录校验失败，放弃对账");
            return ReconcileReport {
                outcome: ReconcileOutcome::Abandoned(AbandonReason::Invalid(violations)),
                stats: ReconcileStats::default(),
                total_downtime: slot.total_downtime,
            };
        }

        let Some(owner_id) = slot.remote_identity.confirmed_id() else {
            warn!(hour = slot.hour_number, "所属时段未确认，停机记录不写入远端");
            return ReconcileReport {
                outcome: ReconcileOutcome::Abandoned(AbandonReason::OwnerNotConfirmed),
                stats: ReconcileStats::default(),
                total_downtime: slot.total_downtime,
            };
        };

        let plan = plan_downtimes(&desired, persisted);
        let remote = self.remote;

        let delete_futures = plan.to_delete.iter().map(|id| {
            let id = *id;
            async move { (id, remote.delete_downtime(id).await) }
        });

        let writes: Vec<(usize, WriteOp)> = plan
            .to_create
            .iter()
            .map(|i| (*i, WriteOp::Create))
            .chain(plan.to_update.iter().map(|(i, id)| (*i, WriteOp::Update(*id))))
            .collect();

        let write_futures = writes.iter().map(|(index, op)| {
            let entry = &desired[*index];
            let payload = DowntimePayload {
                hour_record_id: owner_id,
                duration_minutes: entry.duration_minutes,
                comment: entry.comment.trim().to_string(),
                problem_type_id: entry.problem_type_id,
                machine_id: entry.machine_id,
            };
            let (index, op) = (*index, *op);
            async move {
                let result = match op {
                    WriteOp::Create => remote.create_downtime(&payload).await.and_then(|v| {
                        extract_record_id(&v).ok_or_else(|| {
                            RemoteError::Decode("停机记录创建响应缺少标识".to_string())
                        })
                    }),
                    WriteOp::Update(id) => remote.update_downtime(id, &payload).await.map(|_| id),
                };
                (index, op, result)
            }
        });

        let (delete_results, write_results) =
            join(join_all(delete_futures), join_all(write_futures)).await;

        // ===== 重建本地列表 =====
        let mut stats = ReconcileStats {
            unchanged: plan.unchanged.len(),
            ..ReconcileStats::default()
        };
        let mut rebuilt = desired;

        for (id, result) in delete_results {
            match result {
                Ok(()) => stats.deleted += 1,
                // 已不存在即视为删除完成
                Err(e) if e.is_not_found() => stats.deleted += 1,
                Err(e) => {
                    stats.failed += 1;
                    warn!(hour = slot.hour_number, id, error = %e, "停机记录删除失败");
                }
            }
        }

        for (index, op, result) in write_results {
            let entry = &mut rebuilt[index];
            match (op, result) {
                (WriteOp::Create, Ok(id)) => {
                    entry.remote_identity = RecordIdentity::Confirmed(id);
                    stats.created += 1;
                }
                (WriteOp::Update(_), Ok(_)) => stats.updated += 1,
                (WriteOp::Create, Err(e)) => {
                    stats.failed += 1;
                    warn!(hour = slot.hour_number, client_key = %entry.client_key, error = %e, "停机记录创建失败");
                }
                (WriteOp::Update(id), Err(e)) => {
                    stats.failed += 1;
                    if e.is_not_found() {
                        // 远端已删除，下次保存时重新创建
                        entry.remote_identity = RecordIdentity::Unsaved;
                    }
                    warn!(hour = slot.hour_number, id, error = %e, "停机记录更新失败");
                }
            }
        }

        slot.downtimes = rebuilt;
        slot.recompute_total_downtime();

        let saved = stats.created + stats.updated + stats.deleted;
        let outcome = if stats.failed == 0 {
            ReconcileOutcome::Success { saved }
        } else {
            ReconcileOutcome::Partial {
                saved,
                failed: stats.failed,
            }
        };

        info!(
            hour = slot.hour_number,
            created = stats.created,
            updated = stats.updated,
            deleted = stats.deleted,
            unchanged = stats.unchanged,
            failed = stats.failed,
            total = slot.total_downtime,
            "停机记录对账完成"
        );

        ReconcileReport {
            outcome,
            stats,
            total_downtime: slot.total_downtime,
        }
    }
}
