// ==========================================
// 班次生产数据采集 - 引擎层
// ==========================================
// 职责: 时段生成、远端身份解析、停机对账、班组沿用、会话持久化、并发扇出
// 红线: Engine 不拼 SQL，远端访问只经由 RemoteStore
// ==========================================

pub mod downtime_reconciler;
pub mod fan_out;
pub mod hour_schedule;
pub mod identity_resolver;
pub mod session_persistence;
pub mod team_carry_forward;

// 重导出核心引擎
pub use downtime_reconciler::{
    plan_downtimes, validate_downtimes, AbandonReason, DowntimePlan, DowntimeReconciler,
    DowntimeViolation, DowntimeViolationReason, ReconcileOutcome, ReconcileReport, ReconcileStats,
};
pub use fan_out::{fan_out, FanOutReport, TeamResolution};
pub use hour_schedule::{generate_hour_slots, shift_duration_hours};
pub use identity_resolver::{IdentityResolver, PrimarySaveOutcome, ResolveError, MAX_RECREATE_ATTEMPTS};
pub use session_persistence::{
    ClearReason, PersistenceError, RestoreOutcome, SessionPersistenceManager,
};
pub use team_carry_forward::{seed_team, SeedSource, TeamEditor, TeamError, TeamSeed};
