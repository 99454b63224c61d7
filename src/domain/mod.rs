// ==========================================
// 班次生产数据采集 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、派生规则
// 红线: 不含数据访问逻辑,不含远端调用
// ==========================================

pub mod downtime;
pub mod session;
pub mod shift;
pub mod slot;
pub mod team;
pub mod types;

// 重导出核心类型
pub use downtime::DowntimeRecord;
pub use session::{FormValues, ProductionSession};
pub use shift::{DomainError, HourTypePercentages, LocationRef, Part, ShiftContext, ShiftDefinition};
pub use slot::{scale_by_percentage, HourSlot, NaturalKey, RecordIdentity, RemoteIdentity};
pub use team::{merge_unique_members, qualification_on, ActorSlot, Actors, TeamMember};
pub use types::{
    HourType, Notification, QualificationStatus, RecordId, Severity, SlotStatus, TeamRole,
    TeamState,
};
