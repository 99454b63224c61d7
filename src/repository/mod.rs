// ==========================================
// 班次生产数据采集 - 本地数据仓储层
// ==========================================
// 职责: 本地 SQLite 数据访问（会话快照、班组镜像）
// 红线: Repository 不含业务逻辑
// ==========================================

pub mod error;
pub mod session_snapshot_repo;

pub use error::{RepositoryError, RepositoryResult};
pub use session_snapshot_repo::{
    SessionSnapshotRepository, StoredShiftTeam, StoredSnapshot, SESSION_KEY, SHIFT_TEAM_KEY,
};
