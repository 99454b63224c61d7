// ==========================================
// 班次生产数据采集 - 会话快照仓储
// ==========================================
// 职责: 管理 local_session_store 表（固定键 -> JSON 载荷）
// 记录: production_session            -> { session, form_values, timestamp }
//       production_session.shift_team -> { members, timestamp }（班次班组窄镜像）
// 红线: Repository 不含业务逻辑（TTL/校验由 SessionPersistenceManager 负责）
// ==========================================

use crate::domain::session::{FormValues, ProductionSession};
use crate::domain::team::TeamMember;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// 会话快照键
pub const SESSION_KEY: &str = "production_session";
/// 班次班组镜像键
pub const SHIFT_TEAM_KEY: &str = "production_session.shift_team";

/// 会话快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSnapshot {
    pub session: ProductionSession,
    #[serde(default)]
    pub form_values: FormValues,
    pub timestamp: DateTime<Utc>,
}

/// 班次班组镜像
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredShiftTeam {
    pub members: Vec<TeamMember>,
    pub timestamp: DateTime<Utc>,
}

// ==========================================
// SessionSnapshotRepository
// ==========================================
pub struct SessionSnapshotRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SessionSnapshotRepository {
    /// 从已有连接创建仓储实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        let repo = Self { conn };
        // best-effort: 表缺失不阻断启动，使用时再报错
        if let Err(e) = repo.ensure_table() {
            tracing::warn!("local_session_store ensure failed: {}", e);
        }
        repo
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn ensure_table(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS local_session_store (
                store_key TEXT PRIMARY KEY,
                payload_json TEXT NOT NULL,
                saved_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn put(&self, key: &str, payload_json: &str, saved_at: &DateTime<Utc>) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO local_session_store (store_key, payload_json, saved_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(store_key) DO UPDATE SET payload_json = ?2, saved_at = ?3
            "#,
            params![key, payload_json, saved_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// 读取原始载荷
    pub fn get_raw(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let payload = conn
            .query_row(
                "SELECT payload_json FROM local_session_store WHERE store_key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(payload)
    }

    /// 写入原始载荷（用于迁移或测试旧格式）
    pub fn put_raw(&self, key: &str, payload_json: &str) -> RepositoryResult<()> {
        self.put(key, payload_json, &Utc::now())
    }

    // ===== 会话快照 =====

    pub fn save_snapshot(&self, snapshot: &StoredSnapshot) -> RepositoryResult<()> {
        let json = serde_json::to_string(snapshot)?;
        self.put(SESSION_KEY, &json, &snapshot.timestamp)
    }

    /// 读取会话快照
    ///
    /// # 返回
    /// - Ok(None): 无快照
    /// - Err(SerializationError): 快照结构损坏
    pub fn load_snapshot(&self) -> RepositoryResult<Option<StoredSnapshot>> {
        match self.get_raw(SESSION_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    // ===== 班次班组镜像 =====

    pub fn save_shift_team(&self, members: &[TeamMember], timestamp: DateTime<Utc>) -> RepositoryResult<()> {
        let stored = StoredShiftTeam {
            members: members.to_vec(),
            timestamp,
        };
        let json = serde_json::to_string(&stored)?;
        self.put(SHIFT_TEAM_KEY, &json, &timestamp)
    }

    pub fn load_shift_team(&self) -> RepositoryResult<Option<StoredShiftTeam>> {
        match self.get_raw(SHIFT_TEAM_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// 删除单个键
    pub fn delete(&self, key: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM local_session_store WHERE store_key = ?1", params![key])?;
        Ok(affected)
    }

    /// 删除会话快照与班组镜像
    pub fn clear(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM local_session_store WHERE store_key IN (?1, ?2)",
            params![SESSION_KEY, SHIFT_TEAM_KEY],
        )?;
        Ok(affected)
    }
}
