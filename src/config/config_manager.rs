// ==========================================
// 班次生产数据采集 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::capture_config_trait::{CaptureConfigReader, ConfigReadError};
use crate::db::{init_local_schema, open_sqlite_connection};
use crate::domain::shift::HourTypePercentages;
use crate::domain::types::HourType;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

/// 会话快照默认有效期（小时）
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 12;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;
        init_local_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA 并补齐本地表（均幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
            init_local_schema(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, ConfigReadError> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, ConfigReadError> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), ConfigReadError> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, ConfigReadError> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 读取百分比配置；非法值回退默认并告警
    fn get_percentage_or_default(&self, key: &str, default: u32) -> Result<u32, ConfigReadError> {
        let value = self.get_config_or_default(key, &default.to_string())?;
        match value.trim().parse::<u32>() {
            Ok(pct) if pct <= 100 => Ok(pct),
            _ => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %value,
                    "百分比配置非法，使用默认值"
                );
                Ok(default)
            }
        }
    }

    /// 获取所有 global 配置的快照（JSON格式，按键排序）
    pub fn get_config_snapshot(&self) -> Result<String, ConfigReadError> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }
}

// ==========================================
// CaptureConfigReader Trait 实现
// ==========================================
#[async_trait]
impl CaptureConfigReader for ConfigManager {
    async fn get_session_ttl_hours(&self) -> Result<i64, ConfigReadError> {
        let value = self.get_config_or_default(
            config_keys::SESSION_TTL_HOURS,
            &DEFAULT_SESSION_TTL_HOURS.to_string(),
        )?;
        match value.trim().parse::<i64>() {
            Ok(hours) if hours > 0 => Ok(hours),
            _ => {
                tracing::warn!(
                    config_key = config_keys::SESSION_TTL_HOURS,
                    raw_value = %value,
                    "会话有效期配置非法，使用默认值"
                );
                Ok(DEFAULT_SESSION_TTL_HOURS)
            }
        }
    }

    async fn get_hour_type_percentages(&self) -> Result<HourTypePercentages, ConfigReadError> {
        let defaults = HourTypePercentages::default();

        let default_type = match self.get_config_value(config_keys::DEFAULT_HOUR_TYPE)? {
            Some(raw) => HourType::parse(&raw).unwrap_or_else(|| {
                tracing::warn!(
                    config_key = config_keys::DEFAULT_HOUR_TYPE,
                    raw_value = %raw,
                    "默认小时类型配置非法，使用 NORMAL"
                );
                defaults.default_type
            }),
            None => defaults.default_type,
        };

        Ok(HourTypePercentages {
            normal: self.get_percentage_or_default(config_keys::HOUR_TYPE_PCT_NORMAL, defaults.normal)?,
            setup: self.get_percentage_or_default(config_keys::HOUR_TYPE_PCT_SETUP, defaults.setup)?,
            break_time: self
                .get_percentage_or_default(config_keys::HOUR_TYPE_PCT_BREAK, defaults.break_time)?,
            extra_break: self
                .get_percentage_or_default(config_keys::HOUR_TYPE_PCT_EXTRA_BREAK, defaults.extra_break)?,
            default_type,
        })
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 会话快照
    pub const SESSION_TTL_HOURS: &str = "session_ttl_hours";

    // 小时类型目标百分比
    pub const HOUR_TYPE_PCT_NORMAL: &str = "hour_type_pct_normal";
    pub const HOUR_TYPE_PCT_SETUP: &str = "hour_type_pct_setup";
    pub const HOUR_TYPE_PCT_BREAK: &str = "hour_type_pct_break";
    pub const HOUR_TYPE_PCT_EXTRA_BREAK: &str = "hour_type_pct_extra_break";

    // 新时段默认小时类型
    pub const DEFAULT_HOUR_TYPE: &str = "default_hour_type";
}
