// ==========================================
// 班次生产数据采集 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享资源（本地连接、配置、会话快照仓储）
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::ProductionApi;
use crate::config::{CaptureConfigReader, ConfigManager};
use crate::db::{init_local_schema, open_sqlite_connection, read_schema_version};
use crate::remote::RemoteStore;
use crate::repository::SessionSnapshotRepository;

/// 应用状态
///
/// 远端存储由宿主注入，`production_api` 按需创建 API 实例
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 共享连接
    pub conn: Arc<Mutex<Connection>>,

    /// 配置管理器
    pub config: Arc<ConfigManager>,

    /// 会话快照仓储
    pub snapshot_repo: Arc<SessionSnapshotRepository>,
}

impl AppState {
    /// 创建AppState实例
    ///
    /// # 参数
    /// - db_path: 本地数据库文件路径
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        init_local_schema(&conn).map_err(|e| format!("本地表初始化失败: {}", e))?;
        match read_schema_version(&conn) {
            Ok(version) => tracing::info!(schema_version = ?version, "本地 schema 就绪"),
            Err(e) => tracing::warn!("读取 schema_version 失败(将继续启动): {}", e),
        }
        let conn = Arc::new(Mutex::new(conn));

        let config = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let snapshot_repo = Arc::new(SessionSnapshotRepository::new(conn.clone()));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            conn,
            config,
            snapshot_repo,
        })
    }

    /// 以宿主提供的远端存储创建生产录入API
    pub fn production_api<R: RemoteStore>(&self, remote: Arc<R>) -> ProductionApi<R> {
        let config: Arc<dyn CaptureConfigReader> = self.config.clone();
        ProductionApi::new(remote, self.snapshot_repo.clone(), config)
    }
}

/// 获取默认数据库路径
///
/// # 优先级
/// 1. 环境变量 PRODUCTION_CAPTURE_DB_PATH
/// 2. 用户数据目录下的 production-capture/production_capture.db
/// 3. 当前目录 ./production_capture.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("PRODUCTION_CAPTURE_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./production_capture.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("production-capture-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("production-capture");
        }

        // 确保目录存在
        std::fs::create_dir_all(&path).ok();
        path = path.join("production_capture.db");
    }

    path.to_string_lossy().to_string()
}
