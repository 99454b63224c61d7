// ==========================================
// 班次生产数据采集 - 配置层
// ==========================================
// 职责: 会话有效期、小时类型百分比等运行参数
// 存储: config_kv 表 (scope_id = 'global')
// ==========================================

pub mod capture_config_trait;
pub mod config_manager;

pub use capture_config_trait::{CaptureConfigReader, ConfigReadError};
pub use config_manager::{config_keys, ConfigManager, DEFAULT_SESSION_TTL_HOURS};
