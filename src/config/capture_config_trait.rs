// ==========================================
// 班次生产数据采集 - 采集配置读取 Trait
// ==========================================
// 职责: 定义会话恢复与时段生成所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::shift::HourTypePercentages;
use async_trait::async_trait;
use std::error::Error;

/// 配置读取错误
pub type ConfigReadError = Box<dyn Error + Send + Sync>;

// ==========================================
// CaptureConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait CaptureConfigReader: Send + Sync {
    /// 获取本地会话快照有效期（小时）
    ///
    /// # 默认值
    /// - 12
    async fn get_session_ttl_hours(&self) -> Result<i64, ConfigReadError>;

    /// 获取小时类型目标百分比表
    ///
    /// # 默认值
    /// - NORMAL=100, SETUP=50, BREAK=0, EXTRA_BREAK=50, 默认类型 NORMAL
    async fn get_hour_type_percentages(&self) -> Result<HourTypePercentages, ConfigReadError>;
}
