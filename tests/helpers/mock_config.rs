// ==========================================
// Mock 配置实现 - 用于集成测试
// ==========================================

use async_trait::async_trait;
use production_capture::config::{CaptureConfigReader, ConfigReadError};
use production_capture::domain::{HourType, HourTypePercentages};

/// Mock 配置结构
#[derive(Debug, Clone)]
pub struct MockCaptureConfig {
    pub session_ttl_hours: i64,
    pub percentages: HourTypePercentages,
    /// 为 true 时所有读取都返回错误
    pub broken: bool,
}

impl MockCaptureConfig {
    /// 创建默认配置
    pub fn default() -> Self {
        Self {
            session_ttl_hours: 12,
            percentages: HourTypePercentages::default(),
            broken: false,
        }
    }

    pub fn with_ttl(hours: i64) -> Self {
        let mut config = Self::default();
        config.session_ttl_hours = hours;
        config
    }

    /// 新时段默认类型为换型调试
    pub fn setup_by_default(setup_pct: u32) -> Self {
        let mut config = Self::default();
        config.percentages.setup = setup_pct;
        config.percentages.default_type = HourType::Setup;
        config
    }

    pub fn broken() -> Self {
        let mut config = Self::default();
        config.broken = true;
        config
    }
}

#[async_trait]
impl CaptureConfigReader for MockCaptureConfig {
    async fn get_session_ttl_hours(&self) -> Result<i64, ConfigReadError> {
        if self.broken {
            return Err("mock config unavailable".into());
        }
        Ok(self.session_ttl_hours)
    }

    async fn get_hour_type_percentages(&self) -> Result<HourTypePercentages, ConfigReadError> {
        if self.broken {
            return Err("mock config unavailable".into());
        }
        Ok(self.percentages)
    }
}
