// ==========================================
// 班次生产数据采集 - API 层
// ==========================================
// 职责: 提供生产录入业务接口，供宿主界面调用
// ==========================================

pub mod error;
pub mod production_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use production_api::{ProductionApi, ShiftSetup, SlotEntry, SlotSaveReport};
