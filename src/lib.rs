// ==========================================
// 班次生产数据采集 - 核心库
// ==========================================
// 技术栈: Rust + SQLite（本地镜像）+ 远端持久化接口
// 系统定位: 按小时录入产量/报废/停机/班组，并与远端记录对账
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 远端持久化接口与进程内实现
pub mod remote;

// 数据仓储层 - 本地会话快照
pub mod repository;

// 引擎层 - 时段生成、身份解析、对账、班组沿用、持久化
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - 资源组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{HourType, Notification, Severity, SlotStatus, TeamRole, TeamState};

// 领域实体
pub use domain::{DowntimeRecord, HourSlot, ProductionSession, RemoteIdentity, TeamMember};

// 引擎
pub use engine::{DowntimeReconciler, IdentityResolver, SessionPersistenceManager, TeamEditor};

// API
pub use api::{ApiError, ApiResult, ProductionApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "班次生产数据采集系统";
