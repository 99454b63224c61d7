// ==========================================
// 班次生产数据采集 - API层错误类型
// ==========================================
// 职责: 汇总各层错误，转换为面向操作员的通知
// 分类:
// - 校验错误: 阻断保存，未发出任何远端请求
// - 解析错误: Pending 未命中 / 重建后仍不存在
// - 远端错误、本地存储错误
// ==========================================

use crate::domain::shift::DomainError;
use crate::domain::types::Notification;
use crate::engine::downtime_reconciler::DowntimeViolation;
use crate::engine::identity_resolver::ResolveError;
use crate::engine::session_persistence::PersistenceError;
use crate::engine::team_carry_forward::TeamError;
use crate::i18n::{t, t_with_args};
use crate::remote::RemoteError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 校验错误（无远端调用）
    // ==========================================
    #[error("班次设置未完成")]
    SessionNotStarted,

    #[error("时段不存在: 第{0}小时")]
    SlotNotFound(u32),

    #[error("未打开任何时段，或打开的时段与保存的时段不一致")]
    NoSlotOpen,

    #[error("班组未确认: 第{0}小时")]
    TeamNotConfirmed(u32),

    #[error("未分配班组: 第{0}小时")]
    NoTeamAssigned(u32),

    #[error("停机记录校验失败: {} 项", .0.len())]
    DowntimeValidation(Vec<DowntimeViolation>),

    #[error("工牌未找到: {0}")]
    EmployeeNotFound(String),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("班次或项目不存在: {0}")]
    ReferenceNotFound(String),

    #[error(transparent)]
    Team(TeamError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    // ==========================================
    // 解析错误
    // ==========================================
    #[error("记录未找到，请刷新后重试: {0}")]
    RecordNotFound(String),

    #[error("重建后记录仍不存在: {0}")]
    StaleAfterRecreate(String),

    #[error("远端响应缺少记录标识: {0}")]
    InvalidResponse(String),

    // ==========================================
    // 远端 / 本地存储
    // ==========================================
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("配置读取失败: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从各层错误转换
// ==========================================
impl From<TeamError> for ApiError {
    fn from(err: TeamError) -> Self {
        match err {
            TeamError::NotConfirmed { hour } => ApiError::TeamNotConfirmed(hour),
            TeamError::Empty { hour } => ApiError::NoTeamAssigned(hour),
            other => ApiError::Team(other),
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::RecordNotFound(key) => ApiError::RecordNotFound(key.to_string()),
            ResolveError::StaleAfterRecreate(key) => ApiError::StaleAfterRecreate(key.to_string()),
            ResolveError::InvalidResponse(key) => ApiError::InvalidResponse(key.to_string()),
            ResolveError::NotPersisted => {
                ApiError::InvalidInput("记录尚未保存，无法写入子记录".to_string())
            }
            ResolveError::Remote(e) => ApiError::Remote(e),
        }
    }
}

impl From<PersistenceError> for ApiError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Repository(e) => ApiError::Repository(e),
            PersistenceError::Remote(e) => ApiError::Remote(e),
            PersistenceError::Domain(e) => ApiError::Domain(e),
        }
    }
}

impl ApiError {
    /// 是否为校验类错误（未发出远端请求）
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ApiError::SessionNotStarted
                | ApiError::SlotNotFound(_)
                | ApiError::NoSlotOpen
                | ApiError::TeamNotConfirmed(_)
                | ApiError::NoTeamAssigned(_)
                | ApiError::DowntimeValidation(_)
                | ApiError::InvalidInput(_)
                | ApiError::Team(_)
                | ApiError::Domain(_)
        )
    }

    /// 转换为操作员通知（本地化消息）
    pub fn to_notification(&self) -> Notification {
        match self {
            ApiError::TeamNotConfirmed(hour) => Notification::warning(t_with_args(
                "errors.team_not_confirmed",
                &[("hour", &hour.to_string())],
            )),
            ApiError::NoTeamAssigned(hour) => Notification::warning(t_with_args(
                "errors.no_team_assigned",
                &[("hour", &hour.to_string())],
            )),
            ApiError::DowntimeValidation(violations) => Notification::warning(t_with_args(
                "errors.downtime_invalid",
                &[("count", &violations.len().to_string())],
            )),
            ApiError::EmployeeNotFound(badge) => Notification::warning(t_with_args(
                "errors.employee_not_found",
                &[("badge", badge)],
            )),
            ApiError::RecordNotFound(key) => Notification::error(t_with_args(
                "errors.record_not_found",
                &[("key", key)],
            )),
            ApiError::StaleAfterRecreate(key) => Notification::error(t_with_args(
                "errors.stale_after_recreate",
                &[("key", key)],
            )),
            ApiError::SessionNotStarted => Notification::warning(t("errors.session_not_started")),
            other => Notification::error(t_with_args(
                "errors.generic",
                &[("detail", &other.to_string())],
            )),
        }
    }
}

/// API层Result类型别名
pub type ApiResult<T> = Result<T, ApiError>;
