//! 集章引擎错误类型
//!
//! 业务错误与系统错误统一为 `EngineError`，通过 `kind()` 归入六类，
//! HTTP 层只依据分类决定状态码。

use thiserror::Error;

/// 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 请求参数不合法
    Validation,
    /// 与当前状态冲突（已兑换、无可兑换奖励、并发冲突）
    Conflict,
    NotFound,
    /// 凭证无效
    Invalid,
    /// 依赖暂不可用
    Unavailable,
    Internal,
}

/// 扫码令牌被拒绝的具体原因
///
/// 只写入日志和指标，不会返回给调用方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejectReason {
    Malformed,
    Unknown,
    Revoked,
    Expired,
    BusinessInactive,
}

impl TokenRejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::Unknown => "unknown",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
            Self::BusinessInactive => "business_inactive",
        }
    }
}

/// 集章引擎错误
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("参数校验失败: {0}")]
    Validation(String),

    // === 资源不存在 ===
    #[error("商户不存在: {0}")]
    BusinessNotFound(i64),

    #[error("客户不存在: {0}")]
    CustomerNotFound(i64),

    #[error("奖励解锁记录不存在: {0}")]
    UnlockEventNotFound(i64),

    #[error("扫码令牌不存在: {0}")]
    ScannerTokenNotFound(i64),

    #[error("活动不存在: {0}")]
    CampaignNotFound(i64),

    // === 状态冲突 ===
    #[error("商户已停用: {0}")]
    BusinessInactive(i64),

    #[error("客户没有可兑换的奖励: customer_id={0}")]
    NoRewardAvailable(i64),

    #[error("奖励已兑换: unlock_event_id={0}")]
    AlreadyRedeemed(i64),

    #[error("并发冲突，请重试")]
    ConcurrencyConflict,

    // === 凭证 ===
    /// 对外统一提示，具体原因见 `TokenRejectReason`
    #[error("扫码令牌无效")]
    ScannerTokenRejected(TokenRejectReason),

    #[error("身份凭证无效: {0}")]
    Unauthorized(String),

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(sqlx::Error),

    #[error("JSON 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("服务暂不可用: {0}")]
    Unavailable(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// SQLite 主错误码：SQLITE_BUSY / SQLITE_LOCKED
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

impl From<sqlx::Error> for EngineError {
    /// 写锁等待超时归为并发冲突，交给重试逻辑处理
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                let primary = db_err
                    .code()
                    .and_then(|c| c.parse::<i32>().ok())
                    .map(|c| c & 0xff);
                if matches!(primary, Some(SQLITE_BUSY) | Some(SQLITE_LOCKED)) {
                    Self::ConcurrencyConflict
                } else {
                    Self::Database(err)
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                Self::Unavailable(err.to_string())
            }
            _ => Self::Database(err),
        }
    }
}

impl EngineError {
    /// 错误分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::BusinessNotFound(_)
            | Self::CustomerNotFound(_)
            | Self::UnlockEventNotFound(_)
            | Self::ScannerTokenNotFound(_)
            | Self::CampaignNotFound(_) => ErrorKind::NotFound,
            Self::BusinessInactive(_)
            | Self::NoRewardAvailable(_)
            | Self::AlreadyRedeemed(_)
            | Self::ConcurrencyConflict => ErrorKind::Conflict,
            Self::ScannerTokenRejected(_) | Self::Unauthorized(_) => ErrorKind::Invalid,
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::Database(_) | Self::Serialization(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// 只有并发冲突和依赖不可用值得重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict | Self::Unavailable(_))
    }

    /// 是否为系统错误（响应中隐藏细节）
    pub fn is_system_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Internal | ErrorKind::Unavailable
        )
    }

    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::BusinessNotFound(_) => "BUSINESS_NOT_FOUND",
            Self::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
            Self::UnlockEventNotFound(_) => "UNLOCK_EVENT_NOT_FOUND",
            Self::ScannerTokenNotFound(_) => "SCANNER_TOKEN_NOT_FOUND",
            Self::CampaignNotFound(_) => "CAMPAIGN_NOT_FOUND",
            Self::BusinessInactive(_) => "BUSINESS_INACTIVE",
            Self::NoRewardAvailable(_) => "NO_REWARD_AVAILABLE",
            Self::AlreadyRedeemed(_) => "ALREADY_REDEEMED",
            Self::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
            Self::ScannerTokenRejected(_) => "SCANNER_TOKEN_INVALID",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Unavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
