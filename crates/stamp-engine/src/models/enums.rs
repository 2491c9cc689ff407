//! 枚举类型定义

use std::fmt;

use serde::{Deserialize, Serialize};

/// 活动状态
///
/// 只有 `Active` 状态的活动参与触发评估
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum CampaignStatus {
    /// 草稿 - 编辑中，不触发
    #[default]
    Draft,
    Active,
    /// 已暂停 - 可恢复
    Paused,
    /// 已结束
    Completed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }
}

/// 扫码令牌状态
///
/// 由 is_active 和 expires_at 在读取时推导，不单独存储
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScannerTokenState {
    Active,
    /// 商户手动吊销，只能显式重新激活
    Revoked,
    /// 超过 expires_at，仅在校验时判断
    Expired,
}

/// 奖励状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardState {
    /// 已解锁，待兑换
    Outstanding,
    Redeemed,
}

/// 操作人
///
/// 写入流水和兑换记录的 actor 字段，格式为 `owner:{user_id}` 或 `scanner:{token_id}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Owner(String),
    Scanner(i64),
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Owner(user_id) => write!(f, "owner:{}", user_id),
            Self::Scanner(token_id) => write!(f, "scanner:{}", token_id),
        }
    }
}
