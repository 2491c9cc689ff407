//! 商户与客户实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 商户
///
/// 集章门槛可以随时修改，已有进度不做换算，下一次集章时按新门槛结转
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    pub id: i64,
    pub name: String,
    /// 解锁一次奖励所需的印章数（≥ 1）
    pub reward_threshold: i64,
    pub reward_description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 客户（会员卡）
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i64,
    pub business_id: i64,
    pub name: Option<String>,
    /// 消息接收号码，为空时不参与活动触达
    pub phone: Option<String>,
    /// 当前卡周期内的印章数
    pub stamps_count: i64,
    /// 累计解锁的奖励数，只增不减
    pub total_rewards_earned: i64,
    pub last_stamp_at: Option<DateTime<Utc>>,
    pub enrolled_at: DateTime<Utc>,
    /// 乐观锁版本号
    #[serde(skip)]
    pub version: i64,
}

impl Customer {
    /// 距离下一次奖励还差的印章数
    pub fn stamps_remaining(&self, threshold: i64) -> i64 {
        (threshold - self.stamps_count).max(0)
    }

    /// 距离上次集章的整天数
    pub fn days_since_last_stamp(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_stamp_at
            .map(|last| (now - last).num_days())
            .filter(|days| *days >= 0)
    }
}
