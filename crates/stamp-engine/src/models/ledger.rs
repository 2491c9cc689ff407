//! 集章流水、奖励解锁与兑换记录

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::RewardState;

/// 集章流水
///
/// 只追加不修改，是客户印章数的事实来源
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StampLedgerEntry {
    pub id: i64,
    pub customer_id: i64,
    pub business_id: i64,
    /// 本次集章数量（1..=10）
    pub quantity: i64,
    pub idempotency_key: String,
    /// 操作人，见 `Actor`
    pub actor: String,
    /// 结转后的印章数
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}

/// 新流水（写入用）
#[derive(Debug, Clone)]
pub struct NewStampLedgerEntry {
    pub customer_id: i64,
    pub business_id: i64,
    pub quantity: i64,
    pub idempotency_key: String,
    pub actor: String,
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}

/// 奖励解锁事件
///
/// 创建后唯一允许的修改是设置 redeemed_at
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RewardUnlockEvent {
    pub id: i64,
    pub customer_id: i64,
    pub business_id: i64,
    /// 触发解锁的集章流水
    pub source_ledger_entry_id: i64,
    pub unlocked_at: DateTime<Utc>,
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl RewardUnlockEvent {
    pub fn state(&self) -> RewardState {
        if self.redeemed_at.is_some() {
            RewardState::Redeemed
        } else {
            RewardState::Outstanding
        }
    }
}

/// 兑换记录
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionRecord {
    pub id: i64,
    pub unlock_event_id: i64,
    pub customer_id: i64,
    pub business_id: i64,
    pub actor: String,
    pub redeemed_at: DateTime<Utc>,
}
