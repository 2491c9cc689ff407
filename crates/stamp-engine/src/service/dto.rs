//! 服务层数据传输对象

use serde::{Deserialize, Serialize};

use crate::models::{RewardState, RewardUnlockEvent, ScannerToken};

/// 集章结果
///
/// 首次执行的结果序列化后存入幂等记录，重放时原样返回（replayed 置为 true）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantOutcome {
    pub customer_id: i64,
    /// 结转后的印章数
    pub new_stamps_count: i64,
    /// 本次解锁的奖励数
    pub rewards_unlocked: i64,
    pub total_rewards_earned: i64,
    pub ledger_entry_id: i64,
    pub unlock_event_ids: Vec<i64>,
    #[serde(default)]
    pub replayed: bool,
}

/// 奖励视图
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardView {
    #[serde(flatten)]
    pub unlock: RewardUnlockEvent,
    pub state: RewardState,
}

impl From<RewardUnlockEvent> for RewardView {
    fn from(unlock: RewardUnlockEvent) -> Self {
        let state = unlock.state();
        Self { unlock, state }
    }
}

/// 客户奖励列表
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRewards {
    pub customer_id: i64,
    pub outstanding: i64,
    pub rewards: Vec<RewardView>,
}

/// 新签发的扫码令牌
///
/// secret 只在此处出现一次
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedScannerToken {
    pub token: ScannerToken,
    pub secret: String,
}

/// 沉睡扫描结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InactivityScanReport {
    pub customers_checked: usize,
    pub messages_scheduled: usize,
}
