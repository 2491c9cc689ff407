//! 客户状态变化事件
//!
//! 每个事件都有稳定的 event_id，活动触发记录以 (活动, 客户, event_id) 去重，
//! 同一事件被重复投递时不会重复发送消息。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CustomerEvent {
    /// 客户入会
    CustomerEnrolled,
    /// 集章完成，new_count 为结转后的印章数
    StampsGranted { ledger_entry_id: i64, new_count: i64 },
    RewardUnlocked { unlock_event_id: i64 },
    /// 沉睡扫描
    InactivityCheck {
        days_since_last_stamp: i64,
        last_stamp_at: DateTime<Utc>,
    },
}

impl CustomerEvent {
    /// 去重用的事件 ID
    pub fn event_id(&self) -> String {
        match self {
            Self::CustomerEnrolled => "enrolled".to_string(),
            Self::StampsGranted {
                ledger_entry_id, ..
            } => format!("ledger:{}", ledger_entry_id),
            Self::RewardUnlocked { unlock_event_id } => format!("unlock:{}", unlock_event_id),
            Self::InactivityCheck {
                days_since_last_stamp,
                last_stamp_at,
            } => format!(
                "inactive:{}:{}",
                last_stamp_at.timestamp(),
                days_since_last_stamp
            ),
        }
    }

    /// 事件名（日志和指标用）
    pub fn name(&self) -> &'static str {
        match self {
            Self::CustomerEnrolled => "customer_enrolled",
            Self::StampsGranted { .. } => "stamps_granted",
            Self::RewardUnlocked { .. } => "reward_unlocked",
            Self::InactivityCheck { .. } => "inactivity_check",
        }
    }
}
