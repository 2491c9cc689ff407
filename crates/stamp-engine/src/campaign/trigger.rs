//! 活动触发条件
//!
//! 触发条件是封闭的枚举，库中以 trigger_type + trigger_value 两列存储。
//! `stamps_reached` 与 `days_inactive` 采用精确匹配。

use serde::{Deserialize, Serialize};

use super::event::CustomerEvent;
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CampaignTrigger {
    /// 仅在入会事件上触发
    CustomerEnrolled,
    /// 集章后印章数恰好等于 stamps 时触发
    StampsReached { stamps: i64 },
    /// 每次解锁奖励
    RewardUnlocked,
    /// 距上次集章恰好 days 天
    DaysInactive { days: i64 },
    /// 每次集章
    StampEarned,
}

impl CampaignTrigger {
    pub fn trigger_type(&self) -> &'static str {
        match self {
            Self::CustomerEnrolled => "customer_enrolled",
            Self::StampsReached { .. } => "stamps_reached",
            Self::RewardUnlocked => "reward_unlocked",
            Self::DaysInactive { .. } => "days_inactive",
            Self::StampEarned => "stamp_earned",
        }
    }

    pub fn trigger_value(&self) -> Option<i64> {
        match self {
            Self::StampsReached { stamps } => Some(*stamps),
            Self::DaysInactive { days } => Some(*days),
            _ => None,
        }
    }

    /// 从存储列还原
    pub fn from_columns(trigger_type: &str, trigger_value: Option<i64>) -> Result<Self> {
        let missing = || EngineError::Internal(format!("触发条件缺少参数: {}", trigger_type));
        let trigger = match trigger_type {
            "customer_enrolled" => Self::CustomerEnrolled,
            "stamps_reached" => Self::StampsReached {
                stamps: trigger_value.ok_or_else(missing)?,
            },
            "reward_unlocked" => Self::RewardUnlocked,
            "days_inactive" => Self::DaysInactive {
                days: trigger_value.ok_or_else(missing)?,
            },
            "stamp_earned" => Self::StampEarned,
            other => {
                return Err(EngineError::Internal(format!("未知的触发类型: {}", other)));
            }
        };
        Ok(trigger)
    }

    /// 参数校验（创建活动时调用）
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::StampsReached { stamps } if *stamps < 1 => Err(EngineError::Validation(
                "stamps_reached 的印章数必须大于 0".to_string(),
            )),
            Self::DaysInactive { days } if *days < 1 => Err(EngineError::Validation(
                "days_inactive 的天数必须大于 0".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// 判断事件是否命中
    pub fn matches(&self, event: &CustomerEvent) -> bool {
        match (self, event) {
            (Self::CustomerEnrolled, CustomerEvent::CustomerEnrolled) => true,
            (Self::StampsReached { stamps }, CustomerEvent::StampsGranted { new_count, .. }) => {
                new_count == stamps
            }
            (Self::StampEarned, CustomerEvent::StampsGranted { .. }) => true,
            (Self::RewardUnlocked, CustomerEvent::RewardUnlocked { .. }) => true,
            (
                Self::DaysInactive { days },
                CustomerEvent::InactivityCheck {
                    days_since_last_stamp,
                    ..
                },
            ) => days_since_last_stamp == days,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn granted(new_count: i64) -> CustomerEvent {
        CustomerEvent::StampsGranted {
            ledger_entry_id: 1,
            new_count,
        }
    }

    #[test]
    fn test_stamps_reached_is_exact_match() {
        let trigger = CampaignTrigger::StampsReached { stamps: 5 };
        assert!(trigger.matches(&granted(5)));
        assert!(!trigger.matches(&granted(4)));
        assert!(!trigger.matches(&granted(6)));
        assert!(!trigger.matches(&CustomerEvent::CustomerEnrolled));
    }

    #[test]
    fn test_days_inactive_is_exact_match() {
        let trigger = CampaignTrigger::DaysInactive { days: 30 };
        let check = |days| CustomerEvent::InactivityCheck {
            days_since_last_stamp: days,
            last_stamp_at: Utc::now(),
        };
        assert!(trigger.matches(&check(30)));
        assert!(!trigger.matches(&check(31)));
    }

    #[test]
    fn test_event_kind_triggers() {
        assert!(CampaignTrigger::StampEarned.matches(&granted(1)));
        assert!(CampaignTrigger::RewardUnlocked.matches(&CustomerEvent::RewardUnlocked {
            unlock_event_id: 1
        }));
        assert!(CampaignTrigger::CustomerEnrolled.matches(&CustomerEvent::CustomerEnrolled));
        assert!(!CampaignTrigger::CustomerEnrolled.matches(&granted(1)));
    }

    #[test]
    fn test_columns_roundtrip() {
        let trigger = CampaignTrigger::DaysInactive { days: 14 };
        let restored =
            CampaignTrigger::from_columns(trigger.trigger_type(), trigger.trigger_value()).unwrap();
        assert_eq!(restored, trigger);

        assert!(CampaignTrigger::from_columns("stamps_reached", None).is_err());
        assert!(CampaignTrigger::from_columns("birthday", None).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(CampaignTrigger::StampsReached { stamps: 0 }.validate().is_err());
        assert!(CampaignTrigger::DaysInactive { days: 7 }.validate().is_ok());
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(CampaignTrigger::StampsReached { stamps: 5 }).unwrap();
        assert_eq!(json["type"], "stamps_reached");
        assert_eq!(json["stamps"], 5);
    }
}
