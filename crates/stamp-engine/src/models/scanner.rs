//! 扫码令牌实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::ScannerTokenState;

/// 扫码令牌
///
/// 明文只在创建时返回一次，库中只保存 SHA-256 摘要和用于展示的前缀
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ScannerToken {
    pub id: i64,
    pub business_id: i64,
    pub location_id: Option<String>,
    pub location_name: Option<String>,
    #[serde(skip)]
    pub token_hash: String,
    pub token_prefix: String,
    pub is_active: bool,
    pub usage_count: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ScannerToken {
    /// 推导令牌状态，吊销优先于过期
    pub fn state(&self, now: DateTime<Utc>) -> ScannerTokenState {
        if !self.is_active {
            ScannerTokenState::Revoked
        } else if self.expires_at.is_some_and(|t| now >= t) {
            ScannerTokenState::Expired
        } else {
            ScannerTokenState::Active
        }
    }
}

/// 新令牌（写入用）
#[derive(Debug, Clone)]
pub struct NewScannerToken {
    pub business_id: i64,
    pub location_id: Option<String>,
    pub location_name: Option<String>,
    pub token_hash: String,
    pub token_prefix: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// 校验通过后的扫码会话
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerAccess {
    pub token_id: i64,
    pub business_id: i64,
    pub location_id: Option<String>,
    pub location_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(is_active: bool, expires_at: Option<DateTime<Utc>>) -> ScannerToken {
        ScannerToken {
            id: 1,
            business_id: 1,
            location_id: None,
            location_name: Some("Centro".to_string()),
            token_hash: "hash".to_string(),
            token_prefix: "stk_abcd".to_string(),
            is_active,
            usage_count: 0,
            last_used_at: None,
            expires_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_token_state() {
        let now = Utc::now();
        assert_eq!(token(true, None).state(now), ScannerTokenState::Active);
        assert_eq!(
            token(true, Some(now + Duration::days(1))).state(now),
            ScannerTokenState::Active
        );
        assert_eq!(
            token(true, Some(now - Duration::seconds(1))).state(now),
            ScannerTokenState::Expired
        );
        assert_eq!(
            token(false, Some(now - Duration::days(1))).state(now),
            ScannerTokenState::Revoked
        );
    }

    #[test]
    fn test_token_hash_not_serialized() {
        let json = serde_json::to_value(token(true, None)).unwrap();
        assert!(json.get("tokenHash").is_none());
        assert_eq!(json["tokenPrefix"], "stk_abcd");
    }
}
