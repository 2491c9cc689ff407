//! 扫码令牌守卫
//!
//! 门店扫码终端凭令牌调用公开接口。令牌由商户签发，可吊销、可设置过期时间。
//!
//! 状态机：
//! - `active` -> `revoked`：商户手动吊销，只能显式重新激活
//! - `active` -> `expired`：超过 expires_at，仅在校验时判断，不做后台清理
//!
//! 校验失败的具体原因（未知、吊销、过期、格式错误、商户停用）只写日志，
//! 调用方统一得到“令牌无效”，避免泄露令牌枚举信息。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use loyalty_shared::observability::metrics;
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use super::dto::IssuedScannerToken;
use crate::error::{EngineError, Result, TokenRejectReason};
use crate::models::{NewScannerToken, ScannerAccess, ScannerToken, ScannerTokenState};
use crate::repository::{BusinessRepository, ScannerTokenRepository};

pub const SCANNER_TOKEN_PREFIX: &str = "stk_";
const SECRET_LEN: usize = 32;
/// 列表中展示的前缀长度（含 stk_）
const DISPLAY_PREFIX_LEN: usize = 8;
const SECRET_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// 生成令牌明文
fn generate_secret() -> String {
    let mut rng = rand::rng();
    let body: String = (0..SECRET_LEN)
        .map(|_| SECRET_CHARSET[rng.random_range(0..SECRET_CHARSET.len())] as char)
        .collect();
    format!("{}{}", SCANNER_TOKEN_PREFIX, body)
}

/// 计算令牌摘要
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn is_well_formed(secret: &str) -> bool {
    secret
        .strip_prefix(SCANNER_TOKEN_PREFIX)
        .is_some_and(|body| body.len() == SECRET_LEN && body.bytes().all(|b| b.is_ascii_alphanumeric()))
}

pub struct ScannerGate {
    token_repo: Arc<ScannerTokenRepository>,
    business_repo: Arc<BusinessRepository>,
}

impl ScannerGate {
    pub fn new(token_repo: Arc<ScannerTokenRepository>, business_repo: Arc<BusinessRepository>) -> Self {
        Self {
            token_repo,
            business_repo,
        }
    }

    /// 签发令牌，明文只在返回值中出现一次
    #[instrument(skip(self))]
    pub async fn issue(
        &self,
        business_id: i64,
        location_id: Option<String>,
        location_name: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<IssuedScannerToken> {
        let now = Utc::now();
        if expires_at.is_some_and(|t| t <= now) {
            return Err(EngineError::Validation("过期时间必须晚于当前时间".to_string()));
        }
        self.business_repo
            .find_by_id(business_id)
            .await?
            .ok_or(EngineError::BusinessNotFound(business_id))?;

        let secret = generate_secret();
        let token = self
            .token_repo
            .create(&NewScannerToken {
                business_id,
                location_id,
                location_name,
                token_hash: hash_secret(&secret),
                token_prefix: secret[..DISPLAY_PREFIX_LEN].to_string(),
                expires_at,
                created_at: now,
            })
            .await?;

        info!(business_id, token_id = token.id, "扫码令牌已签发");
        Ok(IssuedScannerToken { token, secret })
    }

    pub async fn list(&self, business_id: i64) -> Result<Vec<ScannerToken>> {
        self.token_repo.list_by_business(business_id).await
    }

    /// 吊销
    #[instrument(skip(self))]
    pub async fn revoke(&self, business_id: i64, token_id: i64) -> Result<ScannerToken> {
        let token = self
            .token_repo
            .set_active(business_id, token_id, false)
            .await?
            .ok_or(EngineError::ScannerTokenNotFound(token_id))?;
        info!(business_id, token_id, "扫码令牌已吊销");
        Ok(token)
    }

    /// 重新激活（过期时间不变，已过期的令牌激活后仍不可用）
    #[instrument(skip(self))]
    pub async fn reactivate(&self, business_id: i64, token_id: i64) -> Result<ScannerToken> {
        let token = self
            .token_repo
            .set_active(business_id, token_id, true)
            .await?
            .ok_or(EngineError::ScannerTokenNotFound(token_id))?;
        info!(business_id, token_id, "扫码令牌已重新激活");
        Ok(token)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, business_id: i64, token_id: i64) -> Result<()> {
        if !self.token_repo.delete(business_id, token_id).await? {
            return Err(EngineError::ScannerTokenNotFound(token_id));
        }
        info!(business_id, token_id, "扫码令牌已删除");
        Ok(())
    }

    /// 校验令牌
    ///
    /// 成功后在后台记录使用次数，记录失败只告警，不影响校验结果
    pub async fn validate(&self, secret: &str) -> Result<ScannerAccess> {
        let now = Utc::now();
        let access = match self.check(secret, now).await {
            Ok(access) => access,
            Err(EngineError::ScannerTokenRejected(reason)) => {
                metrics::record_scanner_validation(reason.as_str());
                warn!(reason = reason.as_str(), "扫码令牌校验失败");
                return Err(EngineError::ScannerTokenRejected(reason));
            }
            Err(e) => return Err(e),
        };

        metrics::record_scanner_validation("accepted");
        self.spawn_record_usage(access.token_id, now);

        Ok(access)
    }

    /// 后台记录使用次数，不阻塞扫码请求
    fn spawn_record_usage(&self, token_id: i64, now: DateTime<Utc>) {
        let token_repo = Arc::clone(&self.token_repo);
        tokio::spawn(async move {
            if let Err(e) = token_repo.record_usage(token_id, now).await {
                warn!(token_id, error = %e, "记录令牌使用失败");
            }
        });
    }

    async fn check(&self, secret: &str, now: DateTime<Utc>) -> Result<ScannerAccess> {
        let reject = EngineError::ScannerTokenRejected;

        if !is_well_formed(secret) {
            return Err(reject(TokenRejectReason::Malformed));
        }

        let token = self
            .token_repo
            .find_by_hash(&hash_secret(secret))
            .await?
            .ok_or(reject(TokenRejectReason::Unknown))?;

        match token.state(now) {
            ScannerTokenState::Active => {}
            ScannerTokenState::Revoked => return Err(reject(TokenRejectReason::Revoked)),
            ScannerTokenState::Expired => return Err(reject(TokenRejectReason::Expired)),
        }

        let business_active = self
            .business_repo
            .find_by_id(token.business_id)
            .await?
            .is_some_and(|b| b.is_active);
        if !business_active {
            return Err(reject(TokenRejectReason::BusinessInactive));
        }

        Ok(ScannerAccess {
            token_id: token.id,
            business_id: token.business_id,
            location_id: token.location_id,
            location_name: token.location_name,
        })
    }
}
