//! 奖励兑换服务
//!
//! 兑换不改变印章数（结转已在集章时完成），只消耗解锁事件：
//! - `redeem`：兑换客户最早的未兑换奖励
//! - `redeem_unlock`：兑换指定的解锁事件
//!
//! 两者都以条件写入设置 redeemed_at，同一事务内追加兑换记录。
//! 事务第一条语句即为写入，确保并发兑换在写锁上串行。

use std::sync::Arc;

use chrono::Utc;
use loyalty_shared::observability::metrics;
use loyalty_shared::retry::{RetryPolicy, retry_with_policy};
use sqlx::SqlitePool;
use tracing::{info, instrument};

use super::dto::{CustomerRewards, RewardView};
use crate::error::{EngineError, Result};
use crate::models::{Actor, RedemptionRecord, RewardState};
use crate::repository::{CustomerRepository, RewardRepository};

pub struct RedemptionService {
    pool: SqlitePool,
    reward_repo: Arc<RewardRepository>,
    customer_repo: Arc<CustomerRepository>,
    retry_policy: RetryPolicy,
}

impl RedemptionService {
    pub fn new(pool: SqlitePool, retry_policy: RetryPolicy) -> Self {
        Self {
            reward_repo: Arc::new(RewardRepository::new(pool.clone())),
            customer_repo: Arc::new(CustomerRepository::new(pool.clone())),
            pool,
            retry_policy,
        }
    }

    /// 兑换客户最早的一个未兑换奖励
    #[instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn redeem(
        &self,
        business_id: i64,
        customer_id: i64,
        actor: &Actor,
    ) -> Result<RedemptionRecord> {
        let actor = actor.to_string();
        let result = retry_with_policy(
            &self.retry_policy,
            "redeem",
            |e: &EngineError| matches!(e, EngineError::ConcurrencyConflict),
            || self.redeem_oldest_once(business_id, customer_id, &actor),
        )
        .await;

        Self::finish("redeem", result)
    }

    /// 兑换指定的解锁事件
    ///
    /// 已兑换过的事件返回 `AlreadyRedeemed`
    #[instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn redeem_unlock(
        &self,
        business_id: i64,
        unlock_event_id: i64,
        actor: &Actor,
    ) -> Result<RedemptionRecord> {
        let actor = actor.to_string();
        let result = retry_with_policy(
            &self.retry_policy,
            "redeem_unlock",
            |e: &EngineError| matches!(e, EngineError::ConcurrencyConflict),
            || self.redeem_unlock_once(business_id, unlock_event_id, &actor),
        )
        .await;

        Self::finish("redeem_unlock", result)
    }

    async fn redeem_oldest_once(
        &self,
        business_id: i64,
        customer_id: i64,
        actor: &str,
    ) -> Result<RedemptionRecord> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let Some(unlock) =
            RewardRepository::redeem_oldest_in_tx(&mut *tx, business_id, customer_id, now).await?
        else {
            let customer = CustomerRepository::find_by_id_in_tx(&mut *tx, customer_id).await?;
            tx.rollback().await?;
            return match customer {
                Some(c) if c.business_id == business_id => {
                    Err(EngineError::NoRewardAvailable(customer_id))
                }
                _ => Err(EngineError::CustomerNotFound(customer_id)),
            };
        };

        let record = RewardRepository::create_redemption_in_tx(&mut *tx, &unlock, actor, now).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn redeem_unlock_once(
        &self,
        business_id: i64,
        unlock_event_id: i64,
        actor: &str,
    ) -> Result<RedemptionRecord> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let Some(unlock) =
            RewardRepository::redeem_by_id_in_tx(&mut *tx, business_id, unlock_event_id, now)
                .await?
        else {
            let existing = RewardRepository::find_unlock_in_tx(&mut *tx, unlock_event_id).await?;
            tx.rollback().await?;
            return match existing {
                Some(u) if u.business_id == business_id && u.redeemed_at.is_some() => {
                    Err(EngineError::AlreadyRedeemed(unlock_event_id))
                }
                _ => Err(EngineError::UnlockEventNotFound(unlock_event_id)),
            };
        };

        let record = RewardRepository::create_redemption_in_tx(&mut *tx, &unlock, actor, now).await?;
        tx.commit().await?;
        Ok(record)
    }

    fn finish(operation: &str, result: Result<RedemptionRecord>) -> Result<RedemptionRecord> {
        match &result {
            Ok(record) => {
                metrics::record_redemption("success");
                info!(
                    operation,
                    redemption_id = record.id,
                    unlock_event_id = record.unlock_event_id,
                    customer_id = record.customer_id,
                    "奖励兑换成功"
                );
            }
            Err(e) => metrics::record_redemption(e.error_code()),
        }
        result
    }

    /// 客户的奖励列表（含已兑换）
    pub async fn list_rewards(&self, business_id: i64, customer_id: i64) -> Result<CustomerRewards> {
        self.customer_repo
            .find_by_id(customer_id)
            .await?
            .filter(|c| c.business_id == business_id)
            .ok_or(EngineError::CustomerNotFound(customer_id))?;

        let rewards: Vec<RewardView> = self
            .reward_repo
            .list_unlocks_by_customer(customer_id)
            .await?
            .into_iter()
            .map(RewardView::from)
            .collect();
        let outstanding = rewards
            .iter()
            .filter(|r| r.state == RewardState::Outstanding)
            .count() as i64;

        Ok(CustomerRewards {
            customer_id,
            outstanding,
            rewards,
        })
    }

    /// 客户的兑换历史
    pub async fn list_redemptions(
        &self,
        business_id: i64,
        customer_id: i64,
    ) -> Result<Vec<RedemptionRecord>> {
        self.customer_repo
            .find_by_id(customer_id)
            .await?
            .filter(|c| c.business_id == business_id)
            .ok_or(EngineError::CustomerNotFound(customer_id))?;

        self.reward_repo
            .list_redemptions_by_customer(customer_id)
            .await
    }
}
