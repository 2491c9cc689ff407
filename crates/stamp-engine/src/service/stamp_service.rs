//! 集章服务
//!
//! 处理集章与奖励解锁的核心逻辑：
//! - 数量校验（1..=10），不合法直接拒绝，不产生任何写入
//! - 幂等保护：同一商户下同一幂等键只生效一次
//! - 追加流水并按门槛结转，一次集章可解锁多个奖励
//! - 乐观锁更新客户余额，并发冲突按退避策略重试
//! - 提交后发布客户事件给活动评估（失败不影响主流程）
//!
//! ## 集章流程
//!
//! 1. 参数校验 -> 2. 占用幂等键 -> 3. 读取客户与商户 -> 4. 追加流水
//!    -> 5. 结转解锁 -> 6. 版本检查更新余额 -> 7. 提交 -> 8. 发布事件

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use loyalty_shared::observability::metrics;
use loyalty_shared::retry::{RetryPolicy, retry_with_policy};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, instrument};

use super::dto::GrantOutcome;
use super::idempotency::{Applied, IdempotencyGuard, validate_idempotency_key};
use crate::campaign::{CampaignEvaluator, CustomerEvent};
use crate::error::{EngineError, Result};
use crate::models::{Actor, NewStampLedgerEntry};
use crate::repository::{
    BusinessRepository, CustomerRepository, RewardRepository, StampLedgerRepository,
};

pub const MIN_QUANTITY: i64 = 1;
pub const MAX_QUANTITY: i64 = 10;

/// 按门槛结转
///
/// 返回 (结转后的印章数, 解锁的奖励数)。门槛下调后余额可能已超过门槛，
/// 循环同样会把超出部分全部结转。
pub fn apply_carry_over(stamps_count: i64, quantity: i64, threshold: i64) -> (i64, i64) {
    let threshold = threshold.max(1);
    let mut raw = stamps_count + quantity;
    let mut unlocked = 0;
    while raw >= threshold {
        raw -= threshold;
        unlocked += 1;
    }
    (raw, unlocked)
}

/// 集章服务
pub struct StampService {
    guard: IdempotencyGuard,
    retry_policy: RetryPolicy,
    /// 活动评估器（可选）
    campaign_evaluator: Option<Arc<CampaignEvaluator>>,
}

impl StampService {
    pub fn new(pool: SqlitePool, retry_policy: RetryPolicy) -> Self {
        Self {
            guard: IdempotencyGuard::new(pool),
            retry_policy,
            campaign_evaluator: None,
        }
    }

    pub fn with_campaign_evaluator(mut self, evaluator: Arc<CampaignEvaluator>) -> Self {
        self.campaign_evaluator = Some(evaluator);
        self
    }

    /// 集章
    ///
    /// 同一幂等键重复调用时返回首次结果，`replayed` 为 true，且不会再次发布事件
    #[instrument(skip(self, idempotency_key, actor), fields(actor = %actor))]
    pub async fn grant_stamps(
        &self,
        business_id: i64,
        customer_id: i64,
        quantity: i64,
        idempotency_key: &str,
        actor: &Actor,
    ) -> Result<GrantOutcome> {
        if !(MIN_QUANTITY..=MAX_QUANTITY).contains(&quantity) {
            return Err(EngineError::Validation(format!(
                "集章数量必须在 {} 到 {} 之间，实际为 {}",
                MIN_QUANTITY, MAX_QUANTITY, quantity
            )));
        }
        validate_idempotency_key(idempotency_key)?;

        let start = Instant::now();
        let actor = actor.to_string();

        let result = retry_with_policy(
            &self.retry_policy,
            "grant_stamps",
            |e: &EngineError| matches!(e, EngineError::ConcurrencyConflict),
            || {
                let key = idempotency_key.to_string();
                let actor = actor.clone();
                self.guard
                    .apply(business_id, idempotency_key, move |conn| {
                        Box::pin(Self::grant_in_tx(
                            conn,
                            business_id,
                            customer_id,
                            quantity,
                            key,
                            actor,
                        ))
                    })
            },
        )
        .await;

        let elapsed = start.elapsed().as_secs_f64();

        match result {
            Ok(Applied::Fresh(outcome)) => {
                metrics::record_stamp_grant("fresh", outcome.rewards_unlocked as u32, elapsed);
                info!(
                    business_id,
                    customer_id,
                    quantity,
                    new_stamps_count = outcome.new_stamps_count,
                    rewards_unlocked = outcome.rewards_unlocked,
                    ledger_entry_id = outcome.ledger_entry_id,
                    "集章成功"
                );
                self.publish_events(business_id, &outcome).await;
                Ok(outcome)
            }
            Ok(Applied::Replayed(mut outcome)) => {
                metrics::record_stamp_grant("replayed", 0, elapsed);
                info!(
                    business_id,
                    customer_id,
                    ledger_entry_id = outcome.ledger_entry_id,
                    "重复的集章请求，返回首次结果"
                );
                outcome.replayed = true;
                Ok(outcome)
            }
            Err(e) => {
                metrics::record_stamp_grant("failed", 0, elapsed);
                Err(e)
            }
        }
    }

    /// 事务内的集章步骤，由幂等守卫调用
    async fn grant_in_tx(
        conn: &mut SqliteConnection,
        business_id: i64,
        customer_id: i64,
        quantity: i64,
        idempotency_key: String,
        actor: String,
    ) -> Result<GrantOutcome> {
        let customer = CustomerRepository::find_by_id_in_tx(&mut *conn, customer_id)
            .await?
            .filter(|c| c.business_id == business_id)
            .ok_or(EngineError::CustomerNotFound(customer_id))?;

        let business = BusinessRepository::find_by_id_in_tx(&mut *conn, business_id)
            .await?
            .ok_or(EngineError::BusinessNotFound(business_id))?;
        if !business.is_active {
            return Err(EngineError::BusinessInactive(business_id));
        }

        let (new_count, unlocked) =
            apply_carry_over(customer.stamps_count, quantity, business.reward_threshold);
        let now = Utc::now();

        let ledger_entry_id = StampLedgerRepository::create_in_tx(
            &mut *conn,
            &NewStampLedgerEntry {
                customer_id,
                business_id,
                quantity,
                idempotency_key,
                actor,
                balance_after: new_count,
                created_at: now,
            },
        )
        .await?;

        let mut unlock_event_ids = Vec::with_capacity(unlocked as usize);
        for _ in 0..unlocked {
            let id = RewardRepository::create_unlock_in_tx(
                &mut *conn,
                customer_id,
                business_id,
                ledger_entry_id,
                now,
            )
            .await?;
            unlock_event_ids.push(id);
        }

        let total_rewards_earned = customer.total_rewards_earned + unlocked;
        let updated = CustomerRepository::update_balance_in_tx(
            &mut *conn,
            customer_id,
            customer.version,
            new_count,
            total_rewards_earned,
            now,
        )
        .await?;
        if !updated {
            return Err(EngineError::ConcurrencyConflict);
        }

        Ok(GrantOutcome {
            customer_id,
            new_stamps_count: new_count,
            rewards_unlocked: unlocked,
            total_rewards_earned,
            ledger_entry_id,
            unlock_event_ids,
            replayed: false,
        })
    }

    /// 提交后发布客户事件
    async fn publish_events(&self, business_id: i64, outcome: &GrantOutcome) {
        let Some(evaluator) = &self.campaign_evaluator else {
            return;
        };

        let mut events = vec![CustomerEvent::StampsGranted {
            ledger_entry_id: outcome.ledger_entry_id,
            new_count: outcome.new_stamps_count,
        }];
        events.extend(
            outcome
                .unlock_event_ids
                .iter()
                .map(|id| CustomerEvent::RewardUnlocked {
                    unlock_event_id: *id,
                }),
        );

        evaluator
            .publish(business_id, outcome.customer_id, events)
            .await;
    }
}
