//! 奖励解锁与兑换仓储
//!
//! redeemed_at 的设置是条件写入（`redeemed_at IS NULL`），
//! 同一个解锁事件只会被兑换一次。

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::Result;
use crate::models::{RedemptionRecord, RewardUnlockEvent};

const UNLOCK_COLUMNS: &str =
    "id, customer_id, business_id, source_ledger_entry_id, unlocked_at, redeemed_at";

pub struct RewardRepository {
    pool: SqlitePool,
}

impl RewardRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 在事务中创建解锁事件
    pub async fn create_unlock_in_tx(
        conn: &mut SqliteConnection,
        customer_id: i64,
        business_id: i64,
        source_ledger_entry_id: i64,
        unlocked_at: DateTime<Utc>,
    ) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO reward_unlocks (customer_id, business_id, source_ledger_entry_id, unlocked_at)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(customer_id)
        .bind(business_id)
        .bind(source_ledger_entry_id)
        .bind(unlocked_at)
        .fetch_one(conn)
        .await?;

        Ok(id)
    }

    /// 兑换客户最早的未兑换奖励
    ///
    /// 没有可兑换奖励时返回 None
    pub async fn redeem_oldest_in_tx(
        conn: &mut SqliteConnection,
        business_id: i64,
        customer_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<RewardUnlockEvent>> {
        let event = sqlx::query_as::<_, RewardUnlockEvent>(&format!(
            r#"
            UPDATE reward_unlocks SET redeemed_at = ?
            WHERE id = (
                SELECT id FROM reward_unlocks
                WHERE customer_id = ? AND business_id = ? AND redeemed_at IS NULL
                ORDER BY id
                LIMIT 1
            )
            AND redeemed_at IS NULL
            RETURNING {UNLOCK_COLUMNS}
            "#
        ))
        .bind(now)
        .bind(customer_id)
        .bind(business_id)
        .fetch_optional(conn)
        .await?;

        Ok(event)
    }

    /// 兑换指定的解锁事件
    ///
    /// 事件不存在、不属于该商户或已兑换时返回 None
    pub async fn redeem_by_id_in_tx(
        conn: &mut SqliteConnection,
        business_id: i64,
        unlock_event_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<RewardUnlockEvent>> {
        let event = sqlx::query_as::<_, RewardUnlockEvent>(&format!(
            r#"
            UPDATE reward_unlocks SET redeemed_at = ?
            WHERE id = ? AND business_id = ? AND redeemed_at IS NULL
            RETURNING {UNLOCK_COLUMNS}
            "#
        ))
        .bind(now)
        .bind(unlock_event_id)
        .bind(business_id)
        .fetch_optional(conn)
        .await?;

        Ok(event)
    }

    pub async fn find_unlock_in_tx(
        conn: &mut SqliteConnection,
        unlock_event_id: i64,
    ) -> Result<Option<RewardUnlockEvent>> {
        let event = sqlx::query_as::<_, RewardUnlockEvent>(&format!(
            "SELECT {UNLOCK_COLUMNS} FROM reward_unlocks WHERE id = ?"
        ))
        .bind(unlock_event_id)
        .fetch_optional(conn)
        .await?;

        Ok(event)
    }

    /// 在事务中追加兑换记录
    pub async fn create_redemption_in_tx(
        conn: &mut SqliteConnection,
        unlock: &RewardUnlockEvent,
        actor: &str,
        redeemed_at: DateTime<Utc>,
    ) -> Result<RedemptionRecord> {
        let record = sqlx::query_as::<_, RedemptionRecord>(
            r#"
            INSERT INTO redemptions (unlock_event_id, customer_id, business_id, actor, redeemed_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, unlock_event_id, customer_id, business_id, actor, redeemed_at
            "#,
        )
        .bind(unlock.id)
        .bind(unlock.customer_id)
        .bind(unlock.business_id)
        .bind(actor)
        .bind(redeemed_at)
        .fetch_one(conn)
        .await?;

        Ok(record)
    }

    /// 客户的全部解锁事件，按解锁顺序
    pub async fn list_unlocks_by_customer(&self, customer_id: i64) -> Result<Vec<RewardUnlockEvent>> {
        let events = sqlx::query_as::<_, RewardUnlockEvent>(&format!(
            "SELECT {UNLOCK_COLUMNS} FROM reward_unlocks WHERE customer_id = ? ORDER BY id"
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    pub async fn list_redemptions_by_customer(&self, customer_id: i64) -> Result<Vec<RedemptionRecord>> {
        let records = sqlx::query_as::<_, RedemptionRecord>(
            r#"
            SELECT id, unlock_event_id, customer_id, business_id, actor, redeemed_at
            FROM redemptions
            WHERE customer_id = ?
            ORDER BY id
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
