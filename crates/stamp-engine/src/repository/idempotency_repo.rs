//! 幂等键仓储
//!
//! 幂等键与业务写入在同一事务内，事务回滚时幂等键一并消失

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::error::Result;

/// 占用幂等键的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdempotencyClaim {
    /// 首次出现，本事务持有该键
    Fresh,
    /// 已存在；None 表示首个请求尚未提交
    Existing(Option<String>),
}

pub struct IdempotencyRepository;

impl IdempotencyRepository {
    /// 尝试占用幂等键
    ///
    /// 必须作为事务的第一条语句执行，以便先拿到写锁
    pub async fn claim_in_tx(
        conn: &mut SqliteConnection,
        business_id: i64,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<IdempotencyClaim> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO idempotency_keys (business_id, idempotency_key, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT (business_id, idempotency_key) DO NOTHING
            "#,
        )
        .bind(business_id)
        .bind(key)
        .bind(now)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if inserted == 1 {
            return Ok(IdempotencyClaim::Fresh);
        }

        let response = sqlx::query_scalar::<_, Option<String>>(
            "SELECT response FROM idempotency_keys WHERE business_id = ? AND idempotency_key = ?",
        )
        .bind(business_id)
        .bind(key)
        .fetch_one(&mut *conn)
        .await?;

        Ok(IdempotencyClaim::Existing(response))
    }

    /// 写入首个请求的结果
    pub async fn record_in_tx(
        conn: &mut SqliteConnection,
        business_id: i64,
        key: &str,
        response: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE idempotency_keys SET response = ?, completed_at = ?
            WHERE business_id = ? AND idempotency_key = ?
            "#,
        )
        .bind(response)
        .bind(now)
        .bind(business_id)
        .bind(key)
        .execute(conn)
        .await?;

        Ok(())
    }
}
