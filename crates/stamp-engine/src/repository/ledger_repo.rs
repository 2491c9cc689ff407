//! 集章流水仓储
//!
//! 流水只追加，(business_id, idempotency_key) 上有唯一约束

use sqlx::{SqliteConnection, SqlitePool};

use crate::error::Result;
use crate::models::{NewStampLedgerEntry, StampLedgerEntry};

pub struct StampLedgerRepository {
    pool: SqlitePool,
}

impl StampLedgerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 在事务中追加流水，返回新记录 ID
    pub async fn create_in_tx(conn: &mut SqliteConnection, entry: &NewStampLedgerEntry) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO stamp_ledger (customer_id, business_id, quantity, idempotency_key, actor, balance_after, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(entry.customer_id)
        .bind(entry.business_id)
        .bind(entry.quantity)
        .bind(&entry.idempotency_key)
        .bind(&entry.actor)
        .bind(entry.balance_after)
        .bind(entry.created_at)
        .fetch_one(conn)
        .await?;

        Ok(id)
    }

    /// 客户的流水，按时间倒序
    pub async fn list_by_customer(&self, customer_id: i64, limit: i64) -> Result<Vec<StampLedgerEntry>> {
        let entries = sqlx::query_as::<_, StampLedgerEntry>(
            r#"
            SELECT id, customer_id, business_id, quantity, idempotency_key, actor, balance_after, created_at
            FROM stamp_ledger
            WHERE customer_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(customer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// 客户累计获得的印章总数
    pub async fn sum_quantity(&self, customer_id: i64) -> Result<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(quantity), 0) FROM stamp_ledger WHERE customer_id = ?",
        )
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }
}
