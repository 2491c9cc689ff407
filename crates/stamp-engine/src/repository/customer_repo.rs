//! 客户仓储
//!
//! 余额更新带版本号检查，防止并发写入丢失更新

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::Result;
use crate::models::Customer;

const CUSTOMER_COLUMNS: &str = "id, business_id, name, phone, stamps_count, total_rewards_earned, \
                                last_stamp_at, enrolled_at, version";

pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 入会
    pub async fn create(
        &self,
        business_id: i64,
        name: Option<&str>,
        phone: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Customer> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            r#"
            INSERT INTO customers (business_id, name, phone, stamps_count, total_rewards_earned, enrolled_at, version)
            VALUES (?, ?, ?, 0, 0, ?, 0)
            RETURNING {CUSTOMER_COLUMNS}
            "#
        ))
        .bind(business_id)
        .bind(name)
        .bind(phone)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(customer)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    pub async fn find_by_id_in_tx(conn: &mut SqliteConnection, id: i64) -> Result<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(customer)
    }

    /// 按版本号更新印章余额
    ///
    /// 返回 false 表示版本已被其他事务修改
    pub async fn update_balance_in_tx(
        conn: &mut SqliteConnection,
        customer_id: i64,
        expected_version: i64,
        stamps_count: i64,
        total_rewards_earned: i64,
        last_stamp_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE customers
            SET stamps_count = ?, total_rewards_earned = ?, last_stamp_at = ?, version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(stamps_count)
        .bind(total_rewards_earned)
        .bind(last_stamp_at)
        .bind(customer_id)
        .bind(expected_version)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// 商户下有集章记录的客户（沉睡扫描用）
    pub async fn list_with_last_stamp(&self, business_id: i64) -> Result<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(&format!(
            r#"
            SELECT {CUSTOMER_COLUMNS} FROM customers
            WHERE business_id = ? AND last_stamp_at IS NOT NULL
            ORDER BY id
            "#
        ))
        .bind(business_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    /// 有集章记录客户的商户 ID 列表
    pub async fn list_business_ids_with_stamps(&self) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT DISTINCT business_id FROM customers WHERE last_stamp_at IS NOT NULL ORDER BY business_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
