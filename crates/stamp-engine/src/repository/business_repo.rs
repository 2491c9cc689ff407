//! 商户仓储

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::Result;
use crate::models::Business;

const BUSINESS_COLUMNS: &str =
    "id, name, reward_threshold, reward_description, is_active, created_at, updated_at";

pub struct BusinessRepository {
    pool: SqlitePool,
}

impl BusinessRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 创建或更新商户设置
    ///
    /// 新商户默认启用；更新时不改变启用状态和创建时间
    pub async fn upsert(
        &self,
        id: i64,
        name: &str,
        reward_threshold: i64,
        reward_description: &str,
        now: DateTime<Utc>,
    ) -> Result<Business> {
        let business = sqlx::query_as::<_, Business>(&format!(
            r#"
            INSERT INTO businesses (id, name, reward_threshold, reward_description, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, 1, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                reward_threshold = excluded.reward_threshold,
                reward_description = excluded.reward_description,
                updated_at = excluded.updated_at
            RETURNING {BUSINESS_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(name)
        .bind(reward_threshold)
        .bind(reward_description)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(business)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Business>> {
        let business = sqlx::query_as::<_, Business>(&format!(
            "SELECT {BUSINESS_COLUMNS} FROM businesses WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(business)
    }

    /// 在事务中读取商户
    pub async fn find_by_id_in_tx(conn: &mut SqliteConnection, id: i64) -> Result<Option<Business>> {
        let business = sqlx::query_as::<_, Business>(&format!(
            "SELECT {BUSINESS_COLUMNS} FROM businesses WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(business)
    }

    /// 启用或停用商户
    pub async fn set_active(
        &self,
        id: i64,
        is_active: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Business>> {
        let business = sqlx::query_as::<_, Business>(&format!(
            r#"
            UPDATE businesses SET is_active = ?, updated_at = ?
            WHERE id = ?
            RETURNING {BUSINESS_COLUMNS}
            "#
        ))
        .bind(is_active)
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(business)
    }
}
