//! 扫码令牌仓储

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::{NewScannerToken, ScannerToken};

const TOKEN_COLUMNS: &str = "id, business_id, location_id, location_name, token_hash, token_prefix, \
                             is_active, usage_count, last_used_at, expires_at, created_at";

pub struct ScannerTokenRepository {
    pool: SqlitePool,
}

impl ScannerTokenRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, token: &NewScannerToken) -> Result<ScannerToken> {
        let created = sqlx::query_as::<_, ScannerToken>(&format!(
            r#"
            INSERT INTO scanner_tokens (business_id, location_id, location_name, token_hash, token_prefix,
                                        is_active, usage_count, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, 1, 0, ?, ?)
            RETURNING {TOKEN_COLUMNS}
            "#
        ))
        .bind(token.business_id)
        .bind(&token.location_id)
        .bind(&token.location_name)
        .bind(&token.token_hash)
        .bind(&token.token_prefix)
        .bind(token.expires_at)
        .bind(token.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// 按摘要查找（校验用）
    pub async fn find_by_hash(&self, token_hash: &str) -> Result<Option<ScannerToken>> {
        let token = sqlx::query_as::<_, ScannerToken>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM scanner_tokens WHERE token_hash = ?"
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    pub async fn list_by_business(&self, business_id: i64) -> Result<Vec<ScannerToken>> {
        let tokens = sqlx::query_as::<_, ScannerToken>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM scanner_tokens WHERE business_id = ? ORDER BY id"
        ))
        .bind(business_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tokens)
    }

    /// 吊销或重新激活，令牌不属于该商户时返回 None
    pub async fn set_active(
        &self,
        business_id: i64,
        token_id: i64,
        is_active: bool,
    ) -> Result<Option<ScannerToken>> {
        let token = sqlx::query_as::<_, ScannerToken>(&format!(
            r#"
            UPDATE scanner_tokens SET is_active = ?
            WHERE id = ? AND business_id = ?
            RETURNING {TOKEN_COLUMNS}
            "#
        ))
        .bind(is_active)
        .bind(token_id)
        .bind(business_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    pub async fn delete(&self, business_id: i64, token_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM scanner_tokens WHERE id = ? AND business_id = ?")
            .bind(token_id)
            .bind(business_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 记录一次使用
    pub async fn record_usage(&self, token_id: i64, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE scanner_tokens SET usage_count = usage_count + 1, last_used_at = ? WHERE id = ?",
        )
        .bind(now)
        .bind(token_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
