//! 幂等守卫
//!
//! 在同一事务内先占用 (business_id, key)，再执行业务操作并保存结果：
//! - 键首次出现：执行操作，结果与键一起提交
//! - 键已存在：不执行操作，返回首个请求保存的结果
//! - 操作失败：事务回滚，键随之消失，调用方可以用同一个键重试
//!
//! 键由调用方生成，守卫从不自行生成。

use chrono::Utc;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::repository::{IdempotencyClaim, IdempotencyRepository};

pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 200;

/// 幂等执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied<T> {
    /// 本次实际执行
    Fresh(T),
    /// 重复请求，返回首次结果
    Replayed(T),
}

impl<T> Applied<T> {
    pub fn is_replayed(&self) -> bool {
        matches!(self, Self::Replayed(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Self::Fresh(v) | Self::Replayed(v) => v,
        }
    }
}

/// 校验幂等键：非空，不超过 200 个字符
pub fn validate_idempotency_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(EngineError::Validation("幂等键不能为空".to_string()));
    }
    if key.chars().count() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(EngineError::Validation(format!(
            "幂等键长度不能超过 {} 个字符",
            MAX_IDEMPOTENCY_KEY_LEN
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct IdempotencyGuard {
    pool: SqlitePool,
}

impl IdempotencyGuard {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 在幂等保护下执行操作
    ///
    /// `operation` 拿到的连接属于守卫开启的事务，它的所有写入与幂等键同生共死
    pub async fn apply<T, F>(&self, business_id: i64, key: &str, operation: F) -> Result<Applied<T>>
    where
        T: Serialize + DeserializeOwned + Send,
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T>> + Send,
    {
        validate_idempotency_key(key)?;

        let mut tx = self.pool.begin().await?;

        match IdempotencyRepository::claim_in_tx(&mut *tx, business_id, key, Utc::now()).await? {
            IdempotencyClaim::Fresh => {}
            IdempotencyClaim::Existing(Some(stored)) => {
                tx.rollback().await?;
                debug!(business_id, key, "幂等键已存在，返回首次结果");
                return Ok(Applied::Replayed(serde_json::from_str(&stored)?));
            }
            IdempotencyClaim::Existing(None) => {
                tx.rollback().await?;
                return Err(EngineError::ConcurrencyConflict);
            }
        }

        // 失败时 tx 被 drop，事务回滚，幂等键不会残留
        let value = operation(&mut *tx).await?;

        let response = serde_json::to_string(&value)?;
        IdempotencyRepository::record_in_tx(&mut *tx, business_id, key, &response, Utc::now())
            .await?;
        tx.commit().await?;

        Ok(Applied::Fresh(value))
    }
}
