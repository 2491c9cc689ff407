//! 营销活动仓储

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::traits::CampaignStatsRepository;
use crate::error::Result;
use crate::models::{Campaign, CampaignRow, CampaignStatus, NewCampaign};

const CAMPAIGN_COLUMNS: &str = "id, business_id, name, trigger_type, trigger_value, message_template, \
                                status, sent_count, failed_count, created_at, updated_at";

#[derive(Clone)]
pub struct CampaignRepository {
    pool: SqlitePool,
}

impl CampaignRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, campaign: &NewCampaign, now: DateTime<Utc>) -> Result<Campaign> {
        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            r#"
            INSERT INTO campaigns (business_id, name, trigger_type, trigger_value, message_template,
                                   status, sent_count, failed_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 0, 0, ?, ?)
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        ))
        .bind(campaign.business_id)
        .bind(&campaign.name)
        .bind(campaign.trigger.trigger_type())
        .bind(campaign.trigger.trigger_value())
        .bind(&campaign.message_template)
        .bind(campaign.status)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    pub async fn list_by_business(&self, business_id: i64) -> Result<Vec<Campaign>> {
        let rows = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE business_id = ? ORDER BY id"
        ))
        .bind(business_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Campaign::try_from).collect()
    }

    /// 商户下处于启用状态的活动
    pub async fn list_active(&self, business_id: i64) -> Result<Vec<Campaign>> {
        let rows = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE business_id = ? AND status = ? ORDER BY id"
        ))
        .bind(business_id)
        .bind(CampaignStatus::Active)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Campaign::try_from).collect()
    }

    pub async fn find_by_id(&self, campaign_id: i64) -> Result<Option<Campaign>> {
        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?"
        ))
        .bind(campaign_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Campaign::try_from).transpose()
    }

    pub async fn update_status(
        &self,
        business_id: i64,
        campaign_id: i64,
        status: CampaignStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Campaign>> {
        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            r#"
            UPDATE campaigns SET status = ?, updated_at = ?
            WHERE id = ? AND business_id = ?
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        ))
        .bind(status)
        .bind(now)
        .bind(campaign_id)
        .bind(business_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Campaign::try_from).transpose()
    }

    /// 记录触发
    ///
    /// 返回 false 表示同一 (活动, 客户, 事件) 已触发过
    pub async fn record_firing(
        &self,
        campaign_id: i64,
        customer_id: i64,
        event_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO campaign_firings (campaign_id, customer_id, fired_for_event_id, fired_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (campaign_id, customer_id, fired_for_event_id) DO NOTHING
            "#,
        )
        .bind(campaign_id)
        .bind(customer_id)
        .bind(event_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn count_firings(&self, campaign_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM campaign_firings WHERE campaign_id = ?",
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

#[async_trait]
impl CampaignStatsRepository for CampaignRepository {
    async fn increment_sent(&self, campaign_id: i64) -> Result<()> {
        sqlx::query("UPDATE campaigns SET sent_count = sent_count + 1 WHERE id = ?")
            .bind(campaign_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn increment_failed(&self, campaign_id: i64) -> Result<()> {
        sqlx::query("UPDATE campaigns SET failed_count = failed_count + 1 WHERE id = ?")
            .bind(campaign_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
