//! 营销活动管理

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use crate::campaign::CampaignTrigger;
use crate::error::{EngineError, Result};
use crate::models::{Campaign, CampaignStatus, NewCampaign};
use crate::repository::{BusinessRepository, CampaignRepository};

pub struct CampaignService {
    campaign_repo: Arc<CampaignRepository>,
    business_repo: Arc<BusinessRepository>,
}

impl CampaignService {
    pub fn new(campaign_repo: Arc<CampaignRepository>, business_repo: Arc<BusinessRepository>) -> Self {
        Self {
            campaign_repo,
            business_repo,
        }
    }

    /// 创建活动，未指定状态时为草稿
    #[instrument(skip(self, message_template))]
    pub async fn create_campaign(
        &self,
        business_id: i64,
        name: &str,
        trigger: CampaignTrigger,
        message_template: &str,
        status: Option<CampaignStatus>,
    ) -> Result<Campaign> {
        if name.trim().is_empty() {
            return Err(EngineError::Validation("活动名称不能为空".to_string()));
        }
        if message_template.trim().is_empty() {
            return Err(EngineError::Validation("消息模板不能为空".to_string()));
        }
        trigger.validate()?;

        let business = self
            .business_repo
            .find_by_id(business_id)
            .await?
            .ok_or(EngineError::BusinessNotFound(business_id))?;

        // 结转后印章数总是小于门槛，达到门槛的条件永远不会命中
        if let CampaignTrigger::StampsReached { stamps } = trigger {
            if stamps >= business.reward_threshold {
                return Err(EngineError::Validation(format!(
                    "stamps_reached 的印章数必须小于集章门槛 {}，实际为 {}",
                    business.reward_threshold, stamps
                )));
            }
        }

        let campaign = self
            .campaign_repo
            .create(
                &NewCampaign {
                    business_id,
                    name: name.trim().to_string(),
                    trigger,
                    message_template: message_template.to_string(),
                    status: status.unwrap_or(CampaignStatus::Draft),
                },
                Utc::now(),
            )
            .await?;

        info!(
            business_id,
            campaign_id = campaign.id,
            trigger = trigger.trigger_type(),
            "活动已创建"
        );
        Ok(campaign)
    }

    pub async fn list_campaigns(&self, business_id: i64) -> Result<Vec<Campaign>> {
        self.campaign_repo.list_by_business(business_id).await
    }

    #[instrument(skip(self))]
    pub async fn update_campaign_status(
        &self,
        business_id: i64,
        campaign_id: i64,
        status: CampaignStatus,
    ) -> Result<Campaign> {
        let campaign = self
            .campaign_repo
            .update_status(business_id, campaign_id, status, Utc::now())
            .await?
            .ok_or(EngineError::CampaignNotFound(campaign_id))?;
        info!(business_id, campaign_id, status = status.as_str(), "活动状态已更新");
        Ok(campaign)
    }
}
