//! 商户设置与客户入会

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};

use crate::campaign::{CampaignEvaluator, CustomerEvent};
use crate::error::{EngineError, Result};
use crate::models::{Business, Customer, StampLedgerEntry};
use crate::repository::{BusinessRepository, CustomerRepository, StampLedgerRepository};

const MAX_NAME_LEN: usize = 120;
/// 客户详情中展示的最近流水条数
const RECENT_LEDGER_LIMIT: i64 = 20;

/// 客户详情
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub customer: Customer,
    pub reward_threshold: i64,
    pub stamps_remaining: i64,
    /// 历史累计印章数
    pub lifetime_stamps: i64,
    pub recent_ledger: Vec<StampLedgerEntry>,
}

pub struct BusinessService {
    business_repo: Arc<BusinessRepository>,
    customer_repo: Arc<CustomerRepository>,
    ledger_repo: Arc<StampLedgerRepository>,
    campaign_evaluator: Option<Arc<CampaignEvaluator>>,
}

impl BusinessService {
    pub fn new(
        business_repo: Arc<BusinessRepository>,
        customer_repo: Arc<CustomerRepository>,
        ledger_repo: Arc<StampLedgerRepository>,
    ) -> Self {
        Self {
            business_repo,
            customer_repo,
            ledger_repo,
            campaign_evaluator: None,
        }
    }

    pub fn with_campaign_evaluator(mut self, evaluator: Arc<CampaignEvaluator>) -> Self {
        self.campaign_evaluator = Some(evaluator);
        self
    }

    /// 创建或更新商户奖励设置
    ///
    /// 修改门槛不会换算已有进度
    #[instrument(skip(self))]
    pub async fn upsert_business(
        &self,
        business_id: i64,
        name: &str,
        reward_threshold: i64,
        reward_description: &str,
    ) -> Result<Business> {
        if reward_threshold < 1 {
            return Err(EngineError::Validation("集章门槛必须大于等于 1".to_string()));
        }
        if name.trim().is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(EngineError::Validation(format!(
                "商户名称不能为空且不超过 {} 个字符",
                MAX_NAME_LEN
            )));
        }
        if reward_description.trim().is_empty() {
            return Err(EngineError::Validation("奖励描述不能为空".to_string()));
        }

        let business = self
            .business_repo
            .upsert(
                business_id,
                name.trim(),
                reward_threshold,
                reward_description.trim(),
                Utc::now(),
            )
            .await?;

        info!(business_id, reward_threshold, "商户设置已保存");
        Ok(business)
    }

    pub async fn get_business(&self, business_id: i64) -> Result<Business> {
        self.business_repo
            .find_by_id(business_id)
            .await?
            .ok_or(EngineError::BusinessNotFound(business_id))
    }

    /// 启用或停用商户
    ///
    /// 停用后该商户的集章与扫码均被拒绝
    #[instrument(skip(self))]
    pub async fn set_business_active(&self, business_id: i64, is_active: bool) -> Result<Business> {
        let business = self
            .business_repo
            .set_active(business_id, is_active, Utc::now())
            .await?
            .ok_or(EngineError::BusinessNotFound(business_id))?;
        info!(business_id, is_active, "商户状态已更新");
        Ok(business)
    }

    /// 客户入会，成功后发布 CustomerEnrolled
    #[instrument(skip(self, name, phone))]
    pub async fn enroll(
        &self,
        business_id: i64,
        name: Option<String>,
        phone: Option<String>,
    ) -> Result<Customer> {
        let business = self.get_business(business_id).await?;
        if !business.is_active {
            return Err(EngineError::BusinessInactive(business_id));
        }

        let name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        let phone = phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());

        let customer = self
            .customer_repo
            .create(business_id, name.as_deref(), phone.as_deref(), Utc::now())
            .await?;

        info!(business_id, customer_id = customer.id, "客户已入会");

        if let Some(evaluator) = &self.campaign_evaluator {
            evaluator
                .publish(business_id, customer.id, vec![CustomerEvent::CustomerEnrolled])
                .await;
        }

        Ok(customer)
    }

    /// 客户详情
    pub async fn get_customer(&self, business_id: i64, customer_id: i64) -> Result<CustomerDetail> {
        let customer = self
            .customer_repo
            .find_by_id(customer_id)
            .await?
            .filter(|c| c.business_id == business_id)
            .ok_or(EngineError::CustomerNotFound(customer_id))?;
        let business = self.get_business(business_id).await?;

        let lifetime_stamps = self.ledger_repo.sum_quantity(customer_id).await?;
        let recent_ledger = self
            .ledger_repo
            .list_by_customer(customer_id, RECENT_LEDGER_LIMIT)
            .await?;

        Ok(CustomerDetail {
            reward_threshold: business.reward_threshold,
            stamps_remaining: customer.stamps_remaining(business.reward_threshold),
            lifetime_stamps,
            recent_ledger,
            customer,
        })
    }
}
