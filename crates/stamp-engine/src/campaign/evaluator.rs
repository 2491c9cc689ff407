//! 活动触发评估器
//!
//! 集章、解锁、入会和沉睡扫描之后调用。对商户下每个启用中的活动：
//!
//! 1. 判断触发条件是否命中事件
//! 2. 客户没有手机号时直接跳过（不记录触发）
//! 3. 写入触发记录 (活动, 客户, 事件 ID)，主键冲突说明已经触发过
//! 4. 渲染模板，生成待发送消息
//!
//! 评估发生在业务事务提交之后，失败只记录日志，不会影响集章或兑换结果。

use std::sync::Arc;

use chrono::Utc;
use loyalty_shared::observability::metrics;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info, instrument, warn};

use super::event::CustomerEvent;
use super::template::{TemplateContext, render};
use crate::error::{EngineError, Result};
use crate::notification::MessageQueue;
use crate::repository::{BusinessRepository, CampaignRepository, CustomerRepository};

/// 待发送的活动消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledMessage {
    pub campaign_id: i64,
    pub business_id: i64,
    pub customer_id: i64,
    pub event_id: String,
    pub recipient_phone: String,
    pub rendered_body: String,
}

/// 评估器配置
#[derive(Debug, Clone, Default)]
pub struct CampaignEvaluatorConfig {
    /// 为 true 时 publish 在独立任务中评估，调用方不等待
    pub async_execution: bool,
}

pub struct CampaignEvaluator {
    campaign_repo: Arc<CampaignRepository>,
    customer_repo: Arc<CustomerRepository>,
    business_repo: Arc<BusinessRepository>,
    queue: Option<MessageQueue>,
    config: CampaignEvaluatorConfig,
}

impl CampaignEvaluator {
    pub fn new(pool: SqlitePool, config: CampaignEvaluatorConfig) -> Self {
        Self {
            campaign_repo: Arc::new(CampaignRepository::new(pool.clone())),
            customer_repo: Arc::new(CustomerRepository::new(pool.clone())),
            business_repo: Arc::new(BusinessRepository::new(pool)),
            queue: None,
            config,
        }
    }

    /// 生成的消息投入该队列
    pub fn with_queue(mut self, queue: MessageQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    /// 评估单个事件
    ///
    /// 返回本次新触发的消息。同一 (活动, 客户, 事件) 重复评估只会返回一次。
    #[instrument(skip(self, event), fields(event = event.name()))]
    pub async fn evaluate(
        &self,
        business_id: i64,
        customer_id: i64,
        event: &CustomerEvent,
    ) -> Result<Vec<ScheduledMessage>> {
        let campaigns: Vec<_> = self
            .campaign_repo
            .list_active(business_id)
            .await?
            .into_iter()
            .filter(|c| c.trigger.matches(event))
            .collect();
        if campaigns.is_empty() {
            return Ok(Vec::new());
        }

        let customer = self
            .customer_repo
            .find_by_id(customer_id)
            .await?
            .filter(|c| c.business_id == business_id)
            .ok_or(EngineError::CustomerNotFound(customer_id))?;

        let Some(phone) = customer.phone.clone() else {
            debug!(customer_id, "客户未留手机号，跳过活动");
            return Ok(Vec::new());
        };

        let business = self
            .business_repo
            .find_by_id(business_id)
            .await?
            .ok_or(EngineError::BusinessNotFound(business_id))?;
        if !business.is_active {
            debug!(business_id, "商户已停用，跳过活动");
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let event_id = event.event_id();
        let mut ctx = TemplateContext::for_customer(&customer, &business, now);
        // 印章数以事件为准，评估前可能已有新的集章提交
        if let CustomerEvent::StampsGranted { new_count, .. } = event {
            ctx = ctx
                .with("sellos", new_count)
                .with("faltan", (business.reward_threshold - new_count).max(0));
        }
        let mut messages = Vec::new();

        for campaign in campaigns {
            let first_time = self
                .campaign_repo
                .record_firing(campaign.id, customer_id, &event_id, now)
                .await?;
            if !first_time {
                debug!(campaign_id = campaign.id, event_id = %event_id, "活动已对该事件触发过");
                continue;
            }

            metrics::record_campaign_firing(campaign.trigger.trigger_type());
            info!(
                campaign_id = campaign.id,
                customer_id,
                event_id = %event_id,
                "活动已触发"
            );

            messages.push(ScheduledMessage {
                campaign_id: campaign.id,
                business_id,
                customer_id,
                event_id: event_id.clone(),
                recipient_phone: phone.clone(),
                rendered_body: render(&campaign.message_template, &ctx),
            });
        }

        Ok(messages)
    }

    /// 评估并投递到消息队列，返回新生成的消息数
    pub async fn evaluate_and_enqueue(
        &self,
        business_id: i64,
        customer_id: i64,
        event: &CustomerEvent,
    ) -> Result<usize> {
        let messages = self.evaluate(business_id, customer_id, event).await?;
        let count = messages.len();

        match &self.queue {
            Some(queue) => {
                for message in messages {
                    queue.enqueue(message).await;
                }
            }
            None if count > 0 => {
                warn!(count, "未配置消息队列，活动消息被丢弃");
            }
            None => {}
        }

        Ok(count)
    }

    /// 发布一组事件
    ///
    /// 按配置同步评估或在独立任务中评估，错误只记录日志
    pub async fn publish(
        self: &Arc<Self>,
        business_id: i64,
        customer_id: i64,
        events: Vec<CustomerEvent>,
    ) {
        if self.config.async_execution {
            let evaluator = Arc::clone(self);
            tokio::spawn(async move {
                evaluator
                    .process_events(business_id, customer_id, &events)
                    .await;
            });
        } else {
            self.process_events(business_id, customer_id, &events).await;
        }
    }

    async fn process_events(&self, business_id: i64, customer_id: i64, events: &[CustomerEvent]) {
        for event in events {
            if let Err(e) = self
                .evaluate_and_enqueue(business_id, customer_id, event)
                .await
            {
                warn!(
                    business_id,
                    customer_id,
                    event = event.name(),
                    error = %e,
                    "活动评估失败"
                );
            }
        }
    }
}
