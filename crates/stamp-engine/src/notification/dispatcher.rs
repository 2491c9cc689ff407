//! 消息投递工作任务
//!
//! `MessageQueue` 是发送端，入队永不阻塞：队列已满或已关闭时直接计为发送失败。
//! `MessageDispatcher` 在后台逐条消费：
//! - 收件人无效不重试
//! - 限流和瞬时故障按指数退避重试，总次数不超过 max_attempts
//! - 成功累加活动 sent_count，最终失败累加 failed_count

use std::sync::Arc;

use loyalty_shared::config::MessagingConfig;
use loyalty_shared::observability::metrics;
use loyalty_shared::retry::{RetryPolicy, retry_with_policy};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::gateway::{GatewayError, MessagingGateway, OutboundMessage};
use crate::campaign::ScheduledMessage;
use crate::repository::CampaignStatsRepository;

/// 投递配置
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// 单条消息的最大发送次数（含首次）
    pub max_attempts: u32,
    pub retry: RetryPolicy,
    pub queue_capacity: usize,
}

impl From<&MessagingConfig> for DispatcherConfig {
    fn from(config: &MessagingConfig) -> Self {
        let max_attempts = config.max_attempts.max(1);
        Self {
            max_attempts,
            retry: RetryPolicy::from_millis(
                max_attempts - 1,
                config.initial_backoff_ms,
                config.max_backoff_ms,
            ),
            queue_capacity: config.queue_capacity.max(1),
        }
    }
}

/// 消息队列发送端
#[derive(Clone)]
pub struct MessageQueue {
    sender: mpsc::Sender<ScheduledMessage>,
    stats: Arc<dyn CampaignStatsRepository>,
}

impl MessageQueue {
    /// 入队，不等待队列空间
    pub async fn enqueue(&self, message: ScheduledMessage) {
        let message = match self.sender.try_send(message) {
            Ok(()) => return,
            Err(mpsc::error::TrySendError::Full(m)) => {
                warn!(campaign_id = m.campaign_id, "消息队列已满，消息丢弃");
                m
            }
            Err(mpsc::error::TrySendError::Closed(m)) => {
                warn!(campaign_id = m.campaign_id, "消息队列已关闭，消息丢弃");
                m
            }
        };

        metrics::record_message_dispatch("dropped");
        if let Err(e) = self.stats.increment_failed(message.campaign_id).await {
            error!(campaign_id = message.campaign_id, error = %e, "更新活动失败计数失败");
        }
    }
}

pub struct MessageDispatcher {
    gateway: Arc<dyn MessagingGateway>,
    stats: Arc<dyn CampaignStatsRepository>,
    config: DispatcherConfig,
}

impl MessageDispatcher {
    pub fn new(
        gateway: Arc<dyn MessagingGateway>,
        stats: Arc<dyn CampaignStatsRepository>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            gateway,
            stats,
            config,
        }
    }

    /// 投递一条消息，返回是否最终发送成功
    pub async fn deliver(&self, message: &ScheduledMessage) -> bool {
        let outbound = OutboundMessage {
            recipient_phone: message.recipient_phone.clone(),
            rendered_body: message.rendered_body.clone(),
        };

        let result = retry_with_policy(
            &self.config.retry,
            "deliver_message",
            GatewayError::is_retryable,
            || self.gateway.send(&outbound),
        )
        .await;

        let update = match &result {
            Ok(()) => {
                metrics::record_message_dispatch("sent");
                info!(
                    campaign_id = message.campaign_id,
                    customer_id = message.customer_id,
                    event_id = %message.event_id,
                    "活动消息已发送"
                );
                self.stats.increment_sent(message.campaign_id).await
            }
            Err(e) => {
                metrics::record_message_dispatch(e.as_str());
                warn!(
                    campaign_id = message.campaign_id,
                    customer_id = message.customer_id,
                    error = %e,
                    "活动消息发送失败"
                );
                self.stats.increment_failed(message.campaign_id).await
            }
        };

        if let Err(e) = update {
            error!(campaign_id = message.campaign_id, error = %e, "更新活动发送计数失败");
        }

        result.is_ok()
    }

    /// 启动后台工作任务
    ///
    /// 所有 `MessageQueue` 被丢弃后，任务处理完剩余消息退出
    pub fn start(self) -> (MessageQueue, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel(self.config.queue_capacity);
        let queue = MessageQueue {
            sender,
            stats: Arc::clone(&self.stats),
        };

        let handle = tokio::spawn(async move {
            info!("消息投递任务已启动");
            while let Some(message) = receiver.recv().await {
                self.deliver(&message).await;
            }
            info!("消息投递任务已退出");
        });

        (queue, handle)
    }
}
