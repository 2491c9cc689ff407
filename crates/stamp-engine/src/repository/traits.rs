//! 仓储 Trait 定义
//!
//! 消息投递只依赖计数接口，便于 mock 测试

use async_trait::async_trait;

use crate::error::Result;

/// 活动投递计数接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CampaignStatsRepository: Send + Sync {
    async fn increment_sent(&self, campaign_id: i64) -> Result<()>;
    async fn increment_failed(&self, campaign_id: i64) -> Result<()>;
}
