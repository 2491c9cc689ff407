//! 营销活动实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::CampaignStatus;
use crate::campaign::CampaignTrigger;
use crate::error::{EngineError, Result};

/// 营销活动
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: i64,
    pub business_id: i64,
    pub name: String,
    pub trigger: CampaignTrigger,
    /// 消息模板，支持 `{nombre}` 等占位符
    pub message_template: String,
    pub status: CampaignStatus,
    pub sent_count: i64,
    pub failed_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 活动表行
///
/// 触发条件拆成 trigger_type + trigger_value 两列存储
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CampaignRow {
    pub id: i64,
    pub business_id: i64,
    pub name: String,
    pub trigger_type: String,
    pub trigger_value: Option<i64>,
    pub message_template: String,
    pub status: CampaignStatus,
    pub sent_count: i64,
    pub failed_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = EngineError;

    fn try_from(row: CampaignRow) -> Result<Self> {
        let trigger = CampaignTrigger::from_columns(&row.trigger_type, row.trigger_value)?;
        Ok(Self {
            id: row.id,
            business_id: row.business_id,
            name: row.name,
            trigger,
            message_template: row.message_template,
            status: row.status,
            sent_count: row.sent_count,
            failed_count: row.failed_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// 新活动（写入用）
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub business_id: i64,
    pub name: String,
    pub trigger: CampaignTrigger,
    pub message_template: String,
    pub status: CampaignStatus,
}
