//! 营销活动接口

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::Utc;
use serde::Deserialize;
use validator::Validate;

use super::ApiResult;
use crate::api::auth::OwnerContext;
use crate::api::response::ApiResponse;
use crate::api::state::AppState;
use crate::campaign::CampaignTrigger;
use crate::models::{Campaign, CampaignStatus};
use crate::service::dto::InactivityScanReport;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignRequest {
    #[validate(length(min = 1, max = 120, message = "活动名称长度必须在1-120个字符之间"))]
    pub name: String,
    pub trigger: CampaignTrigger,
    #[validate(length(min = 1, max = 1000, message = "消息模板不能为空且不超过1000字符"))]
    pub message_template: String,
    pub status: Option<CampaignStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCampaignStatusRequest {
    pub status: CampaignStatus,
}

/// POST /api/v1/campaigns
pub async fn create_campaign(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Json(req): Json<CreateCampaignRequest>,
) -> ApiResult<Campaign> {
    req.validate()?;
    let campaign = state
        .campaign_service
        .create_campaign(
            owner.business_id,
            &req.name,
            req.trigger,
            &req.message_template,
            req.status,
        )
        .await?;
    Ok(Json(ApiResponse::success(campaign)))
}

/// GET /api/v1/campaigns
pub async fn list_campaigns(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
) -> ApiResult<Vec<Campaign>> {
    let campaigns = state
        .campaign_service
        .list_campaigns(owner.business_id)
        .await?;
    Ok(Json(ApiResponse::success(campaigns)))
}

/// PATCH /api/v1/campaigns/{id}/status
pub async fn update_campaign_status(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Path(campaign_id): Path<i64>,
    Json(req): Json<UpdateCampaignStatusRequest>,
) -> ApiResult<Campaign> {
    let campaign = state
        .campaign_service
        .update_campaign_status(owner.business_id, campaign_id, req.status)
        .await?;
    Ok(Json(ApiResponse::success(campaign)))
}

/// 立即对本商户执行一次沉睡扫描
///
/// POST /api/v1/inactivity-scan
pub async fn run_inactivity_scan(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
) -> ApiResult<InactivityScanReport> {
    let report = state
        .inactivity_scanner
        .scan_business(owner.business_id, Utc::now())
        .await?;
    Ok(Json(ApiResponse::success(report)))
}
