//! 商户设置接口

use axum::{Extension, Json, extract::State};
use serde::Deserialize;
use validator::Validate;

use super::ApiResult;
use crate::api::auth::OwnerContext;
use crate::api::response::ApiResponse;
use crate::api::state::AppState;
use crate::models::Business;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpsertBusinessRequest {
    #[validate(length(min = 1, max = 120, message = "商户名称长度必须在1-120个字符之间"))]
    pub name: String,
    #[validate(range(min = 1, message = "集章门槛必须大于等于1"))]
    pub reward_threshold: i64,
    #[validate(length(min = 1, max = 500, message = "奖励描述不能为空且不超过500字符"))]
    pub reward_description: String,
    pub is_active: Option<bool>,
}

/// GET /api/v1/business
pub async fn get_business(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
) -> ApiResult<Business> {
    let business = state.business_service.get_business(owner.business_id).await?;
    Ok(Json(ApiResponse::success(business)))
}

/// PUT /api/v1/business
///
/// 门槛修改后已有进度不换算
pub async fn upsert_business(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Json(req): Json<UpsertBusinessRequest>,
) -> ApiResult<Business> {
    req.validate()?;

    let mut business = state
        .business_service
        .upsert_business(
            owner.business_id,
            &req.name,
            req.reward_threshold,
            &req.reward_description,
        )
        .await?;

    if let Some(is_active) = req.is_active.filter(|active| *active != business.is_active) {
        business = state
            .business_service
            .set_business_active(owner.business_id, is_active)
            .await?;
    }

    Ok(Json(ApiResponse::success(business)))
}
