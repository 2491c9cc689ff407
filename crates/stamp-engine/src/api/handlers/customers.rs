//! 客户接口

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Deserialize;
use validator::Validate;

use super::ApiResult;
use crate::api::auth::OwnerContext;
use crate::api::response::ApiResponse;
use crate::api::state::AppState;
use crate::models::{Customer, RedemptionRecord};
use crate::service::CustomerDetail;
use crate::service::dto::CustomerRewards;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EnrollCustomerRequest {
    #[validate(length(max = 120, message = "客户姓名不超过120个字符"))]
    pub name: Option<String>,
    #[validate(length(max = 32, message = "手机号不超过32个字符"))]
    pub phone: Option<String>,
}

/// 客户入会
///
/// POST /api/v1/customers
pub async fn enroll_customer(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Json(req): Json<EnrollCustomerRequest>,
) -> ApiResult<Customer> {
    req.validate()?;
    let customer = state
        .business_service
        .enroll(owner.business_id, req.name, req.phone)
        .await?;
    Ok(Json(ApiResponse::success(customer)))
}

/// GET /api/v1/customers/{id}
pub async fn get_customer(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Path(customer_id): Path<i64>,
) -> ApiResult<CustomerDetail> {
    let detail = state
        .business_service
        .get_customer(owner.business_id, customer_id)
        .await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// GET /api/v1/customers/{id}/rewards
pub async fn list_rewards(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Path(customer_id): Path<i64>,
) -> ApiResult<CustomerRewards> {
    let rewards = state
        .redemption_service
        .list_rewards(owner.business_id, customer_id)
        .await?;
    Ok(Json(ApiResponse::success(rewards)))
}

/// GET /api/v1/customers/{id}/redemptions
pub async fn list_redemptions(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Path(customer_id): Path<i64>,
) -> ApiResult<Vec<RedemptionRecord>> {
    let records = state
        .redemption_service
        .list_redemptions(owner.business_id, customer_id)
        .await?;
    Ok(Json(ApiResponse::success(records)))
}
