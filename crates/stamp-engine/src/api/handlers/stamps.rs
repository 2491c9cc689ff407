//! 集章接口

use axum::{Extension, Json, extract::State};
use serde::Deserialize;
use validator::Validate;

use super::ApiResult;
use crate::api::auth::OwnerContext;
use crate::api::response::ApiResponse;
use crate::api::state::AppState;
use crate::models::Actor;
use crate::service::dto::GrantOutcome;

/// 集章请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GrantStampsRequest {
    pub customer_id: i64,
    #[validate(range(min = 1, max = 10, message = "集章数量必须在1-10之间"))]
    pub quantity: i64,
    #[validate(length(min = 1, max = 200, message = "幂等键长度必须在1-200个字符之间"))]
    pub idempotency_key: String,
}

/// 商户集章
///
/// POST /api/v1/stamps
pub async fn grant_stamps(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Json(req): Json<GrantStampsRequest>,
) -> ApiResult<GrantOutcome> {
    grant(&state, owner.business_id, &owner.actor(), req).await
}

pub(crate) async fn grant(
    state: &AppState,
    business_id: i64,
    actor: &Actor,
    req: GrantStampsRequest,
) -> ApiResult<GrantOutcome> {
    req.validate()?;

    let outcome = state
        .stamp_service
        .grant_stamps(
            business_id,
            req.customer_id,
            req.quantity,
            &req.idempotency_key,
            actor,
        )
        .await?;

    let message = if outcome.replayed {
        "重复请求，返回首次结果"
    } else {
        "集章成功"
    };
    Ok(Json(ApiResponse::success_with_message(outcome, message)))
}
