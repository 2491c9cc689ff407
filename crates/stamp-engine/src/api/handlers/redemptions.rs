//! 兑换接口

use axum::{Extension, Json, extract::State};
use serde::Deserialize;

use super::ApiResult;
use crate::api::auth::OwnerContext;
use crate::api::response::ApiResponse;
use crate::api::state::AppState;
use crate::error::EngineError;
use crate::models::{Actor, RedemptionRecord};

/// 兑换请求
///
/// 指定 unlockEventId 时兑换该奖励，否则兑换客户最早的未兑换奖励
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemRequest {
    pub customer_id: Option<i64>,
    pub unlock_event_id: Option<i64>,
}

/// POST /api/v1/redemptions
pub async fn redeem(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Json(req): Json<RedeemRequest>,
) -> ApiResult<RedemptionRecord> {
    redeem_for(&state, owner.business_id, &owner.actor(), req).await
}

pub(crate) async fn redeem_for(
    state: &AppState,
    business_id: i64,
    actor: &Actor,
    req: RedeemRequest,
) -> ApiResult<RedemptionRecord> {
    let record = match (req.unlock_event_id, req.customer_id) {
        (Some(unlock_event_id), _) => {
            state
                .redemption_service
                .redeem_unlock(business_id, unlock_event_id, actor)
                .await?
        }
        (None, Some(customer_id)) => {
            state
                .redemption_service
                .redeem(business_id, customer_id, actor)
                .await?
        }
        (None, None) => {
            return Err(EngineError::Validation(
                "customerId 与 unlockEventId 至少提供一个".to_string(),
            )
            .into());
        }
    };

    Ok(Json(ApiResponse::success_with_message(record, "兑换成功")))
}
