//! 扫码终端接口
//!
//! 认证由 `scanner_auth` 中间件完成，商户与操作人都来自令牌

use axum::{Extension, Json, extract::State};
use serde::Serialize;

use super::ApiResult;
use super::redemptions::{RedeemRequest, redeem_for};
use super::stamps::{GrantStampsRequest, grant};
use crate::api::response::ApiResponse;
use crate::api::state::AppState;
use crate::models::{Actor, RedemptionRecord, ScannerAccess};
use crate::service::dto::GrantOutcome;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerSession {
    pub business_id: i64,
    pub location_name: Option<String>,
}

/// GET /api/scanner/session
pub async fn session(Extension(access): Extension<ScannerAccess>) -> ApiResult<ScannerSession> {
    Ok(Json(ApiResponse::success(ScannerSession {
        business_id: access.business_id,
        location_name: access.location_name,
    })))
}

/// POST /api/scanner/stamps
pub async fn grant_stamps(
    State(state): State<AppState>,
    Extension(access): Extension<ScannerAccess>,
    Json(req): Json<GrantStampsRequest>,
) -> ApiResult<GrantOutcome> {
    grant(&state, access.business_id, &Actor::Scanner(access.token_id), req).await
}

/// POST /api/scanner/redemptions
pub async fn redeem(
    State(state): State<AppState>,
    Extension(access): Extension<ScannerAccess>,
    Json(req): Json<RedeemRequest>,
) -> ApiResult<RedemptionRecord> {
    redeem_for(&state, access.business_id, &Actor::Scanner(access.token_id), req).await
}
