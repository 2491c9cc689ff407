//! 扫码令牌管理接口

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use super::ApiResult;
use crate::api::auth::OwnerContext;
use crate::api::response::ApiResponse;
use crate::api::state::AppState;
use crate::models::ScannerToken;
use crate::service::dto::IssuedScannerToken;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct IssueScannerTokenRequest {
    #[validate(length(max = 64, message = "门店编号不超过64个字符"))]
    pub location_id: Option<String>,
    #[validate(length(max = 120, message = "门店名称不超过120个字符"))]
    pub location_name: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// 签发令牌，明文只返回这一次
///
/// POST /api/v1/scanner-tokens
pub async fn issue_token(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Json(req): Json<IssueScannerTokenRequest>,
) -> ApiResult<IssuedScannerToken> {
    req.validate()?;
    let issued = state
        .scanner_gate
        .issue(
            owner.business_id,
            req.location_id,
            req.location_name,
            req.expires_at,
        )
        .await?;
    Ok(Json(ApiResponse::success(issued)))
}

/// GET /api/v1/scanner-tokens
pub async fn list_tokens(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
) -> ApiResult<Vec<ScannerToken>> {
    let tokens = state.scanner_gate.list(owner.business_id).await?;
    Ok(Json(ApiResponse::success(tokens)))
}

/// POST /api/v1/scanner-tokens/{id}/revoke
pub async fn revoke_token(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Path(token_id): Path<i64>,
) -> ApiResult<ScannerToken> {
    let token = state.scanner_gate.revoke(owner.business_id, token_id).await?;
    Ok(Json(ApiResponse::success(token)))
}

/// POST /api/v1/scanner-tokens/{id}/reactivate
pub async fn reactivate_token(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Path(token_id): Path<i64>,
) -> ApiResult<ScannerToken> {
    let token = state
        .scanner_gate
        .reactivate(owner.business_id, token_id)
        .await?;
    Ok(Json(ApiResponse::success(token)))
}

/// DELETE /api/v1/scanner-tokens/{id}
pub async fn delete_token(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Path(token_id): Path<i64>,
) -> ApiResult<()> {
    state.scanner_gate.delete(owner.business_id, token_id).await?;
    Ok(Json(ApiResponse::success_empty()))
}
