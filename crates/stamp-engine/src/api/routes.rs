//! 路由配置
//!
//! - `/api/v1`：商户接口，Bearer JWT 认证
//! - `/api/scanner`：扫码终端接口，`X-Scanner-Token` 认证
//! - `/health`：健康检查，无需认证

use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{delete, get, patch, post},
};
use loyalty_shared::observability::middleware as obs_middleware;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::auth::{owner_auth, scanner_auth};
use super::handlers::{
    business, campaigns, customers, health, redemptions, scanner, scanner_tokens, stamps,
};
use super::state::AppState;

/// 商户接口
fn owner_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/stamps", post(stamps::grant_stamps))
        .route("/redemptions", post(redemptions::redeem))
        .route(
            "/business",
            get(business::get_business).put(business::upsert_business),
        )
        .route("/customers", post(customers::enroll_customer))
        .route("/customers/{id}", get(customers::get_customer))
        .route("/customers/{id}/rewards", get(customers::list_rewards))
        .route("/customers/{id}/redemptions", get(customers::list_redemptions))
        .route(
            "/scanner-tokens",
            post(scanner_tokens::issue_token).get(scanner_tokens::list_tokens),
        )
        .route(
            "/scanner-tokens/{id}/revoke",
            post(scanner_tokens::revoke_token),
        )
        .route(
            "/scanner-tokens/{id}/reactivate",
            post(scanner_tokens::reactivate_token),
        )
        .route("/scanner-tokens/{id}", delete(scanner_tokens::delete_token))
        .route(
            "/campaigns",
            post(campaigns::create_campaign).get(campaigns::list_campaigns),
        )
        .route(
            "/campaigns/{id}/status",
            patch(campaigns::update_campaign_status),
        )
        .route("/inactivity-scan", post(campaigns::run_inactivity_scan))
        .route_layer(middleware::from_fn_with_state(state.clone(), owner_auth))
}

/// 扫码终端接口
fn scanner_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/session", get(scanner::session))
        .route("/stamps", post(scanner::grant_stamps))
        .route("/redemptions", post(scanner::redeem))
        .route_layer(middleware::from_fn_with_state(state.clone(), scanner_auth))
}

/// 构建完整路由
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/v1", owner_routes(&state))
        .nest("/api/scanner", scanner_routes(&state))
        .route("/health", get(health::health_check))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}
