//! 身份认证
//!
//! - 商户接口：`Authorization: Bearer <JWT>`，HS256 签名，载荷含 business_id
//! - 扫码接口：`X-Scanner-Token` 请求头，由扫码令牌守卫校验
//!
//! 认证通过后分别把 `OwnerContext` / `ScannerAccess` 注入请求扩展。

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use loyalty_shared::config::AuthConfig;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::state::AppState;
use crate::error::{EngineError, Result};
use crate::models::Actor;

pub const SCANNER_TOKEN_HEADER: &str = "x-scanner-token";

/// JWT 配置
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    /// 本服务签发的 Token 有效期（仅测试和运维工具使用）
    pub expires_in_secs: i64,
}

impl From<&AuthConfig> for JwtConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            issuer: config.jwt_issuer.clone(),
            expires_in_secs: 3600,
        }
    }
}

/// 商户 Token 载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerClaims {
    /// 商户用户 ID
    pub sub: String,
    pub business_id: i64,
    pub exp: i64,
    pub iss: String,
}

/// 已认证的商户身份
#[derive(Debug, Clone)]
pub struct OwnerContext {
    pub user_id: String,
    pub business_id: i64,
}

impl OwnerContext {
    pub fn actor(&self) -> Actor {
        Actor::Owner(self.user_id.clone())
    }
}

#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// 生成 Token
    ///
    /// 正式环境由外部身份服务签发，这里用于测试和本地调试
    pub fn generate_token(&self, user_id: &str, business_id: i64) -> Result<String> {
        let claims = OwnerClaims {
            sub: user_id.to_string(),
            business_id,
            exp: (Utc::now() + Duration::seconds(self.config.expires_in_secs)).timestamp(),
            iss: self.config.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| EngineError::Internal(format!("JWT 生成失败: {}", e)))
    }

    /// 验证并解析 Token
    pub fn verify_token(&self, token: &str) -> Result<OwnerClaims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.issuer]);

        let data = decode::<OwnerClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    EngineError::Unauthorized("Token 已过期".to_string())
                }
                _ => EngineError::Unauthorized("无效的 Token".to_string()),
            }
        })?;

        Ok(data.claims)
    }
}

/// 商户认证中间件
pub async fn owner_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let Some(token) = token else {
        return ApiError::from(EngineError::Unauthorized("缺少认证 Token".to_string()))
            .into_response();
    };

    match state.jwt.verify_token(token) {
        Ok(claims) => {
            request.extensions_mut().insert(OwnerContext {
                user_id: claims.sub,
                business_id: claims.business_id,
            });
            next.run(request).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// 扫码终端认证中间件
///
/// 令牌缺失、未知、吊销、过期统一返回 401
pub async fn scanner_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let secret = request
        .headers()
        .get(SCANNER_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .trim()
        .to_string();

    match state.scanner_gate.validate(&secret).await {
        Ok(access) => {
            request.extensions_mut().insert(access);
            next.run(request).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}
