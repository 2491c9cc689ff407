//! HTTP 错误响应
//!
//! 按错误分类映射状态码，系统错误只返回通用提示，细节写入日志

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::{EngineError, ErrorKind};

#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Invalid => StatusCode::UNAUTHORIZED,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self(EngineError::Validation(errors.to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if self.0.is_system_error() {
            tracing::error!(error = %self.0, code = self.0.error_code(), "请求处理失败");
            "服务内部错误，请稍后重试".to_string()
        } else {
            self.0.to_string()
        };

        let body = json!({
            "success": false,
            "code": self.0.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TokenRejectReason;

    #[test]
    fn test_status_mapping() {
        let status = |e: EngineError| ApiError(e).status_code();
        assert_eq!(status(EngineError::Validation("q".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(EngineError::CustomerNotFound(1)), StatusCode::NOT_FOUND);
        assert_eq!(status(EngineError::AlreadyRedeemed(1)), StatusCode::CONFLICT);
        assert_eq!(
            status(EngineError::ScannerTokenRejected(TokenRejectReason::Expired)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(EngineError::Unavailable("pool".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(EngineError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
