//! HTTP 请求处理器
//!
//! 商户接口与扫码接口共用集章、兑换的请求体，只是操作人不同

pub mod business;
pub mod campaigns;
pub mod customers;
pub mod health;
pub mod redemptions;
pub mod scanner;
pub mod scanner_tokens;
pub mod stamps;

use axum::Json;

use super::error::ApiError;
use super::response::ApiResponse;

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;
