//! HTTP 接口层

pub mod auth;
pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod state;

pub use auth::{JwtConfig, JwtManager, OwnerClaims, OwnerContext, SCANNER_TOKEN_HEADER};
pub use error::ApiError;
pub use response::ApiResponse;
pub use routes::build_router;
pub use state::AppState;
