//! 业务服务层
//!
//! - `idempotency`: 幂等守卫，按调用方提供的键对写请求去重
//! - `stamp_service`: 集章与奖励解锁（结转）
//! - `redemption_service`: 奖励兑换
//! - `scanner_gate`: 扫码令牌签发与校验
//! - `business_service`: 商户设置与客户入会
//! - `campaign_service`: 营销活动管理

pub mod dto;
mod business_service;
mod campaign_service;
mod idempotency;
mod redemption_service;
mod scanner_gate;
mod stamp_service;

pub use business_service::{BusinessService, CustomerDetail};
pub use campaign_service::CampaignService;
pub use idempotency::{Applied, IdempotencyGuard, MAX_IDEMPOTENCY_KEY_LEN, validate_idempotency_key};
pub use redemption_service::RedemptionService;
pub use scanner_gate::{SCANNER_TOKEN_PREFIX, ScannerGate, hash_secret};
pub use stamp_service::{MAX_QUANTITY, MIN_QUANTITY, StampService, apply_carry_over};
