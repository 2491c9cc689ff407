//! 数据库仓储层
//!
//! 封装 SQL 操作细节，仓储只负责持久化，不包含业务逻辑。
//! 事务内操作以 `*_in_tx(conn, ..)` 关联函数提供，事务边界由服务层决定。

mod business_repo;
mod campaign_repo;
mod customer_repo;
mod idempotency_repo;
mod ledger_repo;
mod reward_repo;
mod scanner_token_repo;
mod traits;

pub use business_repo::BusinessRepository;
pub use campaign_repo::CampaignRepository;
pub use customer_repo::CustomerRepository;
pub use idempotency_repo::{IdempotencyClaim, IdempotencyRepository};
pub use ledger_repo::StampLedgerRepository;
pub use reward_repo::RewardRepository;
pub use scanner_token_repo::ScannerTokenRepository;
pub use traits::*;
