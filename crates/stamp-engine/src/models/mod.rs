//! 领域模型定义
//!
//! 所有实体都支持数据库（sqlx）和 JSON（serde）序列化

mod business;
mod campaign;
mod enums;
mod ledger;
mod scanner;

pub use business::*;
pub use campaign::*;
pub use enums::*;
pub use ledger::*;
pub use scanner::*;
