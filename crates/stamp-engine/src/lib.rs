//! 集章与奖励解锁引擎
//!
//! 商户为客户集章，达到门槛后解锁奖励，并按客户事件触发营销消息。
//!
//! ## 核心功能
//!
//! - **幂等集章**：同一幂等键只生效一次，重试返回首次结果
//! - **结转解锁**：超过门槛的部分计入下一张卡，一次集章可解锁多个奖励
//! - **扫码令牌**：门店终端使用可吊销、可过期的令牌，校验失败统一返回令牌无效
//! - **奖励兑换**：每个解锁事件只能兑换一次
//! - **营销活动**：入会、集章、解锁、沉睡等事件触发消息，按 (活动, 客户, 事件) 去重
//!
//! ## 模块结构
//!
//! - `models`: 领域模型
//! - `error`: 错误类型
//! - `repository`: SQLite 仓储层
//! - `service`: 业务服务层
//! - `campaign`: 活动触发评估与沉睡扫描
//! - `notification`: 活动消息投递
//! - `api`: HTTP 接口

pub mod api;
pub mod campaign;
pub mod error;
pub mod models;
pub mod notification;
pub mod repository;
pub mod service;

pub use error::{EngineError, ErrorKind, Result};
pub use service::dto::GrantOutcome;
pub use service::{RedemptionService, ScannerGate, StampService};

/// 内嵌的数据库迁移
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
