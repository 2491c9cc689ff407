//! 活动消息投递
//!
//! 评估器生成的消息放入有界队列，后台工作任务逐条通过消息网关发送。
//! 投递结果只更新活动的 sent_count / failed_count，不涉及集章数据。

mod dispatcher;
mod gateway;

pub use dispatcher::{DispatcherConfig, MessageDispatcher, MessageQueue};
pub use gateway::{GatewayError, HttpGateway, LogGateway, MessagingGateway, OutboundMessage};

#[cfg(test)]
pub use gateway::MockMessagingGateway;
