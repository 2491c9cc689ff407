//! 营销活动
//!
//! - `event`: 客户状态变化事件及其去重 ID
//! - `trigger`: 活动触发条件
//! - `template`: 消息模板渲染
//! - `evaluator`: 事件发生后评估命中的活动，记录触发并生成待发送消息
//! - `inactivity`: 沉睡客户扫描

mod evaluator;
mod event;
mod inactivity;
mod template;
mod trigger;

pub use evaluator::{CampaignEvaluator, CampaignEvaluatorConfig, ScheduledMessage};
pub use event::CustomerEvent;
pub use inactivity::InactivityScanner;
pub use template::{TEMPLATE_VARIABLES, TemplateContext, render};
pub use trigger::CampaignTrigger;
