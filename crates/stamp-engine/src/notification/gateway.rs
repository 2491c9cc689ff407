//! 消息网关
//!
//! 通过 `MessagingGateway` trait 抽象外部短信/WhatsApp 网关：
//! - `HttpGateway`：JSON POST 到配置的网关地址
//! - `LogGateway`：只记录日志，未配置网关地址时使用

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

/// 发往网关的消息体
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    pub recipient_phone: String,
    pub rendered_body: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// 收件人无效，重试没有意义
    #[error("收件人无效: {0}")]
    InvalidRecipient(String),

    #[error("网关限流")]
    RateLimited,

    #[error("网关暂时不可用: {0}")]
    Transient(String),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidRecipient(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRecipient(_) => "invalid_recipient",
            Self::RateLimited => "rate_limited",
            Self::Transient(_) => "transient",
        }
    }
}

/// 消息网关
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), GatewayError>;
}

// ---------------------------------------------------------------------------
// HTTP 网关
// ---------------------------------------------------------------------------

pub struct HttpGateway {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpGateway {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    fn classify_status(status: StatusCode, body: String) -> GatewayError {
        match status {
            StatusCode::TOO_MANY_REQUESTS => GatewayError::RateLimited,
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
                GatewayError::InvalidRecipient(format!("HTTP {} - {}", status, body))
            }
            _ => GatewayError::Transient(format!("HTTP {} - {}", status, body)),
        }
    }
}

#[async_trait]
impl MessagingGateway for HttpGateway {
    async fn send(&self, message: &OutboundMessage) -> Result<(), GatewayError> {
        let mut request = self.client.post(&self.endpoint).json(message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(endpoint = %self.endpoint, "网关已接收消息");
            return Ok(());
        }

        let body: String = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(200)
            .collect();
        warn!(endpoint = %self.endpoint, status = %status, "网关返回错误");
        Err(Self::classify_status(status, body))
    }
}

// ---------------------------------------------------------------------------
// 日志网关
// ---------------------------------------------------------------------------

/// 只记录日志的网关
pub struct LogGateway;

#[async_trait]
impl MessagingGateway for LogGateway {
    async fn send(&self, message: &OutboundMessage) -> Result<(), GatewayError> {
        info!(
            recipient = %message.recipient_phone,
            body = %message.rendered_body,
            "模拟发送活动消息"
        );
        Ok(())
    }
}
