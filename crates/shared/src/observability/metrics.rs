//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出，并在独立端口暴露 `/metrics`
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!("stamp_grants_total", "Total number of stamp grant calls");
    metrics::describe_histogram!(
        "stamp_grant_duration_seconds",
        "Stamp grant duration in seconds"
    );
    metrics::describe_counter!("reward_unlocks_total", "Total number of reward unlocks");

    metrics::describe_counter!("redemptions_total", "Total number of reward redemptions");
    metrics::describe_counter!(
        "scanner_validations_total",
        "Total number of scanner token validations"
    );
    metrics::describe_counter!(
        "campaign_firings_total",
        "Total number of campaign firings"
    );
    metrics::describe_counter!(
        "message_dispatch_total",
        "Total number of outbound message deliveries"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录集章
///
/// status 取值 fresh / replayed / failed
#[inline]
pub fn record_stamp_grant(status: &str, unlocked: u32, duration_secs: f64) {
    metrics::counter!("stamp_grants_total", "status" => status.to_string()).increment(1);
    metrics::histogram!("stamp_grant_duration_seconds").record(duration_secs);
    if unlocked > 0 {
        metrics::counter!("reward_unlocks_total").increment(unlocked as u64);
    }
}

/// 记录兑换
#[inline]
pub fn record_redemption(status: &str) {
    metrics::counter!("redemptions_total", "status" => status.to_string()).increment(1);
}

/// 记录扫码令牌校验结果
#[inline]
pub fn record_scanner_validation(outcome: &str) {
    metrics::counter!(
        "scanner_validations_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// 记录活动触发
#[inline]
pub fn record_campaign_firing(trigger: &str) {
    metrics::counter!("campaign_firings_total", "trigger" => trigger.to_string()).increment(1);
}

/// 记录消息投递
#[inline]
pub fn record_message_dispatch(status: &str) {
    metrics::counter!("message_dispatch_total", "status" => status.to_string()).increment(1);
}
