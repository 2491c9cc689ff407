//! 集章引擎服务
//!
//! 提供商户接口、扫码终端接口，后台运行活动消息投递和沉睡扫描。

use std::sync::Arc;
use std::time::Duration;

use loyalty_shared::{config::AppConfig, database::Database, observability};
use stamp_engine::MIGRATOR;
use stamp_engine::api::{AppState, build_router};
use stamp_engine::notification::{
    DispatcherConfig, HttpGateway, LogGateway, MessageDispatcher, MessagingGateway,
};
use stamp_engine::repository::CampaignRepository;
use tokio::net::TcpListener;
use tracing::{info, warn};

const SERVICE_NAME: &str = "stamp-engine";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load(SERVICE_NAME)?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting {} on {}", SERVICE_NAME, config.server_addr());

    if config.is_production() && config.auth.jwt_secret == AppConfig::default().auth.jwt_secret {
        anyhow::bail!("生产环境必须通过 LOYALTY_AUTH__JWT_SECRET 配置 JWT 密钥");
    }

    let db = Database::connect(&config.database).await?;
    MIGRATOR.run(db.pool()).await?;
    info!("数据库迁移完成");

    // 未配置网关地址时只记录日志
    let gateway: Arc<dyn MessagingGateway> = match &config.messaging.gateway_url {
        Some(url) => {
            info!(gateway_url = %url, "使用 HTTP 消息网关");
            Arc::new(HttpGateway::new(
                url.clone(),
                config.messaging.api_key.clone(),
                config.messaging.request_timeout(),
            )?)
        }
        None => {
            warn!("未配置消息网关，活动消息只记录日志");
            Arc::new(LogGateway)
        }
    };

    let stats = Arc::new(CampaignRepository::new(db.pool().clone()));
    let dispatcher = MessageDispatcher::new(
        gateway,
        stats,
        DispatcherConfig::from(&config.messaging),
    );
    let (queue, dispatcher_handle) = dispatcher.start();

    let state = AppState::new(db.clone(), &config, Some(queue));

    let scan_handle = match config.engine.inactivity_scan_interval() {
        Some(interval) => {
            info!(interval_secs = interval.as_secs(), "沉睡扫描任务已启动");
            Some(Arc::clone(&state.inactivity_scanner).spawn_periodic(interval))
        }
        None => {
            info!("沉睡扫描周期为 0，不启动扫描任务");
            None
        }
    };

    let app = build_router(
        state,
        Duration::from_secs(config.server.request_timeout_seconds),
    );

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 路由释放后队列发送端随之释放，投递任务处理完剩余消息后退出
    if let Some(handle) = scan_handle {
        handle.abort();
    }
    if tokio::time::timeout(Duration::from_secs(10), dispatcher_handle)
        .await
        .is_err()
    {
        warn!("消息投递任务未在超时内退出");
    }
    db.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// 监听 Ctrl+C 和 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
