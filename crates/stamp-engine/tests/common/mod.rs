//! 集成测试公共设施
//!
//! 每个测试使用临时目录中的独立 SQLite 文件，迁移后组装完整的 AppState。

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use loyalty_shared::config::{AppConfig, DatabaseConfig};
use loyalty_shared::database::Database;
use stamp_engine::MIGRATOR;
use stamp_engine::api::AppState;
use stamp_engine::models::{Business, Customer};
use stamp_engine::notification::{GatewayError, MessageQueue, MessagingGateway, OutboundMessage};
use tempfile::TempDir;

pub struct TestContext {
    /// 临时目录随上下文一起释放
    _dir: TempDir,
    pub db: Database,
    pub config: AppConfig,
    pub state: AppState,
}

impl TestContext {
    pub fn pool(&self) -> &sqlx::SqlitePool {
        self.db.pool()
    }
}

pub fn test_config(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.database = DatabaseConfig {
        url: format!("sqlite://{}", dir.path().join("loyalty.db").display()),
        max_connections: 8,
        ..DatabaseConfig::default()
    };
    config.engine.max_retries = 10;
    config.engine.retry_initial_delay_ms = 5;
    config.engine.retry_max_delay_ms = 50;
    config.auth.jwt_secret = "test-secret".to_string();
    config
}

pub async fn setup() -> TestContext {
    setup_with_queue(None).await
}

pub async fn setup_with_queue(queue: Option<MessageQueue>) -> TestContext {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    let db = connect(&config).await;
    let state = AppState::new(db.clone(), &config, queue);
    TestContext {
        _dir: dir,
        db,
        config,
        state,
    }
}

pub async fn connect(config: &AppConfig) -> Database {
    loyalty_shared::observability::tracing::init_for_tests();
    let db = Database::connect(&config.database).await.unwrap();
    MIGRATOR.run(db.pool()).await.unwrap();
    db
}

pub async fn seed_business(state: &AppState, business_id: i64, threshold: i64) -> Business {
    state
        .business_service
        .upsert_business(business_id, "Café Luna", threshold, "un café gratis")
        .await
        .unwrap()
}

pub async fn enroll(state: &AppState, business_id: i64, phone: Option<&str>) -> Customer {
    state
        .business_service
        .enroll(business_id, Some("Ana".to_string()), phone.map(String::from))
        .await
        .unwrap()
}

/// 记录所有发送内容的网关
#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl RecordingGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    async fn send(&self, message: &OutboundMessage) -> Result<(), GatewayError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}
