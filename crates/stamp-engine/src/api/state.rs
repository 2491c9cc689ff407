//! 应用状态
//!
//! 路由共享的服务实例，通过 Arc 在 handler 间共享

use std::sync::Arc;

use loyalty_shared::config::AppConfig;
use loyalty_shared::database::Database;
use loyalty_shared::retry::RetryPolicy;

use super::auth::{JwtConfig, JwtManager};
use crate::campaign::{CampaignEvaluator, CampaignEvaluatorConfig, InactivityScanner};
use crate::notification::MessageQueue;
use crate::repository::{
    BusinessRepository, CampaignRepository, CustomerRepository, ScannerTokenRepository,
    StampLedgerRepository,
};
use crate::service::{
    BusinessService, CampaignService, RedemptionService, ScannerGate, StampService,
};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt: Arc<JwtManager>,
    pub stamp_service: Arc<StampService>,
    pub redemption_service: Arc<RedemptionService>,
    pub business_service: Arc<BusinessService>,
    pub campaign_service: Arc<CampaignService>,
    pub scanner_gate: Arc<ScannerGate>,
    pub inactivity_scanner: Arc<InactivityScanner>,
}

impl AppState {
    /// 按配置组装所有服务
    ///
    /// queue 为空时活动消息只记录告警不投递
    pub fn new(db: Database, config: &AppConfig, queue: Option<MessageQueue>) -> Self {
        let pool = db.pool().clone();
        let engine = &config.engine;
        let retry_policy = RetryPolicy::from_millis(
            engine.max_retries,
            engine.retry_initial_delay_ms,
            engine.retry_max_delay_ms,
        );

        let business_repo = Arc::new(BusinessRepository::new(pool.clone()));
        let customer_repo = Arc::new(CustomerRepository::new(pool.clone()));
        let ledger_repo = Arc::new(StampLedgerRepository::new(pool.clone()));
        let campaign_repo = Arc::new(CampaignRepository::new(pool.clone()));
        let token_repo = Arc::new(ScannerTokenRepository::new(pool.clone()));

        let mut evaluator = CampaignEvaluator::new(
            pool.clone(),
            CampaignEvaluatorConfig {
                async_execution: engine.async_campaign_evaluation,
            },
        );
        if let Some(queue) = queue {
            evaluator = evaluator.with_queue(queue);
        }
        let evaluator = Arc::new(evaluator);

        let stamp_service = StampService::new(pool.clone(), retry_policy.clone())
            .with_campaign_evaluator(Arc::clone(&evaluator));
        let business_service = BusinessService::new(
            Arc::clone(&business_repo),
            Arc::clone(&customer_repo),
            ledger_repo,
        )
        .with_campaign_evaluator(Arc::clone(&evaluator));

        Self {
            jwt: Arc::new(JwtManager::new(JwtConfig::from(&config.auth))),
            stamp_service: Arc::new(stamp_service),
            redemption_service: Arc::new(RedemptionService::new(pool, retry_policy)),
            business_service: Arc::new(business_service),
            campaign_service: Arc::new(CampaignService::new(
                campaign_repo,
                Arc::clone(&business_repo),
            )),
            scanner_gate: Arc::new(ScannerGate::new(token_repo, business_repo)),
            inactivity_scanner: Arc::new(InactivityScanner::new(customer_repo, evaluator)),
            db,
        }
    }
}
