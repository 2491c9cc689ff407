//! 营销活动集成测试

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{RecordingGateway, connect, enroll, seed_business, setup, test_config};
use loyalty_shared::retry::RetryPolicy;
use stamp_engine::EngineError;
use stamp_engine::api::AppState;
use stamp_engine::campaign::{
    CampaignEvaluator, CampaignEvaluatorConfig, CampaignTrigger, CustomerEvent,
};
use stamp_engine::models::{Actor, CampaignStatus};
use stamp_engine::notification::{DispatcherConfig, MessageDispatcher};
use stamp_engine::repository::CampaignRepository;

fn owner() -> Actor {
    Actor::Owner("owner-1".to_string())
}

fn evaluator(pool: &sqlx::SqlitePool) -> CampaignEvaluator {
    CampaignEvaluator::new(pool.clone(), CampaignEvaluatorConfig::default())
}

#[tokio::test]
async fn test_same_event_fires_once() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 10).await;
    let campaign = ctx
        .state
        .campaign_service
        .create_campaign(
            1,
            "Bienvenida",
            CampaignTrigger::CustomerEnrolled,
            "Hola {nombre}, bienvenido a {negocio}",
            Some(CampaignStatus::Active),
        )
        .await
        .unwrap();
    let customer = enroll(&ctx.state, 1, Some("+34600000001")).await;

    let evaluator = evaluator(ctx.pool());
    // 入会时已同步评估过一次
    let again = evaluator
        .evaluate(1, customer.id, &CustomerEvent::CustomerEnrolled)
        .await
        .unwrap();
    assert!(again.is_empty());

    let repo = CampaignRepository::new(ctx.pool().clone());
    assert_eq!(repo.count_firings(campaign.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_stamps_reached_matches_exact_count() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 10).await;
    ctx.state
        .campaign_service
        .create_campaign(
            1,
            "Mitad",
            CampaignTrigger::StampsReached { stamps: 5 },
            "{nombre}, llevas {sellos} de {meta}. Te faltan {faltan} para {recompensa}",
            Some(CampaignStatus::Active),
        )
        .await
        .unwrap();
    let customer = enroll(&ctx.state, 1, Some("+34600000001")).await;
    let evaluator = evaluator(ctx.pool());

    let first = ctx
        .state
        .stamp_service
        .grant_stamps(1, customer.id, 3, "order-1", &owner())
        .await
        .unwrap();
    let messages = evaluator
        .evaluate(
            1,
            customer.id,
            &CustomerEvent::StampsGranted {
                ledger_entry_id: first.ledger_entry_id,
                new_count: first.new_stamps_count,
            },
        )
        .await
        .unwrap();
    assert!(messages.is_empty());

    let second = ctx
        .state
        .stamp_service
        .grant_stamps(1, customer.id, 2, "order-2", &owner())
        .await
        .unwrap();
    assert_eq!(second.new_stamps_count, 5);

    // 集章时已经评估并触发，再次评估同一流水不会重复
    let replay = evaluator
        .evaluate(
            1,
            customer.id,
            &CustomerEvent::StampsGranted {
                ledger_entry_id: second.ledger_entry_id,
                new_count: second.new_stamps_count,
            },
        )
        .await
        .unwrap();
    assert!(replay.is_empty());

    let fired: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM campaign_firings WHERE fired_for_event_id = ?",
    )
    .bind(format!("ledger:{}", second.ledger_entry_id))
    .fetch_one(ctx.pool())
    .await
    .unwrap();
    assert_eq!(fired, 1);
}

#[tokio::test]
async fn test_rendered_message_uses_customer_state() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 10).await;
    ctx.state
        .campaign_service
        .create_campaign(
            1,
            "Cada sello",
            CampaignTrigger::StampEarned,
            "{nombre}, llevas {sellos}/{meta}. Te faltan {faltan} para {recompensa} {desconocido}",
            Some(CampaignStatus::Active),
        )
        .await
        .unwrap();
    let customer = enroll(&ctx.state, 1, Some("+34600000001")).await;

    let outcome = ctx
        .state
        .stamp_service
        .grant_stamps(1, customer.id, 4, "order-1", &owner())
        .await
        .unwrap();

    // 用一个新的事件 ID 评估，避免与集章时的触发记录冲突
    let messages = evaluator(ctx.pool())
        .evaluate(
            1,
            customer.id,
            &CustomerEvent::StampsGranted {
                ledger_entry_id: outcome.ledger_entry_id + 1_000,
                new_count: outcome.new_stamps_count,
            },
        )
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].recipient_phone, "+34600000001");
    assert_eq!(
        messages[0].rendered_body,
        "Ana, llevas 4/10. Te faltan 6 para un café gratis {desconocido}"
    );
}

#[tokio::test]
async fn test_stamp_count_rendered_from_event() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 10).await;
    ctx.state
        .campaign_service
        .create_campaign(
            1,
            "Cada sello",
            CampaignTrigger::StampEarned,
            "Llevas {sellos}, te faltan {faltan}",
            Some(CampaignStatus::Active),
        )
        .await
        .unwrap();
    let customer = enroll(&ctx.state, 1, Some("+34600000001")).await;

    let first = ctx
        .state
        .stamp_service
        .grant_stamps(1, customer.id, 2, "order-1", &owner())
        .await
        .unwrap();
    // 评估前又提交了一次集章，客户当前为 6 个印章
    ctx.state
        .stamp_service
        .grant_stamps(1, customer.id, 4, "order-2", &owner())
        .await
        .unwrap();

    let messages = evaluator(ctx.pool())
        .evaluate(
            1,
            customer.id,
            &CustomerEvent::StampsGranted {
                ledger_entry_id: first.ledger_entry_id + 1_000,
                new_count: first.new_stamps_count,
            },
        )
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].rendered_body, "Llevas 2, te faltan 8");
}

#[tokio::test]
async fn test_customer_without_phone_is_skipped() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 10).await;
    let campaign = ctx
        .state
        .campaign_service
        .create_campaign(
            1,
            "Bienvenida",
            CampaignTrigger::CustomerEnrolled,
            "Hola {nombre}",
            Some(CampaignStatus::Active),
        )
        .await
        .unwrap();
    let customer = enroll(&ctx.state, 1, None).await;

    let messages = evaluator(ctx.pool())
        .evaluate(1, customer.id, &CustomerEvent::CustomerEnrolled)
        .await
        .unwrap();
    assert!(messages.is_empty());

    let repo = CampaignRepository::new(ctx.pool().clone());
    assert_eq!(repo.count_firings(campaign.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_only_active_campaigns_fire() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 10).await;
    let service = &ctx.state.campaign_service;
    let draft = service
        .create_campaign(1, "Borrador", CampaignTrigger::CustomerEnrolled, "Hola", None)
        .await
        .unwrap();
    assert_eq!(draft.status, CampaignStatus::Draft);

    let customer = enroll(&ctx.state, 1, Some("+34600000001")).await;
    let evaluator = evaluator(ctx.pool());
    assert!(evaluator
        .evaluate(1, customer.id, &CustomerEvent::CustomerEnrolled)
        .await
        .unwrap()
        .is_empty());

    service
        .update_campaign_status(1, draft.id, CampaignStatus::Active)
        .await
        .unwrap();
    let messages = evaluator
        .evaluate(1, customer.id, &CustomerEvent::CustomerEnrolled)
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);

    service
        .update_campaign_status(1, draft.id, CampaignStatus::Paused)
        .await
        .unwrap();
    assert_eq!(service.list_campaigns(1).await.unwrap()[0].status, CampaignStatus::Paused);
}

#[tokio::test]
async fn test_campaign_management_validation() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 10).await;
    let service = &ctx.state.campaign_service;

    assert!(matches!(
        service
            .create_campaign(1, "x", CampaignTrigger::DaysInactive { days: 0 }, "Hola", None)
            .await,
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        service
            .create_campaign(1, "  ", CampaignTrigger::StampEarned, "Hola", None)
            .await,
        Err(EngineError::Validation(_))
    ));
    for stamps in [10, 11] {
        assert!(matches!(
            service
                .create_campaign(
                    1,
                    "x",
                    CampaignTrigger::StampsReached { stamps },
                    "Hola",
                    None,
                )
                .await,
            Err(EngineError::Validation(_))
        ));
    }
    assert!(service
        .create_campaign(1, "x", CampaignTrigger::StampsReached { stamps: 9 }, "Hola", None)
        .await
        .is_ok());
    assert!(matches!(
        service
            .create_campaign(7, "x", CampaignTrigger::StampEarned, "Hola", None)
            .await,
        Err(EngineError::BusinessNotFound(7))
    ));
    assert!(matches!(
        service
            .update_campaign_status(1, 404, CampaignStatus::Active)
            .await,
        Err(EngineError::CampaignNotFound(404))
    ));
}

#[tokio::test]
async fn test_inactivity_scan_fires_once_per_streak() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 10).await;
    let campaign = ctx
        .state
        .campaign_service
        .create_campaign(
            1,
            "Te extrañamos",
            CampaignTrigger::DaysInactive { days: 30 },
            "{nombre}, hace {dias} días que no vienes",
            Some(CampaignStatus::Active),
        )
        .await
        .unwrap();
    let sleeping = enroll(&ctx.state, 1, Some("+34600000001")).await;
    let recent = enroll(&ctx.state, 1, Some("+34600000002")).await;
    // 从未集章的客户不参与扫描
    enroll(&ctx.state, 1, Some("+34600000003")).await;

    for (customer, key) in [(sleeping.id, "order-1"), (recent.id, "order-2")] {
        ctx.state
            .stamp_service
            .grant_stamps(1, customer, 1, key, &owner())
            .await
            .unwrap();
    }

    let now = Utc::now();
    sqlx::query("UPDATE customers SET last_stamp_at = ? WHERE id = ?")
        .bind(now - chrono::Duration::days(30))
        .bind(sleeping.id)
        .execute(ctx.pool())
        .await
        .unwrap();

    let scanner = &ctx.state.inactivity_scanner;
    let report = scanner.scan_business(1, now).await.unwrap();
    assert_eq!(report.customers_checked, 2);
    assert_eq!(report.messages_scheduled, 1);

    let report = scanner.scan_all(now).await.unwrap();
    assert_eq!(report.messages_scheduled, 0);

    let repo = CampaignRepository::new(ctx.pool().clone());
    assert_eq!(repo.count_firings(campaign.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_messages_delivered_through_dispatcher() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    let db = connect(&config).await;

    let gateway = RecordingGateway::new();
    let stats = Arc::new(CampaignRepository::new(db.pool().clone()));
    let dispatcher = MessageDispatcher::new(
        gateway.clone(),
        stats,
        DispatcherConfig {
            max_attempts: 3,
            retry: RetryPolicy::from_millis(2, 1, 10),
            queue_capacity: 16,
        },
    );
    let (queue, worker) = dispatcher.start();
    let state = AppState::new(db.clone(), &config, Some(queue));

    seed_business(&state, 1, 3).await;
    state
        .campaign_service
        .create_campaign(
            1,
            "Premio",
            CampaignTrigger::RewardUnlocked,
            "{nombre}, ya tienes {recompensa}",
            Some(CampaignStatus::Active),
        )
        .await
        .unwrap();
    let customer = enroll(&state, 1, Some("+34600000001")).await;
    state
        .stamp_service
        .grant_stamps(1, customer.id, 3, "order-1", &owner())
        .await
        .unwrap();

    let mut sent_count = 0;
    for _ in 0..100 {
        sent_count = state.campaign_service.list_campaigns(1).await.unwrap()[0].sent_count;
        if sent_count == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(sent_count, 1);

    let sent = gateway.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient_phone, "+34600000001");
    assert_eq!(sent[0].rendered_body, "Ana, ya tienes un café gratis");

    drop(state);
    worker.abort();
}
