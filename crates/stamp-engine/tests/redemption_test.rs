//! 兑换流程集成测试

mod common;

use std::sync::Arc;

use common::{enroll, seed_business, setup};
use stamp_engine::EngineError;
use stamp_engine::models::{Actor, RewardState};

fn owner() -> Actor {
    Actor::Owner("owner-1".to_string())
}

#[tokio::test]
async fn test_unlock_event_redeemed_exactly_once() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 5).await;
    let customer = enroll(&ctx.state, 1, None).await;

    let outcome = ctx
        .state
        .stamp_service
        .grant_stamps(1, customer.id, 5, "order-1", &owner())
        .await
        .unwrap();
    let unlock_id = outcome.unlock_event_ids[0];

    let record = ctx
        .state
        .redemption_service
        .redeem_unlock(1, unlock_id, &Actor::Scanner(3))
        .await
        .unwrap();
    assert_eq!(record.unlock_event_id, unlock_id);
    assert_eq!(record.customer_id, customer.id);
    assert_eq!(record.actor, "scanner:3");

    let err = ctx
        .state
        .redemption_service
        .redeem_unlock(1, unlock_id, &owner())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyRedeemed(id) if id == unlock_id));

    // 兑换不影响印章数
    let detail = ctx.state.business_service.get_customer(1, customer.id).await.unwrap();
    assert_eq!(detail.customer.stamps_count, 0);
    assert_eq!(detail.customer.total_rewards_earned, 1);

    let history = ctx
        .state
        .redemption_service
        .list_redemptions(1, customer.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_redeem_consumes_oldest_outstanding_reward() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 2).await;
    let customer = enroll(&ctx.state, 1, None).await;

    let outcome = ctx
        .state
        .stamp_service
        .grant_stamps(1, customer.id, 4, "order-1", &owner())
        .await
        .unwrap();
    assert_eq!(outcome.unlock_event_ids.len(), 2);

    let service = &ctx.state.redemption_service;
    let first = service.redeem(1, customer.id, &owner()).await.unwrap();
    assert_eq!(first.unlock_event_id, outcome.unlock_event_ids[0]);

    let rewards = service.list_rewards(1, customer.id).await.unwrap();
    assert_eq!(rewards.outstanding, 1);
    assert_eq!(rewards.rewards[0].state, RewardState::Redeemed);
    assert_eq!(rewards.rewards[1].state, RewardState::Outstanding);

    let second = service.redeem(1, customer.id, &owner()).await.unwrap();
    assert_eq!(second.unlock_event_id, outcome.unlock_event_ids[1]);

    let err = service.redeem(1, customer.id, &owner()).await.unwrap_err();
    assert!(matches!(err, EngineError::NoRewardAvailable(_)));
}

#[tokio::test]
async fn test_redeem_without_rewards() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 10).await;
    let customer = enroll(&ctx.state, 1, None).await;

    let err = ctx
        .state
        .redemption_service
        .redeem(1, customer.id, &owner())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoRewardAvailable(_)));

    let err = ctx
        .state
        .redemption_service
        .redeem(1, 9_999, &owner())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CustomerNotFound(9_999)));
}

#[tokio::test]
async fn test_unlock_of_other_business_not_found() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 1).await;
    seed_business(&ctx.state, 2, 1).await;
    let customer = enroll(&ctx.state, 1, None).await;

    let outcome = ctx
        .state
        .stamp_service
        .grant_stamps(1, customer.id, 1, "order-1", &owner())
        .await
        .unwrap();

    let err = ctx
        .state
        .redemption_service
        .redeem_unlock(2, outcome.unlock_event_ids[0], &owner())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnlockEventNotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_redemptions_succeed_once() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 3).await;
    let customer = enroll(&ctx.state, 1, None).await;

    let outcome = ctx
        .state
        .stamp_service
        .grant_stamps(1, customer.id, 3, "order-1", &owner())
        .await
        .unwrap();
    let unlock_id = outcome.unlock_event_ids[0];

    let service = Arc::clone(&ctx.state.redemption_service);
    let handles: Vec<_> = (0..6)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .redeem_unlock(1, unlock_id, &Actor::Scanner(i))
                    .await
            })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(EngineError::AlreadyRedeemed(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(succeeded, 1);
}
