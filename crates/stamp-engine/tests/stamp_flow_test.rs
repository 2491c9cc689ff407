//! 集章流程集成测试
//!
//! 覆盖结转解锁、幂等重放、参数校验和并发集章。

mod common;

use std::sync::Arc;

use common::{enroll, seed_business, setup};
use stamp_engine::EngineError;
use stamp_engine::models::Actor;
use stamp_engine::repository::{CustomerRepository, StampLedgerRepository};

fn owner() -> Actor {
    Actor::Owner("owner-1".to_string())
}

async fn set_stamps(pool: &sqlx::SqlitePool, customer_id: i64, stamps: i64) {
    sqlx::query("UPDATE customers SET stamps_count = ? WHERE id = ?")
        .bind(stamps)
        .bind(customer_id)
        .execute(pool)
        .await
        .unwrap();
}

async fn idempotency_key_count(pool: &sqlx::SqlitePool, business_id: i64, key: &str) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM idempotency_keys WHERE business_id = ? AND idempotency_key = ?",
    )
    .bind(business_id)
    .bind(key)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn test_grant_crosses_threshold_with_carry_over() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 10).await;
    let customer = enroll(&ctx.state, 1, None).await;
    set_stamps(ctx.pool(), customer.id, 8).await;

    let outcome = ctx
        .state
        .stamp_service
        .grant_stamps(1, customer.id, 3, "order-1001", &owner())
        .await
        .unwrap();

    assert_eq!(outcome.new_stamps_count, 1);
    assert_eq!(outcome.rewards_unlocked, 1);
    assert_eq!(outcome.total_rewards_earned, 1);
    assert_eq!(outcome.unlock_event_ids.len(), 1);
    assert!(!outcome.replayed);

    let rewards = ctx
        .state
        .redemption_service
        .list_rewards(1, customer.id)
        .await
        .unwrap();
    assert_eq!(rewards.outstanding, 1);
    assert_eq!(
        rewards.rewards[0].unlock.source_ledger_entry_id,
        outcome.ledger_entry_id
    );
}

#[tokio::test]
async fn test_single_grant_unlocks_multiple_rewards() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 4).await;
    let customer = enroll(&ctx.state, 1, None).await;

    let outcome = ctx
        .state
        .stamp_service
        .grant_stamps(1, customer.id, 9, "order-1", &owner())
        .await
        .unwrap();

    assert_eq!(outcome.new_stamps_count, 1);
    assert_eq!(outcome.rewards_unlocked, 2);
    assert_eq!(outcome.unlock_event_ids.len(), 2);

    let stored = CustomerRepository::new(ctx.pool().clone())
        .find_by_id(customer.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.stamps_count, 1);
    assert_eq!(stored.total_rewards_earned, 2);
    assert!(stored.last_stamp_at.is_some());
}

#[tokio::test]
async fn test_replay_with_different_quantity_returns_first_result() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 10).await;
    let customer = enroll(&ctx.state, 1, None).await;
    let service = &ctx.state.stamp_service;

    let first = service
        .grant_stamps(1, customer.id, 2, "X", &owner())
        .await
        .unwrap();
    let replay = service
        .grant_stamps(1, customer.id, 5, "X", &owner())
        .await
        .unwrap();

    assert_eq!(first.new_stamps_count, 2);
    assert!(replay.replayed);
    assert_eq!(replay.new_stamps_count, 2);
    assert_eq!(replay.ledger_entry_id, first.ledger_entry_id);

    let ledger = StampLedgerRepository::new(ctx.pool().clone());
    assert_eq!(ledger.sum_quantity(customer.id).await.unwrap(), 2);
    assert_eq!(ledger.list_by_customer(customer.id, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_same_key_in_other_business_is_independent() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 10).await;
    seed_business(&ctx.state, 2, 10).await;
    let a = enroll(&ctx.state, 1, None).await;
    let b = enroll(&ctx.state, 2, None).await;

    let service = &ctx.state.stamp_service;
    let first = service.grant_stamps(1, a.id, 1, "shared", &owner()).await.unwrap();
    let second = service.grant_stamps(2, b.id, 3, "shared", &owner()).await.unwrap();

    assert!(!second.replayed);
    assert_ne!(first.ledger_entry_id, second.ledger_entry_id);
    assert_eq!(second.new_stamps_count, 3);
}

#[tokio::test]
async fn test_quantity_out_of_range_rejected_without_writes() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 10).await;
    let customer = enroll(&ctx.state, 1, None).await;

    for quantity in [0, 11, -1] {
        let err = ctx
            .state
            .stamp_service
            .grant_stamps(1, customer.id, quantity, "order-q", &owner())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    let ledger = StampLedgerRepository::new(ctx.pool().clone());
    assert!(ledger.list_by_customer(customer.id, 10).await.unwrap().is_empty());
    assert_eq!(idempotency_key_count(ctx.pool(), 1, "order-q").await, 0);
}

#[tokio::test]
async fn test_blank_or_oversized_key_rejected() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 10).await;
    let customer = enroll(&ctx.state, 1, None).await;

    let long_key = "k".repeat(201);
    for key in ["", "   ", long_key.as_str()] {
        let err = ctx
            .state
            .stamp_service
            .grant_stamps(1, customer.id, 1, key, &owner())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}

#[tokio::test]
async fn test_failed_grant_does_not_poison_key() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 10).await;
    let customer = enroll(&ctx.state, 1, None).await;

    let err = ctx
        .state
        .stamp_service
        .grant_stamps(1, 9_999, 1, "order-7", &owner())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CustomerNotFound(9_999)));
    assert_eq!(idempotency_key_count(ctx.pool(), 1, "order-7").await, 0);

    let outcome = ctx
        .state
        .stamp_service
        .grant_stamps(1, customer.id, 1, "order-7", &owner())
        .await
        .unwrap();
    assert!(!outcome.replayed);
    assert_eq!(outcome.new_stamps_count, 1);
}

#[tokio::test]
async fn test_customer_of_other_business_not_found() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 10).await;
    seed_business(&ctx.state, 2, 10).await;
    let other = enroll(&ctx.state, 2, None).await;

    let err = ctx
        .state
        .stamp_service
        .grant_stamps(1, other.id, 1, "order-1", &owner())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CustomerNotFound(_)));
}

#[tokio::test]
async fn test_inactive_business_rejects_grants() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 10).await;
    let customer = enroll(&ctx.state, 1, None).await;
    ctx.state
        .business_service
        .set_business_active(1, false)
        .await
        .unwrap();

    let err = ctx
        .state
        .stamp_service
        .grant_stamps(1, customer.id, 1, "order-1", &owner())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BusinessInactive(1)));
}

#[tokio::test]
async fn test_lowered_threshold_applies_on_next_grant() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 10).await;
    let customer = enroll(&ctx.state, 1, None).await;
    let service = &ctx.state.stamp_service;

    service.grant_stamps(1, customer.id, 8, "a", &owner()).await.unwrap();
    seed_business(&ctx.state, 1, 3).await;

    // 修改门槛本身不改变已有进度
    let detail = ctx.state.business_service.get_customer(1, customer.id).await.unwrap();
    assert_eq!(detail.customer.stamps_count, 8);

    let outcome = service.grant_stamps(1, customer.id, 1, "b", &owner()).await.unwrap();
    assert_eq!(outcome.rewards_unlocked, 3);
    assert_eq!(outcome.new_stamps_count, 0);
}

#[tokio::test]
async fn test_customer_detail_includes_ledger() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 10).await;
    let customer = enroll(&ctx.state, 1, None).await;
    let service = &ctx.state.stamp_service;

    service.grant_stamps(1, customer.id, 4, "a", &owner()).await.unwrap();
    service
        .grant_stamps(1, customer.id, 2, "b", &Actor::Scanner(5))
        .await
        .unwrap();

    let detail = ctx.state.business_service.get_customer(1, customer.id).await.unwrap();
    assert_eq!(detail.customer.stamps_count, 6);
    assert_eq!(detail.stamps_remaining, 4);
    assert_eq!(detail.lifetime_stamps, 6);
    assert_eq!(detail.recent_ledger.len(), 2);
    assert_eq!(detail.recent_ledger[0].actor, "scanner:5");
    assert_eq!(detail.recent_ledger[0].balance_after, 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_grants_apply_every_stamp() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 1_000).await;
    let customer = enroll(&ctx.state, 1, None).await;

    let service = Arc::clone(&ctx.state.stamp_service);
    let n = 20;
    let handles: Vec<_> = (0..n)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .grant_stamps(1, customer.id, 1, &format!("visit-{}", i), &owner())
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = CustomerRepository::new(ctx.pool().clone())
        .find_by_id(customer.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.stamps_count, n);

    let ledger = StampLedgerRepository::new(ctx.pool().clone());
    assert_eq!(ledger.sum_quantity(customer.id).await.unwrap(), n);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_retries_of_one_key_apply_once() {
    let ctx = setup().await;
    seed_business(&ctx.state, 1, 10).await;
    let customer = enroll(&ctx.state, 1, None).await;

    let service = Arc::clone(&ctx.state.stamp_service);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .grant_stamps(1, customer.id, 3, "same-receipt", &owner())
                    .await
            })
        })
        .collect();

    let mut fresh = 0;
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.new_stamps_count, 3);
        if !outcome.replayed {
            fresh += 1;
        }
    }
    assert_eq!(fresh, 1);
}
