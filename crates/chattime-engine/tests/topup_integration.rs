//! Integration tests for the top-up workflow
//!
//! Covers the submit/approve/reject lifecycle end to end, the exact balance
//! effects of resolution, and the mutual exclusion of concurrent resolution
//! attempts on one request.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use chattime_engine::{
    AppEvent, BillingConfig, ChatEngine, ChattimeError, EngineBuilder, EngineConfig, HubConfig,
    TopUpStatus, UserId,
};

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

fn test_config() -> EngineConfig {
    EngineConfig {
        billing: BillingConfig::default(),
        hub: HubConfig::default(),
    }
}

async fn engine_with_user() -> (ChatEngine, UserId) {
    let engine = EngineBuilder::new().with_config(test_config()).build();
    let user = engine.register_user("test").await.unwrap();
    (engine, user.id)
}

// ----------------------------------------------------------------------------
// Round Trips
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_approve_round_trip_credits_exact_amount() {
    let (engine, user_id) = engine_with_user().await;
    let before = engine.balance(user_id).await.unwrap();

    let request = engine
        .submit_top_up(user_id, 50, "UTR123456", None)
        .await
        .unwrap();
    assert_eq!(request.status, TopUpStatus::Pending);

    let approved = engine.approve_top_up(request.id).await.unwrap();
    assert_eq!(approved.status, TopUpStatus::Approved);
    assert_eq!(engine.balance(user_id).await.unwrap(), before + 50);
}

#[tokio::test]
async fn test_reject_round_trip_keeps_balance_and_records_reason() {
    let (engine, user_id) = engine_with_user().await;
    let before = engine.balance(user_id).await.unwrap();

    let request = engine
        .submit_top_up(user_id, 50, "UTR123456", None)
        .await
        .unwrap();
    let rejected = engine
        .reject_top_up(request.id, Some("mismatch".to_string()))
        .await
        .unwrap();

    assert_eq!(rejected.status, TopUpStatus::Rejected);
    assert_eq!(rejected.reason.as_deref(), Some("mismatch"));
    assert_eq!(engine.balance(user_id).await.unwrap(), before);
}

#[tokio::test]
async fn test_approval_unblocks_session_start() {
    let (engine, user_id) = engine_with_user().await;

    let err = engine.start_session(user_id).await.unwrap_err();
    assert!(err.is_insufficient_funds());

    let request = engine
        .submit_top_up(user_id, 50, "UTR123456", None)
        .await
        .unwrap();
    engine.approve_top_up(request.id).await.unwrap();

    engine.start_session(user_id).await.unwrap();
    assert!(engine.session_status(user_id).await.unwrap().active);
}

// ----------------------------------------------------------------------------
// Double Resolution
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_second_resolution_is_a_conflict() {
    let (engine, user_id) = engine_with_user().await;

    let request = engine
        .submit_top_up(user_id, 50, "UTR123456", None)
        .await
        .unwrap();
    engine.approve_top_up(request.id).await.unwrap();

    let err = engine
        .reject_top_up(request.id, Some("too late".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ChattimeError::TopUp(chattime_core::TopUpError::AlreadyResolved {
            status: TopUpStatus::Approved,
            ..
        })
    ));
    // The rejected-after-approve attempt must not alter the record
    let listed = engine.top_ups_for(user_id).await.unwrap();
    assert_eq!(listed[0].status, TopUpStatus::Approved);
    assert_eq!(listed[0].reason, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_approvals_credit_once() {
    let (engine, user_id) = engine_with_user().await;
    let engine = Arc::new(engine);

    let request = engine
        .submit_top_up(user_id, 50, "UTR123456", None)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..2 {
        let engine = Arc::clone(&engine);
        let id = request.id;
        handles.push(tokio::spawn(async move { engine.approve_top_up(id).await }));
    }

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(ChattimeError::TopUp(chattime_core::TopUpError::AlreadyResolved { .. })) => {
                conflicts += 1
            }
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(engine.balance(user_id).await.unwrap(), 50);
}

// ----------------------------------------------------------------------------
// Listings and Events
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_pending_listing_shrinks_on_resolution() {
    let (engine, user_id) = engine_with_user().await;

    let first = engine
        .submit_top_up(user_id, 10, "UTR000001", None)
        .await
        .unwrap();
    let second = engine
        .submit_top_up(user_id, 20, "UTR000002", None)
        .await
        .unwrap();

    assert_eq!(engine.pending_top_ups().await.unwrap().len(), 2);
    engine.approve_top_up(first.id).await.unwrap();

    let pending = engine.pending_top_ups().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, second.id);

    // The user's own listing keeps both, in submission order
    let own = engine.top_ups_for(user_id).await.unwrap();
    assert_eq!(own.len(), 2);
    assert_eq!(own[0].id, first.id);
}

#[tokio::test]
async fn test_workflow_events_reach_the_right_audiences() {
    let (engine, user_id) = engine_with_user().await;
    let mut operator_rx = engine.subscribe_operator();
    let mut user_rx = engine.subscribe_user(user_id);

    let request = engine
        .submit_top_up(user_id, 50, "UTR123456", None)
        .await
        .unwrap();

    // Submission goes to the operator audience, not the user
    match timeout(Duration::from_secs(1), operator_rx.recv())
        .await
        .unwrap()
        .unwrap()
    {
        AppEvent::TopUpSubmitted { request: event } => assert_eq!(event.id, request.id),
        other => panic!("expected TopUpSubmitted, got {other:?}"),
    }
    assert!(user_rx.try_recv().is_err());

    engine.approve_top_up(request.id).await.unwrap();

    // The owner hears about the resolution and the balance change
    match timeout(Duration::from_secs(1), user_rx.recv())
        .await
        .unwrap()
        .unwrap()
    {
        AppEvent::BalanceUpdated { balance, .. } => assert_eq!(balance, 50),
        other => panic!("expected BalanceUpdated, got {other:?}"),
    }
    match timeout(Duration::from_secs(1), user_rx.recv())
        .await
        .unwrap()
        .unwrap()
    {
        AppEvent::TopUpResolved { request: event } => {
            assert_eq!(event.status, TopUpStatus::Approved)
        }
        other => panic!("expected TopUpResolved, got {other:?}"),
    }
}

#[tokio::test]
async fn test_submit_for_unknown_user_is_rejected() {
    let (engine, _) = engine_with_user().await;
    let err = engine
        .submit_top_up(UserId::new(), 50, "UTR123456", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ChattimeError::Session(chattime_core::SessionError::UnknownUser { .. })
    ));
}
