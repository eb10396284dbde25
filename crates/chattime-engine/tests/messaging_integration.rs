//! Integration tests for message routing, history, and ratings
//!
//! Client sends are gated on an active session; operator replies work
//! against history; every delivery fans out to the user and operator
//! channels exactly once.

use std::time::Duration;

use tokio::time::timeout;

use chattime_engine::{
    AppEvent, BillingConfig, ChatEngine, ChatRole, ChattimeError, EngineBuilder, EngineConfig,
    HubConfig, StopReason, UserId,
};

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

fn test_config() -> EngineConfig {
    EngineConfig {
        // The default one-minute period keeps the clock out of these tests
        billing: BillingConfig {
            initial_balance: 100,
            ..BillingConfig::default()
        },
        hub: HubConfig::default(),
    }
}

async fn engine_with_user() -> (ChatEngine, UserId) {
    let engine = EngineBuilder::new().with_config(test_config()).build();
    let user = engine.register_user("test").await.unwrap();
    (engine, user.id)
}

async fn recv(rx: &mut tokio::sync::broadcast::Receiver<AppEvent>) -> AppEvent {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("expected an event before timeout")
        .expect("channel closed")
}

// ----------------------------------------------------------------------------
// Client Messages
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_client_message_requires_active_session() {
    let (engine, user_id) = engine_with_user().await;

    let err = engine
        .send_client_message(user_id, "hello?")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ChattimeError::Session(chattime_core::SessionError::NotActive { .. })
    ));

    engine.start_session(user_id).await.unwrap();
    let message = engine
        .send_client_message(user_id, "hello?")
        .await
        .unwrap();
    assert_eq!(message.sender, ChatRole::Client);
    assert_eq!(message.text, "hello?");
}

#[tokio::test]
async fn test_client_message_reaches_operator_exactly_once() {
    let (engine, user_id) = engine_with_user().await;
    let mut operator_rx = engine.subscribe_operator();

    engine.start_session(user_id).await.unwrap();
    engine
        .send_client_message(user_id, "is anyone there")
        .await
        .unwrap();

    // Skip the start notification, then expect the one message
    loop {
        match recv(&mut operator_rx).await {
            AppEvent::SessionStarted { .. } => continue,
            AppEvent::ChatMessage { sender, text, .. } => {
                assert_eq!(sender, ChatRole::Client);
                assert_eq!(text, "is anyone there");
                break;
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert!(operator_rx.try_recv().is_err(), "message delivered twice");
}

#[tokio::test]
async fn test_multi_device_echo() {
    let (engine, user_id) = engine_with_user().await;
    let mut phone_rx = engine.subscribe_user(user_id);
    let mut laptop_rx = engine.subscribe_user(user_id);

    engine.start_session(user_id).await.unwrap();
    engine.send_client_message(user_id, "ping").await.unwrap();

    for rx in [&mut phone_rx, &mut laptop_rx] {
        match recv(rx).await {
            AppEvent::ChatMessage { text, .. } => assert_eq!(text, "ping"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_message_text_validation() {
    let (engine, user_id) = engine_with_user().await;
    engine.start_session(user_id).await.unwrap();

    let err = engine.send_client_message(user_id, "   ").await.unwrap_err();
    assert!(matches!(
        err,
        ChattimeError::Validation(chattime_core::ValidationError::EmptyMessage)
    ));

    let long = "x".repeat(501);
    let err = engine.send_client_message(user_id, &long).await.unwrap_err();
    assert!(matches!(
        err,
        ChattimeError::Validation(chattime_core::ValidationError::MessageTooLong {
            length: 501,
            maximum: 500,
        })
    ));
}

// ----------------------------------------------------------------------------
// Operator Replies
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_admin_reply_is_allowed_after_session_ends() {
    let (engine, user_id) = engine_with_user().await;

    engine.start_session(user_id).await.unwrap();
    engine.send_client_message(user_id, "thanks, bye").await.unwrap();
    engine
        .stop_session(user_id, StopReason::ClientRequested)
        .await
        .unwrap();

    let mut user_rx = engine.subscribe_user(user_id);
    let reply = engine
        .send_admin_message(user_id, "take care!")
        .await
        .unwrap();
    assert_eq!(reply.sender, ChatRole::Admin);

    match recv(&mut user_rx).await {
        AppEvent::ChatMessage { sender, text, .. } => {
            assert_eq!(sender, ChatRole::Admin);
            assert_eq!(text, "take care!");
        }
        other => panic!("unexpected event: {other:?}"),
    }

    // Both messages landed on the same session
    let history = engine.chat_history(user_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].session_id, history[1].session_id);
}

#[tokio::test]
async fn test_admin_reply_without_history_is_rejected() {
    let (engine, user_id) = engine_with_user().await;

    let err = engine
        .send_admin_message(user_id, "hello?")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ChattimeError::Session(chattime_core::SessionError::NoHistory { .. })
    ));
}

// ----------------------------------------------------------------------------
// Clear and History
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_clear_wipes_history_without_ending_the_session() {
    let (engine, user_id) = engine_with_user().await;
    let mut user_rx = engine.subscribe_user(user_id);

    engine.start_session(user_id).await.unwrap();
    engine.send_client_message(user_id, "one").await.unwrap();
    engine.send_client_message(user_id, "two").await.unwrap();
    assert_eq!(engine.chat_history(user_id).await.unwrap().len(), 2);

    let cleared_session = engine.clear_chat(user_id).await.unwrap();
    assert_eq!(engine.chat_history(user_id).await.unwrap().len(), 0);

    // The session stays active and billable
    let status = engine.session_status(user_id).await.unwrap();
    assert!(status.active);
    assert_eq!(status.session_id, Some(cleared_session));

    // Two message events, then the cleared notification
    let mut events = Vec::new();
    for _ in 0..3 {
        events.push(recv(&mut user_rx).await);
    }
    assert!(matches!(events[2], AppEvent::ChatCleared { .. }));
}

#[tokio::test]
async fn test_clear_without_history_is_rejected() {
    let (engine, user_id) = engine_with_user().await;
    let err = engine.clear_chat(user_id).await.unwrap_err();
    assert!(matches!(
        err,
        ChattimeError::Session(chattime_core::SessionError::NoHistory { .. })
    ));
}

// ----------------------------------------------------------------------------
// Ratings
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_rating_validates_stars_and_notifies_operators() {
    let (engine, user_id) = engine_with_user().await;

    engine.start_session(user_id).await.unwrap();
    engine
        .stop_session(user_id, StopReason::ClientRequested)
        .await
        .unwrap();

    let err = engine.submit_rating(user_id, 0, None).await.unwrap_err();
    assert!(matches!(
        err,
        ChattimeError::Validation(chattime_core::ValidationError::StarsOutOfRange { stars: 0 })
    ));

    let mut operator_rx = engine.subscribe_operator();
    let rating = engine
        .submit_rating(user_id, 5, Some("very helpful".to_string()))
        .await
        .unwrap();
    assert_eq!(rating.stars, 5);

    match recv(&mut operator_rx).await {
        AppEvent::RatingSubmitted { stars, .. } => assert_eq!(stars, 5),
        other => panic!("unexpected event: {other:?}"),
    }
}
