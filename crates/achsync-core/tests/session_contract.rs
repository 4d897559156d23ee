//! Contract Test: Session Lifecycle
//!
//! Verifies that login never blocks the poll path and never duplicates.
//!
//! Constraints verified:
//! - Save-load returns before the login round trip completes
//! - Concurrent login requests share one network call
//! - A failed session does not retry by itself; the next save-load does
//! - A hung network call is bounded by the request timeout
//! - A login left over from a replaced save reports nothing
//!
//! If this test fails, the session can stall the host or flood the remote.

mod common;

use achsync_core::{
    AwardOutcome, EngineEvent, LocalAchievementId, LoginOutcome, MappingTable, MemoryHost,
    NullStatusSink, SessionStatus,
};
use common::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test]
async fn save_load_does_not_wait_for_login() {
    let host = MemoryHost::new();
    let client = shared(MockClient::new().with_login_delay(Duration::from_millis(300)));
    let (mut engine, _events) = build_engine(
        &host,
        &client,
        MappingTable::from_pairs([(7, 70)]),
        Arc::new(NullStatusSink),
        test_config(),
    );

    let started = Instant::now();
    let login = engine.load_save().await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(200));
    assert_eq!(
        engine.session().unwrap().status(),
        SessionStatus::Authenticating
    );

    // First poll runs before login completes
    host.unlock(7).await;
    let report = engine.poll().await.unwrap();
    assert_eq!(report.deferred, vec![LocalAchievementId(7)]);

    login.await.unwrap().unwrap();
    let report = engine.poll().await.unwrap();
    engine.wait_for_dispatched().await;
    assert_eq!(report.dispatched.len(), 1);
    assert_eq!(client.awarded_ids(), vec![70]);
}

#[tokio::test]
async fn concurrent_logins_make_one_network_call() {
    let host = MemoryHost::new();
    let client = shared(MockClient::new().with_login_delay(Duration::from_millis(100)));
    let (mut engine, _events) = build_engine(
        &host,
        &client,
        MappingTable::new(),
        Arc::new(NullStatusSink),
        test_config(),
    );

    let first = engine.load_save().await.unwrap();
    let session = engine.session().unwrap().clone();
    let creds = test_config().credentials.session_credentials();

    let second = session.spawn_login(creds.clone());
    let third = session.login(creds).await;

    assert!(first.await.unwrap().is_ok());
    assert!(second.await.unwrap().is_ok());
    assert!(third.is_ok());
    assert_eq!(client.login_call_count(), 1);
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn failed_session_waits_for_next_save_load() {
    let host = MemoryHost::new();
    let client = shared(MockClient::new().with_login_outcome(LoginOutcome::TransportFailure {
        reason: "connection refused".to_string(),
    }));
    let (mut engine, mut events) = build_engine(
        &host,
        &client,
        MappingTable::from_pairs([(1, 10)]),
        Arc::new(NullStatusSink),
        test_config(),
    );

    assert!(engine.load_save().await.unwrap().await.unwrap().is_err());
    host.unlock(1).await;
    for _ in 0..5 {
        engine.poll().await.unwrap();
    }
    assert_eq!(client.login_call_count(), 1);
    assert!(
        drain_events(&mut events).contains(&EngineEvent::LoginFailed {
            reason: "connection refused".to_string(),
        })
    );

    client.set_login_outcome(LoginOutcome::Success {
        token: "tok".to_string(),
    });
    engine.load_save().await.unwrap().await.unwrap().unwrap();
    assert_eq!(client.login_call_count(), 2);

    // The new save-load's baseline already contains 1
    let report = engine.poll().await.unwrap();
    assert_eq!(report.detected, 0);
}

#[tokio::test]
async fn hung_login_times_out_as_transport_failure() {
    let host = MemoryHost::new();
    let client = shared(MockClient::new().with_login_delay(Duration::from_secs(30)));
    let mut config = test_config();
    config.engine.request_timeout_secs = 1;
    let (mut engine, _events) = build_engine(
        &host,
        &client,
        MappingTable::new(),
        Arc::new(NullStatusSink),
        config,
    );

    let result = engine.load_save().await.unwrap().await.unwrap();
    assert!(matches!(result, Err(achsync_core::AuthError::Transport(_))));
    assert!(matches!(
        engine.session().unwrap().status(),
        SessionStatus::Failed { .. }
    ));
}

#[tokio::test]
async fn hung_award_times_out_as_transport_failure() {
    let host = MemoryHost::new();
    let client = shared(
        MockClient::new()
            .with_award_delay(Duration::from_secs(30))
            .with_award_outcome(AwardOutcome::Success),
    );
    let mut config = test_config();
    config.engine.request_timeout_secs = 1;
    let (mut engine, mut events) = build_engine(
        &host,
        &client,
        MappingTable::from_pairs([(3, 30)]),
        Arc::new(NullStatusSink),
        config,
    );

    engine.load_save().await.unwrap().await.unwrap().unwrap();
    host.unlock(3).await;

    let started = Instant::now();
    engine.poll().await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));

    engine.wait_for_dispatched().await;
    assert!(drain_events(&mut events).iter().any(|event| matches!(
        event,
        EngineEvent::AwardTransportFailure { reason, .. } if reason.contains("timed out")
    )));
    assert_eq!(baseline_ids(&engine), vec![3]);
}

#[tokio::test]
async fn replaced_save_login_reports_nothing() {
    let host = MemoryHost::new();
    let client = shared(MockClient::new().with_login_delay(Duration::from_millis(200)));
    let sink = Arc::new(RecordingSink::default());
    let (mut engine, mut events) = build_engine(
        &host,
        &client,
        MappingTable::new(),
        sink.clone(),
        test_config(),
    );

    let stale = engine.load_save().await.unwrap();
    let current = engine.load_save().await.unwrap();

    assert!(stale.await.unwrap_err().is_cancelled());
    current.await.unwrap().unwrap();

    // The abandoned round trip still completes on the network side
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(client.login_call_count(), 2);

    let logged_in = sink
        .messages()
        .iter()
        .filter(|m| m.starts_with("Logged in as"))
        .count();
    assert_eq!(logged_in, 1);

    let login_events = drain_events(&mut events)
        .iter()
        .filter(|e| matches!(e, EngineEvent::LoginSucceeded { .. }))
        .count();
    assert_eq!(login_events, 1);
}
