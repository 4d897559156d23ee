//! Test doubles and common utilities for sync contract tests
//!
//! The mock client counts every call and records every awarded ID so the
//! tests can assert on exactly what went over the wire.

#![allow(dead_code)]

use achsync_core::{
    AwardOutcome, CredentialsConfig, EngineEvent, LoginOutcome, MappingTable, MemoryHost,
    RemoteAchievementId, RemoteConfig, RemoteSyncClient, RequestHeader, SessionCredentials,
    StatusSink, SyncConfig, SyncEngine,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Remote client with scripted outcomes
pub struct MockClient {
    login_outcome: Mutex<LoginOutcome>,
    award_outcome: Mutex<AwardOutcome>,
    login_delay: Duration,
    award_delay: Duration,
    login_calls: AtomicUsize,
    award_calls: AtomicUsize,
    awarded: Mutex<Vec<(RemoteAchievementId, RequestHeader)>>,
}

impl MockClient {
    /// Client that accepts every login and award
    pub fn new() -> Self {
        Self {
            login_outcome: Mutex::new(LoginOutcome::Success {
                token: "test-token".to_string(),
            }),
            award_outcome: Mutex::new(AwardOutcome::Success),
            login_delay: Duration::ZERO,
            award_delay: Duration::ZERO,
            login_calls: AtomicUsize::new(0),
            award_calls: AtomicUsize::new(0),
            awarded: Mutex::new(Vec::new()),
        }
    }

    pub fn with_login_outcome(self, outcome: LoginOutcome) -> Self {
        *self.login_outcome.lock().unwrap() = outcome;
        self
    }

    pub fn with_award_outcome(self, outcome: AwardOutcome) -> Self {
        *self.award_outcome.lock().unwrap() = outcome;
        self
    }

    pub fn with_login_delay(mut self, delay: Duration) -> Self {
        self.login_delay = delay;
        self
    }

    pub fn with_award_delay(mut self, delay: Duration) -> Self {
        self.award_delay = delay;
        self
    }

    pub fn set_login_outcome(&self, outcome: LoginOutcome) {
        *self.login_outcome.lock().unwrap() = outcome;
    }

    pub fn set_award_outcome(&self, outcome: AwardOutcome) {
        *self.award_outcome.lock().unwrap() = outcome;
    }

    pub fn login_call_count(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn award_call_count(&self) -> usize {
        self.award_calls.load(Ordering::SeqCst)
    }

    /// Remote IDs awarded so far, in call order
    pub fn awarded_ids(&self) -> Vec<u32> {
        self.awarded
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.0)
            .collect()
    }

    /// Headers sent with award calls, in call order
    pub fn award_headers(&self) -> Vec<RequestHeader> {
        self.awarded
            .lock()
            .unwrap()
            .iter()
            .map(|(_, header)| header.clone())
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.login_call_count() + self.award_call_count()
    }
}

#[async_trait::async_trait]
impl RemoteSyncClient for MockClient {
    async fn login(&self, _creds: &SessionCredentials, _header: &RequestHeader) -> LoginOutcome {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if !self.login_delay.is_zero() {
            tokio::time::sleep(self.login_delay).await;
        }
        self.login_outcome.lock().unwrap().clone()
    }

    async fn award_achievement(
        &self,
        remote_id: RemoteAchievementId,
        header: &RequestHeader,
    ) -> AwardOutcome {
        self.award_calls.fetch_add(1, Ordering::SeqCst);
        self.awarded
            .lock()
            .unwrap()
            .push((remote_id, header.clone()));
        if !self.award_delay.is_zero() {
            tokio::time::sleep(self.award_delay).await;
        }
        self.award_outcome.lock().unwrap().clone()
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}

/// Status sink that keeps every message
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl StatusSink for RecordingSink {
    fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// Valid configuration polling on every tick
pub fn test_config() -> SyncConfig {
    let mut config = SyncConfig::new(
        RemoteConfig::RetroAchievements {
            host: "https://retroachievements.test".to_string(),
            game_id: 28_000,
        },
        CredentialsConfig::new("player", "hunter2", false),
    );
    config.engine.ticks_per_poll = 1;
    config.engine.request_timeout_secs = 2;
    config.engine.shutdown_grace_secs = 2;
    config
}

/// Shorthand for building a shared client
pub fn shared(client: MockClient) -> Arc<MockClient> {
    Arc::new(client)
}

/// Engine over a memory host with the given client, mapping and sink
pub fn build_engine(
    host: &MemoryHost,
    client: &Arc<MockClient>,
    mapping: MappingTable,
    sink: Arc<dyn StatusSink>,
    config: SyncConfig,
) -> (SyncEngine, mpsc::Receiver<EngineEvent>) {
    SyncEngine::new(
        Arc::new(host.clone()),
        client.clone(),
        mapping,
        sink,
        config,
    )
    .expect("engine construction succeeds")
}

/// Every event currently queued, without waiting
pub fn drain_events(rx: &mut mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Local IDs in a baseline, sorted
pub fn baseline_ids(engine: &SyncEngine) -> Vec<u32> {
    engine
        .baseline()
        .expect("save loaded")
        .to_sorted_vec()
        .into_iter()
        .map(|id| id.0)
        .collect()
}
