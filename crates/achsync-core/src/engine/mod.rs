//! Core synchronization engine
//!
//! The SyncEngine is responsible for:
//! - Capturing a baseline of unlocked achievements at save-load
//! - Starting the background login for the save's session
//! - Diffing the host's unlocked set against the baseline on every poll
//! - Mapping new IDs and dispatching award calls without blocking the poll
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐
//! │ AchievementHost│─── HostEvent ───┐
//! └────────────────┘                 │
//!                                    ▼
//!                            ┌──────────────┐
//!                            │  SyncEngine  │
//!                            └──────────────┘
//!                                    │
//!         ┌──────────────────────────┼──────────────────────────┐
//!         │                          │                          │
//!         ▼                          ▼                          ▼
//! ┌──────────────┐          ┌────────────────┐          ┌──────────────┐
//! │ DeltaTracker │          │ SessionManager │          │ award tasks  │
//! │ + Baseline   │          │ (login gate)   │          │ (JoinSet)    │
//! └──────────────┘          └────────────────┘          └──────────────┘
//! ```
//!
//! ## Poll Flow
//!
//! 1. Run host-side local unlocks so they join this poll's delta
//! 2. Read the host's unlocked set and diff it against the baseline
//! 3. Per new ID, in batch order:
//!    - not authenticated: skip, leave it out of the baseline
//!    - unmapped: log, commit
//!    - mapped: spawn the award call, commit immediately
//! 4. Award outcomes are reported whenever they resolve
//!
//! Baseline mutation happens only on the task calling [`SyncEngine::poll`].
//! Background tasks never touch it.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{AbortHandle, JoinHandle, JoinSet};
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use crate::client::{AwardOutcome, RemoteSyncClient, RequestHeader};
use crate::config::SyncConfig;
use crate::delta::DeltaTracker;
use crate::error::{Error, Result};
use crate::host::{AchievementHost, HostEvent};
use crate::mapping::MappingTable;
use crate::model::{Baseline, LocalAchievementId, RemoteAchievementId, SessionCredentials};
use crate::session::{LoginResult, SessionManager, SessionSettings};
use crate::sink::StatusSink;

/// Events emitted by the SyncEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started,

    /// Baseline captured for a newly loaded save
    SaveLoaded {
        baseline_len: usize,
        loaded_at: DateTime<Utc>,
    },

    /// Background login succeeded
    LoginSucceeded {
        username: String,
    },

    /// Background login failed
    LoginFailed {
        reason: String,
    },

    /// New achievement accepted for sync
    AchievementDetected {
        id: LocalAchievementId,
        name: String,
    },

    /// New achievement held back until the session is authenticated
    SkippedUnauthenticated {
        id: LocalAchievementId,
    },

    /// New achievement has no remote counterpart
    Unmapped {
        id: LocalAchievementId,
    },

    /// Award call spawned
    AwardDispatched {
        id: LocalAchievementId,
        remote_id: RemoteAchievementId,
    },

    /// Award recorded by the remote service
    AwardSucceeded {
        id: LocalAchievementId,
        remote_id: RemoteAchievementId,
    },

    /// Remote service declined the award
    AwardRejected {
        id: LocalAchievementId,
        remote_id: RemoteAchievementId,
        reason: String,
    },

    /// Award call failed at the transport level (includes timeouts)
    AwardTransportFailure {
        id: LocalAchievementId,
        remote_id: RemoteAchievementId,
        reason: String,
    },

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// Synchronous result of one poll
///
/// Award outcomes are not part of the report; they arrive later as
/// [`EngineEvent`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Size of the delta batch
    pub detected: usize,
    /// Award calls spawned, in batch order
    pub dispatched: Vec<(LocalAchievementId, RemoteAchievementId)>,
    /// Committed without a network call
    pub unmapped: Vec<LocalAchievementId>,
    /// Left out of the baseline because the session was not authenticated
    pub deferred: Vec<LocalAchievementId>,
}

/// Per-save state, replaced on every save-load
struct SaveContext {
    baseline: Baseline,
    session: SessionManager,
    loaded_at: DateTime<Utc>,
    /// Background login for this save; aborted when the save is replaced
    login: AbortHandle,
}

/// Core synchronization engine
///
/// The engine orchestrates the poll → diff → map → award flow for one
/// host. It can be driven by hand ([`load_save`](Self::load_save) +
/// [`poll`](Self::poll)) or by the host's event stream
/// ([`run`](Self::run)).
///
/// ## Lifecycle
///
/// 1. Create with [`SyncEngine::new()`]
/// 2. Start with [`SyncEngine::run()`]
/// 3. Each `SaveLoaded` event captures a fresh baseline and session
/// 4. Every `ticks_per_poll` ticks the engine polls
/// 5. On shutdown, in-flight awards get `shutdown_grace_secs` to finish
///
/// ## Non-blocking
///
/// Login and award calls run as spawned tasks. A poll never waits for the
/// network, so a slow or unreachable service cannot stall the host.
pub struct SyncEngine {
    /// Host application being mirrored
    host: Arc<dyn AchievementHost>,

    /// Remote service backend
    client: Arc<dyn RemoteSyncClient>,

    /// Local → remote ID translation
    mapping: Arc<MappingTable>,

    /// Human-readable status output
    sink: Arc<dyn StatusSink>,

    config: SyncConfig,

    /// Present once a save has been loaded
    save: Option<SaveContext>,

    /// Award calls that have not resolved yet
    in_flight: JoinSet<()>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl SyncEngine {
    /// Create a new sync engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        host: Arc<dyn AchievementHost>,
        client: Arc<dyn RemoteSyncClient>,
        mapping: MappingTable,
        sink: Arc<dyn StatusSink>,
        config: SyncConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        if mapping.is_empty() {
            warn!("Mapping table is empty; no achievement will be synced");
        }

        let engine = Self {
            host,
            client,
            mapping: Arc::new(mapping),
            sink,
            config,
            save: None,
            in_flight: JoinSet::new(),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Baseline of the current save, if one is loaded
    pub fn baseline(&self) -> Option<&Baseline> {
        self.save.as_ref().map(|save| &save.baseline)
    }

    /// Session of the current save, if one is loaded
    pub fn session(&self) -> Option<&SessionManager> {
        self.save.as_ref().map(|save| &save.session)
    }

    /// When the current save was loaded
    pub fn save_loaded_at(&self) -> Option<DateTime<Utc>> {
        self.save.as_ref().map(|save| save.loaded_at)
    }

    /// Number of award calls not yet reaped
    pub fn in_flight_awards(&self) -> usize {
        self.in_flight.len()
    }

    /// Handle a save-load
    ///
    /// Captures the baseline, replaces the session and starts the login in
    /// the background. The returned handle resolves with the login result;
    /// dropping it does not cancel the login. A login still running for the
    /// previous save is aborted and reports nothing.
    pub async fn load_save(&mut self) -> Result<JoinHandle<LoginResult>> {
        let current = self.host.unlocked_achievement_ids().await?;
        let baseline = Baseline::capture(&current);
        let loaded_at = Utc::now();

        info!("Save loaded with {} achievements already unlocked", baseline.len());
        self.emit_event(EngineEvent::SaveLoaded {
            baseline_len: baseline.len(),
            loaded_at,
        });

        if let Some(previous) = self.save.take() {
            previous.login.abort();
        }

        let session = SessionManager::new(
            Arc::clone(&self.client),
            SessionSettings::from_config(&self.config),
        );
        let login = self.spawn_login(&session, self.config.credentials.session_credentials());

        self.save = Some(SaveContext {
            baseline,
            session,
            loaded_at,
            login: login.abort_handle(),
        });

        Ok(login)
    }

    /// Run one poll
    ///
    /// A poll before the first save-load does nothing.
    pub async fn poll(&mut self) -> Result<PollReport> {
        self.reap_finished();

        let Some(save) = self.save.as_mut() else {
            debug!("No save loaded, skipping poll");
            return Ok(PollReport::default());
        };

        self.host.run_local_unlocks().await?;
        let current = self.host.unlocked_achievement_ids().await?;
        let batch = DeltaTracker::diff(&save.baseline, &current);

        let mut report = PollReport {
            detected: batch.len(),
            ..PollReport::default()
        };
        if batch.is_empty() {
            return Ok(report);
        }

        debug!("Detected {} new achievement(s)", batch.len());

        for id in batch {
            if !save.session.is_authenticated() {
                debug!("Achievement {} skipped, not authenticated", id);
                Self::emit(&self.event_tx, EngineEvent::SkippedUnauthenticated { id });
                report.deferred.push(id);
                continue;
            }

            let name = self.host.achievement_display_name(id).await;
            info!("Achievement unlocked: {} - {}", id, name);
            Self::emit(
                &self.event_tx,
                EngineEvent::AchievementDetected {
                    id,
                    name: name.clone(),
                },
            );

            match self.mapping.resolve(id) {
                None => {
                    info!("No remote mapping for achievement {} ({}), not syncing", id, name);
                    Self::emit(&self.event_tx, EngineEvent::Unmapped { id });
                    report.unmapped.push(id);
                }
                Some(remote_id) => {
                    let award = AwardTask {
                        id,
                        remote_id,
                        name,
                        header: save.session.header(),
                        client: Arc::clone(&self.client),
                        sink: Arc::clone(&self.sink),
                        event_tx: self.event_tx.clone(),
                        timeout: self.config.engine.request_timeout(),
                    };
                    self.in_flight.spawn(award.run());

                    Self::emit(&self.event_tx, EngineEvent::AwardDispatched { id, remote_id });
                    report.dispatched.push((id, remote_id));
                }
            }

            save.baseline.commit(id);
        }

        Ok(report)
    }

    /// Wait until every dispatched award has resolved
    pub async fn wait_for_dispatched(&mut self) {
        while let Some(result) = self.in_flight.join_next().await {
            if let Err(e) = result {
                error!("Award task failed: {}", e);
            }
        }
    }

    /// Run the engine
    ///
    /// Consumes the host's event stream until the stream ends or a shutdown
    /// signal (SIGINT) is received.
    pub async fn run(&mut self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the engine with a programmatic shutdown signal
    ///
    /// Used by embedders and tests in place of OS signals.
    pub async fn run_with_shutdown(&mut self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&mut self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.emit_event(EngineEvent::Started);

        let mut host_events = self.host.watch();
        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for shutdown signal: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        let reason = loop {
            tokio::select! {
                event = host_events.next() => match event {
                    Some(event) => self.handle_host_event(event).await,
                    None => {
                        info!("Host event stream ended");
                        break "Host event stream ended";
                    }
                },

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break "Shutdown signal";
                }
            }
        };

        self.drain_in_flight().await;
        self.emit_event(EngineEvent::Stopped {
            reason: reason.to_string(),
        });
        info!("Engine stopped");

        Ok(())
    }

    async fn handle_host_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::SaveLoaded => {
                if let Err(e) = self.load_save().await {
                    error!("Failed to load save: {}", e);
                }
            }
            HostEvent::Tick(tick) if tick % self.config.engine.ticks_per_poll == 0 => {
                match self.poll().await {
                    Ok(_) => {}
                    Err(e @ Error::Host(_)) => warn!("Poll skipped: {}", e),
                    Err(e) => error!("Poll failed: {}", e),
                }
            }
            HostEvent::Tick(_) => {}
        }
    }

    async fn drain_in_flight(&mut self) {
        if self.in_flight.is_empty() {
            return;
        }

        let grace = self.config.engine.shutdown_grace();
        info!("Waiting up to {:?} for {} award(s) in flight", grace, self.in_flight.len());

        if tokio::time::timeout(grace, self.wait_for_dispatched()).await.is_err() {
            warn!(
                "Shutdown grace elapsed, abandoning {} award(s) in flight",
                self.in_flight.len()
            );
            self.in_flight.abort_all();
        }
    }

    fn reap_finished(&mut self) {
        while let Some(result) = self.in_flight.try_join_next() {
            if let Err(e) = result {
                error!("Award task failed: {}", e);
            }
        }
    }

    fn spawn_login(
        &self,
        session: &SessionManager,
        creds: SessionCredentials,
    ) -> JoinHandle<LoginResult> {
        let session = session.clone();
        let sink = Arc::clone(&self.sink);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let result = session.login(creds).await;
            match &result {
                Ok(state) => {
                    sink.notify(&format!("Logged in as {}", state.username));
                    Self::emit(
                        &event_tx,
                        EngineEvent::LoginSucceeded {
                            username: state.username.clone(),
                        },
                    );
                }
                Err(e) => {
                    sink.notify(&format!("Login failed: {}", e.reason()));
                    Self::emit(
                        &event_tx,
                        EngineEvent::LoginFailed {
                            reason: e.reason().to_string(),
                        },
                    );
                }
            }
            result
        })
    }

    fn emit_event(&self, event: EngineEvent) {
        Self::emit(&self.event_tx, event);
    }

    /// Send an event, dropping it with a warning when the channel is full
    fn emit(event_tx: &mpsc::Sender<EngineEvent>, event: EngineEvent) {
        if let Err(mpsc::error::TrySendError::Full(_)) = event_tx.try_send(event) {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

/// One spawned award call
struct AwardTask {
    id: LocalAchievementId,
    remote_id: RemoteAchievementId,
    name: String,
    header: RequestHeader,
    client: Arc<dyn RemoteSyncClient>,
    sink: Arc<dyn StatusSink>,
    event_tx: mpsc::Sender<EngineEvent>,
    timeout: Duration,
}

impl AwardTask {
    async fn run(self) {
        let outcome = match tokio::time::timeout(
            self.timeout,
            self.client.award_achievement(self.remote_id, &self.header),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => AwardOutcome::TransportFailure {
                reason: format!("award timed out after {:?}", self.timeout),
            },
        };

        let (id, remote_id) = (self.id, self.remote_id);
        let event = match outcome {
            AwardOutcome::Success => {
                info!("Synced achievement {} ({}) as remote {}", id, self.name, remote_id);
                self.sink
                    .notify(&format!("Achievement synced: {}", self.name));
                EngineEvent::AwardSucceeded { id, remote_id }
            }
            AwardOutcome::RemoteRejected { reason } => {
                warn!("Award of {} ({}) rejected: {}", id, self.name, reason);
                self.sink
                    .notify(&format!("Achievement {} not synced: {}", self.name, reason));
                EngineEvent::AwardRejected {
                    id,
                    remote_id,
                    reason,
                }
            }
            AwardOutcome::TransportFailure { reason } => {
                warn!("Award of {} ({}) failed: {}", id, self.name, reason);
                self.sink
                    .notify(&format!("Achievement {} not synced: {}", self.name, reason));
                EngineEvent::AwardTransportFailure {
                    id,
                    remote_id,
                    reason,
                }
            }
        };

        SyncEngine::emit(&self.event_tx, event);
    }
}
