//! Remote session management
//!
//! The SessionManager owns the credential/token lifecycle for one
//! save-load:
//!
//! ```text
//! Unauthenticated ──login──▶ Authenticating ──ok──▶ Authenticated
//!        ▲                        │                      │
//!        │                        └──err──▶ Failed       │
//!        └──────────────── logout ◀──────────────────────┘
//! ```
//!
//! ## Single-flight login
//!
//! The network round trip runs in its own spawned task. Every caller that
//! asks for a login while one is in flight subscribes to the same
//! `watch` channel and receives that attempt's result, so at most one
//! login request is on the wire at any time. Dropping a caller never
//! cancels the attempt.
//!
//! ## Failure
//!
//! `Failed` is non-terminal but sticky: nothing in this module retries on
//! its own. A new attempt happens only when a caller asks for one (the
//! engine does so on the next save-load).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{LoginOutcome, RemoteSyncClient, RequestHeader};
use crate::config::SyncConfig;
use crate::error::AuthError;
use crate::model::{SessionCredentials, SessionState};

/// Result shared with every caller of one login attempt
pub type LoginResult = Result<SessionState, AuthError>;

type LoginReceiver = watch::Receiver<Option<LoginResult>>;

/// Authentication state of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Unauthenticated,
    Authenticating,
    Authenticated,
    /// Last attempt failed; `cause` is the literal reason
    Failed {
        cause: String,
    },
}

/// Everything bound into a session at save-load
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub host: String,
    pub game_id: u32,
    pub username: String,
    pub hardcore_mode: bool,
    pub user_agent: String,
    /// Upper bound for one login round trip
    pub request_timeout: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            host: config.remote.host().to_string(),
            game_id: config.remote.game_id(),
            username: config.credentials.username.clone(),
            hardcore_mode: config.credentials.hardcore,
            user_agent: config.engine.user_agent.clone(),
            request_timeout: config.engine.request_timeout(),
        }
    }
}

struct Inner {
    state: SessionState,
    status: SessionStatus,
    inflight: Option<LoginReceiver>,
    /// Bumped by `logout` so a login that started earlier cannot
    /// re-authenticate the session
    generation: u64,
}

enum LoginTicket {
    Ready(SessionState),
    Pending(LoginReceiver),
}

/// Owner of the authentication state
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Mutex<Inner>>,
    client: Arc<dyn RemoteSyncClient>,
    user_agent: String,
    request_timeout: Duration,
}

impl SessionManager {
    /// Create an unauthenticated session
    pub fn new(client: Arc<dyn RemoteSyncClient>, settings: SessionSettings) -> Self {
        let state = SessionState::new(
            settings.host,
            settings.game_id,
            settings.username,
            settings.hardcore_mode,
        );

        Self {
            inner: Arc::new(Mutex::new(Inner {
                state,
                status: SessionStatus::Unauthenticated,
                inflight: None,
                generation: 0,
            })),
            client,
            user_agent: settings.user_agent,
            request_timeout: settings.request_timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().status.clone()
    }

    /// True only in the `Authenticated` state
    pub fn is_authenticated(&self) -> bool {
        matches!(self.lock().status, SessionStatus::Authenticated)
    }

    /// Snapshot of the session state
    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    /// Request header for remote calls made under this session
    pub fn header(&self) -> RequestHeader {
        self.lock().state.header(&self.user_agent)
    }

    /// Log in, sharing any attempt already in flight
    ///
    /// Returns immediately when already authenticated.
    pub async fn login(&self, creds: SessionCredentials) -> LoginResult {
        match self.begin_login(creds) {
            LoginTicket::Ready(state) => Ok(state),
            LoginTicket::Pending(rx) => Self::await_result(rx).await,
        }
    }

    /// Start a login in the background
    pub fn spawn_login(&self, creds: SessionCredentials) -> JoinHandle<LoginResult> {
        let manager = self.clone();
        tokio::spawn(async move { manager.login(creds).await })
    }

    /// Drop the token and return to `Unauthenticated`
    pub fn logout(&self) {
        let mut inner = self.lock();
        inner.state.token = None;
        inner.status = SessionStatus::Unauthenticated;
        inner.inflight = None;
        inner.generation += 1;
        info!("Logged out {}", inner.state.username);
    }

    fn begin_login(&self, creds: SessionCredentials) -> LoginTicket {
        let mut inner = self.lock();

        match &inner.status {
            SessionStatus::Authenticated => return LoginTicket::Ready(inner.state.clone()),
            SessionStatus::Authenticating => {
                // A closed channel means the attempt died without reporting
                if let Some(rx) = inner.inflight.as_ref()
                    && rx.has_changed().is_ok()
                {
                    debug!("Login already in flight for {}, awaiting it", inner.state.username);
                    return LoginTicket::Pending(rx.clone());
                }
            }
            SessionStatus::Unauthenticated | SessionStatus::Failed { .. } => {}
        }

        let (tx, rx) = watch::channel(None);
        inner.status = SessionStatus::Authenticating;
        inner.inflight = Some(rx.clone());
        inner.state.username = creds.username.clone();
        let generation = inner.generation;
        let header = inner.state.header(&self.user_agent);
        drop(inner);

        debug!("Starting login for {} at {}", header.username, header.host);
        let manager = self.clone();
        tokio::spawn(async move {
            let result = manager.perform_login(creds, header, generation).await;
            let _ = tx.send(Some(result));
        });

        LoginTicket::Pending(rx)
    }

    async fn await_result(mut rx: LoginReceiver) -> LoginResult {
        let shared = match rx.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            Err(_) => None,
        };

        shared.unwrap_or_else(|| Err(AuthError::Transport("login attempt abandoned".to_string())))
    }

    /// One network round trip plus the atomic state transition
    async fn perform_login(
        &self,
        creds: SessionCredentials,
        header: RequestHeader,
        generation: u64,
    ) -> LoginResult {
        let outcome =
            match tokio::time::timeout(self.request_timeout, self.client.login(&creds, &header))
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => LoginOutcome::TransportFailure {
                    reason: format!("login timed out after {:?}", self.request_timeout),
                },
            };

        let mut inner = self.lock();
        if inner.generation != generation {
            debug!("Discarding login result for {}: session was reset", header.username);
            return Err(AuthError::Transport(
                "session was reset while logging in".to_string(),
            ));
        }
        inner.inflight = None;

        match outcome {
            LoginOutcome::Success { token } => {
                inner.state.token = Some(token);
                inner.status = SessionStatus::Authenticated;
                info!(
                    "Logged in to {} as {} (backend: {})",
                    inner.state.host,
                    inner.state.username,
                    self.client.backend_name()
                );
                Ok(inner.state.clone())
            }
            LoginOutcome::RemoteRejected { reason } => {
                inner.state.token = None;
                inner.status = SessionStatus::Failed {
                    cause: reason.clone(),
                };
                warn!("Login rejected for {}: {}", inner.state.username, reason);
                Err(AuthError::Rejected(reason))
            }
            LoginOutcome::TransportFailure { reason } => {
                inner.state.token = None;
                inner.status = SessionStatus::Failed {
                    cause: reason.clone(),
                };
                warn!("Login failed for {}: {}", inner.state.username, reason);
                Err(AuthError::Transport(reason))
            }
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("SessionManager")
            .field("state", &inner.state)
            .field("status", &inner.status)
            .field("backend", &self.client.backend_name())
            .finish()
    }
}
