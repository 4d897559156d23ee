// # Remote Sync Client Trait
//
// Defines the interface for the remote achievement-tracking service.
//
// ## Implementations
//
// - RetroAchievements: `achsync-retroachievements` crate
// - Tests: counting mock clients in `tests/common`
//
// ## Usage
//
// ```rust,ignore
// use achsync_core::{RemoteSyncClient, AwardOutcome};
//
// let header = session_state.header("achsync/0.1");
// match client.award_achievement(RemoteAchievementId(483647), &header).await {
//     AwardOutcome::Success => {}
//     AwardOutcome::RemoteRejected { reason } => warn!("rejected: {}", reason),
//     AwardOutcome::TransportFailure { reason } => warn!("transport: {}", reason),
// }
// ```

use async_trait::async_trait;
use std::fmt;

use crate::model::{RemoteAchievementId, SessionCredentials};

/// Everything a backend needs to address the remote service
///
/// `token` is `None` for login and must be `Some` for awards; the engine
/// only dispatches awards from an authenticated session.
#[derive(Clone, PartialEq, Eq)]
pub struct RequestHeader {
    /// Base URL of the remote service
    pub host: String,
    /// Remote game identifier
    pub game_id: u32,
    /// Account name
    pub username: String,
    /// Session token (⚠️ NEVER log this value)
    pub token: Option<String>,
    /// Hardcore flag, passed through unchanged
    pub hardcore: bool,
    /// User agent sent with every request
    pub user_agent: String,
}

impl fmt::Debug for RequestHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHeader")
            .field("host", &self.host)
            .field("game_id", &self.game_id)
            .field("username", &self.username)
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .field("hardcore", &self.hardcore)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Result of a login round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Credentials accepted; carries the opaque session token
    Success {
        token: String,
    },
    /// Valid response reporting an explicit failure (e.g. bad password)
    RemoteRejected {
        reason: String,
    },
    /// No interpretable response (connection fault, timeout, garbage body)
    TransportFailure {
        reason: String,
    },
}

/// Result of an award round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwardOutcome {
    /// Award recorded by the remote service
    Success,
    /// Valid response reporting an explicit failure (includes rejected tokens)
    RemoteRejected {
        reason: String,
    },
    /// No interpretable response (connection fault, timeout, garbage body)
    TransportFailure {
        reason: String,
    },
}

impl AwardOutcome {
    /// Convert a failed outcome into the matching crate error
    pub fn into_result(self) -> crate::Result<()> {
        match self {
            AwardOutcome::Success => Ok(()),
            AwardOutcome::RemoteRejected { reason } => Err(crate::Error::award_rejected(reason)),
            AwardOutcome::TransportFailure { reason } => {
                Err(crate::Error::award_transport(reason))
            }
        }
    }
}

/// Trait for remote service backends
///
/// # Trust Level: Untrusted
///
/// Backends are **untrusted** components with strict limitations:
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS calls to the configured host only
/// - ✅ Parse service-specific responses and classify them
///
/// ## Forbidden Capabilities
/// - ❌ Spawn tasks or threads (dispatch is owned by `SyncEngine`)
/// - ❌ Implement retry logic (delivery is at-most-once by design of the engine)
/// - ❌ Touch the baseline or session state (owned by `SyncEngine` / `SessionManager`)
/// - ❌ Log credentials or tokens
///
/// Every failure is returned as an outcome variant, never as a panic. The
/// caller applies the per-call timeout.
#[async_trait]
pub trait RemoteSyncClient: Send + Sync {
    /// Exchange credentials for a session token
    ///
    /// Uses `host`, `game_id`, `username` and `user_agent` from the header;
    /// the header's token is ignored.
    async fn login(&self, creds: &SessionCredentials, header: &RequestHeader) -> LoginOutcome;

    /// Award one achievement to the authenticated user
    ///
    /// A response rejecting the token is reported as `RemoteRejected`.
    async fn award_achievement(
        &self,
        remote_id: RemoteAchievementId,
        header: &RequestHeader,
    ) -> AwardOutcome;

    /// Backend name (for logging/debugging)
    fn backend_name(&self) -> &'static str;
}

/// Helper trait for constructing backends from configuration
pub trait RemoteClientFactory: Send + Sync {
    /// Create a RemoteSyncClient instance from configuration
    fn create(
        &self,
        config: &crate::config::RemoteConfig,
    ) -> Result<Box<dyn RemoteSyncClient>, crate::Error>;
}
