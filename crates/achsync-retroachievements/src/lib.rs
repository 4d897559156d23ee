// # RetroAchievements Backend
//
// This crate provides the RetroAchievements implementation of
// `RemoteSyncClient` for the achievement sync system.
//
// ## Implementation Status
//
// - ✅ One HTTP request per login and per award
// - ✅ Every failure classified as RemoteRejected or TransportFailure
// - ✅ HTTP timeout configured (the engine applies its own, shorter, bound too)
// - ✅ Dry-run mode for safe testing
// - ❌ NO retry logic (delivery is at-most-once, owned by SyncEngine)
// - ❌ NO session state (owned by SessionManager)
// - ❌ NO background tasks (dispatch is owned by SyncEngine)
//
// ## Trust Level: Untrusted (Remote Backend)
//
// **Allowed Capabilities**:
// - ✅ Perform HTTP/HTTPS calls to the configured host only
// - ✅ Parse service-specific responses
//
// **Forbidden Capabilities**:
// - ❌ Spawn tasks or threads
// - ❌ Retry, back off or cache
// - ❌ Log passwords or session tokens
//
// ## API Reference
//
// Both calls are form-encoded POSTs to `{host}/dorequest.php`:
//
// - Login: `r=login2&u=<user>&p=<password>&g=<game>`
//   → `{"Success":true,"User":"...","Token":"..."}`
// - Award: `r=awardachievement&u=<user>&t=<token>&a=<achievement>&h=<0|1>&g=<game>`
//   → `{"Success":true,"AchievementID":...}`
//
// A failed request answers `{"Success":false,"Error":"<reason>"}`, often
// with a 4xx status. A JSON body with `Success` is a remote verdict
// regardless of status code; anything else is a transport failure.

use achsync_core::client::RemoteClientFactory;
use achsync_core::{
    AwardOutcome, ClientRegistry, Error, LoginOutcome, RemoteAchievementId, RemoteConfig,
    RemoteSyncClient, RequestHeader, Result, SessionCredentials,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Request endpoint, relative to the configured host
const DOREQUEST_PATH: &str = "dorequest.php";

/// Default HTTP timeout for requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest body excerpt quoted in a failure reason
const MAX_BODY_EXCERPT: usize = 120;

/// Envelope shared by every `dorequest.php` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DoRequestResponse {
    success: bool,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Failures that never produced a remote verdict
#[derive(Debug, thiserror::Error)]
enum TransportError {
    #[error("HTTP request failed: {0}")]
    Send(#[from] reqwest::Error),

    #[error("unexpected response (HTTP {status}): {excerpt}")]
    Unparseable { status: u16, excerpt: String },
}

/// What a response body says, before it is turned into an outcome
enum Verdict {
    Accepted(DoRequestResponse),
    Rejected(String),
}

/// RetroAchievements client
///
/// # Trust Level: Untrusted
///
/// Stateless and single-shot. The session token travels in the
/// [`RequestHeader`] of every call.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the client will:
/// - Perform the login request
/// - Log the intended award request
/// - **NOT** actually award anything
///
/// # Security
///
/// Neither the password nor the token is ever logged.
pub struct RetroAchievementsClient {
    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, log awards instead of sending them
    dry_run: bool,
}

impl std::fmt::Debug for RetroAchievementsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetroAchievementsClient")
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl RetroAchievementsClient {
    /// Create a new client
    ///
    /// # Parameters
    ///
    /// - `timeout`: HTTP timeout for every request
    /// - `dry_run`: If true, awards are logged and reported as successful
    pub fn new(timeout: Duration, dry_run: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(client, dry_run))
    }

    /// Create a client in live mode with the default timeout
    pub fn new_live() -> Result<Self> {
        Self::new(DEFAULT_HTTP_TIMEOUT, false)
    }

    /// Create a client in dry-run mode with the default timeout
    pub fn new_dry_run() -> Result<Self> {
        Self::new(DEFAULT_HTTP_TIMEOUT, true)
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn with_client(client: reqwest::Client, dry_run: bool) -> Self {
        Self { client, dry_run }
    }

    fn endpoint(host: &str) -> String {
        format!("{}/{}", host.trim_end_matches('/'), DOREQUEST_PATH)
    }

    /// POST a form and return the status and raw body
    async fn post_form(
        &self,
        header: &RequestHeader,
        form: &[(&str, &str)],
    ) -> std::result::Result<(u16, String), TransportError> {
        let response = self
            .client
            .post(Self::endpoint(&header.host))
            .header(reqwest::header::USER_AGENT, &header.user_agent)
            .form(form)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok((status, body))
    }
}

/// Parse a response body into a verdict
///
/// A JSON object carrying `Success` is authoritative whatever the status
/// code says; anything else is a transport failure.
fn parse_verdict(status: u16, body: &str) -> std::result::Result<Verdict, TransportError> {
    let parsed: DoRequestResponse =
        serde_json::from_str(body).map_err(|_| TransportError::Unparseable {
            status,
            excerpt: excerpt(body),
        })?;

    if parsed.success {
        return Ok(Verdict::Accepted(parsed));
    }

    let reason = parsed
        .error
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| format!("request rejected (HTTP {})", status));
    Ok(Verdict::Rejected(reason))
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }
    match trimmed.char_indices().nth(MAX_BODY_EXCERPT) {
        Some((end, _)) => format!("{}...", &trimmed[..end]),
        None => trimmed.to_string(),
    }
}

/// Classify a login response
pub fn classify_login_response(status: u16, body: &str) -> LoginOutcome {
    match parse_verdict(status, body) {
        Ok(Verdict::Accepted(response)) => match response.token.filter(|t| !t.is_empty()) {
            Some(token) => LoginOutcome::Success { token },
            None => LoginOutcome::TransportFailure {
                reason: "login response did not include a token".to_string(),
            },
        },
        Ok(Verdict::Rejected(reason)) => LoginOutcome::RemoteRejected { reason },
        Err(e) => LoginOutcome::TransportFailure {
            reason: e.to_string(),
        },
    }
}

/// Classify an award response
pub fn classify_award_response(status: u16, body: &str) -> AwardOutcome {
    match parse_verdict(status, body) {
        Ok(Verdict::Accepted(_)) => AwardOutcome::Success,
        Ok(Verdict::Rejected(reason)) => AwardOutcome::RemoteRejected { reason },
        Err(e) => AwardOutcome::TransportFailure {
            reason: e.to_string(),
        },
    }
}

#[async_trait]
impl RemoteSyncClient for RetroAchievementsClient {
    /// Exchange credentials for a session token
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /dorequest.php
    /// r=login2&u=<user>&p=<password>&g=<game>
    /// ```
    async fn login(&self, creds: &SessionCredentials, header: &RequestHeader) -> LoginOutcome {
        tracing::debug!("Logging in to {} as {}", header.host, creds.username);

        let game = header.game_id.to_string();
        let form = [
            ("r", "login2"),
            ("u", creds.username.as_str()),
            ("p", creds.password.as_str()),
            ("g", game.as_str()),
        ];

        match self.post_form(header, &form).await {
            Ok((status, body)) => classify_login_response(status, &body),
            Err(e) => LoginOutcome::TransportFailure {
                reason: e.to_string(),
            },
        }
    }

    /// Award one achievement
    ///
    /// In dry-run mode, logs the intended request and reports success.
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /dorequest.php
    /// r=awardachievement&u=<user>&t=<token>&a=<id>&h=<0|1>&g=<game>
    /// ```
    async fn award_achievement(
        &self,
        remote_id: RemoteAchievementId,
        header: &RequestHeader,
    ) -> AwardOutcome {
        let Some(token) = header.token.as_deref() else {
            return AwardOutcome::RemoteRejected {
                reason: "no session token".to_string(),
            };
        };

        let achievement = remote_id.to_string();
        let game = header.game_id.to_string();
        let hardcore = if header.hardcore { "1" } else { "0" };

        tracing::info!(
            "Awarding achievement {} to {} (hardcore: {}) [mode: {}]",
            remote_id,
            header.username,
            header.hardcore,
            if self.dry_run { "DRY-RUN" } else { "LIVE" }
        );

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send POST to {} with r=awardachievement, a={}, h={}",
                Self::endpoint(&header.host),
                achievement,
                hardcore
            );
            return AwardOutcome::Success;
        }

        let form = [
            ("r", "awardachievement"),
            ("u", header.username.as_str()),
            ("t", token),
            ("a", achievement.as_str()),
            ("h", hardcore),
            ("g", game.as_str()),
        ];

        match self.post_form(header, &form).await {
            Ok((status, body)) => classify_award_response(status, &body),
            Err(e) => AwardOutcome::TransportFailure {
                reason: e.to_string(),
            },
        }
    }

    fn backend_name(&self) -> &'static str {
        "retroachievements"
    }
}

/// Factory for creating RetroAchievements clients
pub struct RetroAchievementsFactory;

impl RemoteClientFactory for RetroAchievementsFactory {
    fn create(&self, config: &RemoteConfig) -> Result<Box<dyn RemoteSyncClient>> {
        match config {
            RemoteConfig::RetroAchievements { .. } => {
                // Check for dry-run mode environment variable
                let dry_run = std::env::var("ACHSYNC_MODE")
                    .unwrap_or_default()
                    .eq_ignore_ascii_case("dry-run");

                if dry_run {
                    tracing::warn!(
                        "RetroAchievements backend running in DRY-RUN mode - no awards will be sent"
                    );
                }

                Ok(Box::new(RetroAchievementsClient::new(
                    DEFAULT_HTTP_TIMEOUT,
                    dry_run,
                )?))
            }
            _ => Err(Error::config("Invalid config for RetroAchievements backend")),
        }
    }
}

/// Register the RetroAchievements backend with a registry
///
/// # Example
///
/// ```rust
/// use achsync_core::ClientRegistry;
///
/// let registry = ClientRegistry::new();
/// achsync_retroachievements::register(&registry);
/// assert!(registry.has_client("retroachievements"));
/// ```
pub fn register(registry: &ClientRegistry) {
    registry.register_client("retroachievements", Box::new(RetroAchievementsFactory));
}
