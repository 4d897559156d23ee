//! Configuration types for the achievement sync system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::model::SessionCredentials;

/// Main sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Remote service configuration
    pub remote: RemoteConfig,

    /// Account credentials and hardcore flag
    pub credentials: CredentialsConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl SyncConfig {
    /// Create a configuration with default engine settings
    pub fn new(remote: RemoteConfig, credentials: CredentialsConfig) -> Self {
        Self {
            remote,
            credentials,
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.remote.validate()?;
        self.credentials.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Remote service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemoteConfig {
    /// RetroAchievements-compatible service
    RetroAchievements {
        /// Base URL (e.g., "https://retroachievements.org")
        host: String,
        /// Remote game ID
        game_id: u32,
    },

    /// Custom backend
    Custom {
        /// Factory name to use
        factory: String,
        /// Base URL handed to the backend
        host: String,
        /// Remote game ID
        game_id: u32,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl RemoteConfig {
    /// Validate the remote configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.host().is_empty() {
            return Err(crate::Error::config("Remote host cannot be empty"));
        }
        if !self.host().starts_with("https://") && !self.host().starts_with("http://") {
            return Err(crate::Error::config(format!(
                "Remote host must use HTTP or HTTPS scheme. Got: {}",
                self.host()
            )));
        }
        if self.game_id() == 0 {
            return Err(crate::Error::config("Remote game ID must be > 0"));
        }
        if let RemoteConfig::Custom { factory, .. } = self
            && factory.is_empty()
        {
            return Err(crate::Error::config("Custom backend factory cannot be empty"));
        }
        Ok(())
    }

    /// Get the backend type name
    pub fn type_name(&self) -> &str {
        match self {
            RemoteConfig::RetroAchievements { .. } => "retroachievements",
            RemoteConfig::Custom { factory, .. } => factory,
        }
    }

    pub fn host(&self) -> &str {
        match self {
            RemoteConfig::RetroAchievements { host, .. } | RemoteConfig::Custom { host, .. } => {
                host
            }
        }
    }

    pub fn game_id(&self) -> u32 {
        match self {
            RemoteConfig::RetroAchievements { game_id, .. }
            | RemoteConfig::Custom { game_id, .. } => *game_id,
        }
    }
}

/// Credentials read once at save-load
///
/// # Security
///
/// The Debug implementation does NOT expose the password.
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub username: String,
    pub password: String,
    /// Passed through to award requests unchanged
    #[serde(default)]
    pub hardcore: bool,
}

impl CredentialsConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>, hardcore: bool) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            hardcore,
        }
    }

    /// Validate that both username and password are present
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.username.trim().is_empty() {
            return Err(crate::Error::config("Username cannot be empty"));
        }
        if self.password.is_empty() {
            return Err(crate::Error::config("Password cannot be empty"));
        }
        Ok(())
    }

    pub fn session_credentials(&self) -> SessionCredentials {
        SessionCredentials::new(self.username.clone(), self.password.clone())
    }
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("hardcore", &self.hardcore)
            .finish()
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Host ticks between polls (the host runs at 60 ticks per second)
    #[serde(default = "default_ticks_per_poll")]
    pub ticks_per_poll: u64,

    /// Timeout applied to every login and award call (in seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How long shutdown waits for in-flight awards (in seconds)
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Capacity of the engine event channel
    ///
    /// When full, new engine events will be dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// User agent sent with every remote request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.ticks_per_poll == 0 {
            return Err(crate::Error::config("ticks_per_poll must be > 0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(crate::Error::config("request_timeout_secs must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event_channel_capacity must be > 0"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(crate::Error::config("user_agent cannot be empty"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ticks_per_poll: default_ticks_per_poll(),
            request_timeout_secs: default_request_timeout_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_ticks_per_poll() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_shutdown_grace_secs() -> u64 {
    5
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_user_agent() -> String {
    format!("achsync/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> SyncConfig {
        SyncConfig::new(
            RemoteConfig::RetroAchievements {
                host: "https://retroachievements.org".to_string(),
                game_id: 28_000,
            },
            CredentialsConfig::new("player", "hunter2", false),
        )
    }

    #[test]
    fn test_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_credentials() {
        let mut config = valid_config();
        config.credentials.password.clear();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.credentials.username = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_remote() {
        let mut config = valid_config();
        config.remote = RemoteConfig::RetroAchievements {
            host: "ftp://example.org".to_string(),
            game_id: 1,
        };
        assert!(config.validate().is_err());

        config.remote = RemoteConfig::RetroAchievements {
            host: "https://retroachievements.org".to_string(),
            game_id: 0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_engine_defaults_from_json() {
        let json = r#"{
            "remote": { "type": "retro_achievements", "host": "https://retroachievements.org", "game_id": 7 },
            "credentials": { "username": "player", "password": "pw" }
        }"#;
        let config: SyncConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.engine.ticks_per_poll, 60);
        assert_eq!(config.engine.request_timeout_secs, 10);
        assert!(!config.credentials.hardcore);
        assert_eq!(config.remote.type_name(), "retroachievements");
    }

    #[test]
    fn test_password_not_exposed_in_debug() {
        let debug_str = format!("{:?}", valid_config());
        assert!(!debug_str.contains("hunter2"));
    }
}
