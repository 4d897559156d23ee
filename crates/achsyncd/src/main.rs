// # achsyncd - Achievement Sync Daemon
//
// This is a THIN integration layer. All sync logic lives in achsync-core;
// this binary only wires collaborators together.
//
// The achsyncd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Refusing to start when a non-whitelisted mod is installed
// 3. Registering remote backends
// 4. Starting the sync engine over a file-backed host
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Account
// - `ACHSYNC_USERNAME`: Remote account name (required)
// - `ACHSYNC_PASSWORD`: Remote account password (required)
// - `ACHSYNC_HARDCORE`: Hardcore flag passed to awards (true/false, default false)
//
// ### Remote
// - `ACHSYNC_REMOTE_HOST`: Service base URL (default https://retroachievements.org)
// - `ACHSYNC_GAME_ID`: Remote game ID (required)
// - `ACHSYNC_REQUEST_TIMEOUT_SECS`: Per-call timeout (default 10)
// - `ACHSYNC_MODE`: Set to `dry-run` to log awards instead of sending them
//
// ### Host
// - `ACHSYNC_SAVE_PATH`: JSON save snapshot written by the game bridge (required)
// - `ACHSYNC_MAPPING_PATH`: JSON local → remote ID table (required)
// - `ACHSYNC_TICKS_PER_SECOND`: Host tick rate; one poll per second (default 60)
// - `ACHSYNC_INSTALLED_MODS`: Comma-separated IDs of installed mods
//
// ### Logging
// - `ACHSYNC_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export ACHSYNC_USERNAME=player
// export ACHSYNC_PASSWORD=secret
// export ACHSYNC_GAME_ID=28000
// export ACHSYNC_SAVE_PATH=/run/achsync/save.json
// export ACHSYNC_MAPPING_PATH=/etc/achsync/mapping.json
// export ACHSYNC_INSTALLED_MODS=Pathoschild.SMAPI,CJBok.CheatsMenu
//
// achsyncd
// ```

use achsync_core::host::MAX_TICKS_PER_SECOND;
use achsync_core::{
    ClientRegistry, CredentialsConfig, EngineConfig, EngineEvent, FileHost, MappingTable,
    ModWhitelist, RemoteConfig, SyncConfig, SyncEngine, TracingStatusSink,
};
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

const DEFAULT_REMOTE_HOST: &str = "https://retroachievements.org";
const DEFAULT_TICKS_PER_SECOND: u32 = 60;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
/// - 3: A non-whitelisted mod is installed
#[derive(Debug, Clone, Copy)]
enum AchsyncExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
    /// Integration disabled by the mod whitelist
    NotWhitelisted = 3,
}

impl From<AchsyncExitCode> for ExitCode {
    fn from(code: AchsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    username: String,
    password: String,
    hardcore: bool,
    remote_host: String,
    game_id: u32,
    request_timeout_secs: Option<u64>,
    save_path: PathBuf,
    mapping_path: PathBuf,
    ticks_per_second: u32,
    installed_mods: Vec<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            username: env::var("ACHSYNC_USERNAME").unwrap_or_default(),
            password: env::var("ACHSYNC_PASSWORD").unwrap_or_default(),
            hardcore: match env::var("ACHSYNC_HARDCORE") {
                Ok(value) => parse_bool(&value).context("ACHSYNC_HARDCORE")?,
                Err(_) => false,
            },
            remote_host: env::var("ACHSYNC_REMOTE_HOST")
                .unwrap_or_else(|_| DEFAULT_REMOTE_HOST.to_string()),
            game_id: env::var("ACHSYNC_GAME_ID")
                .context("ACHSYNC_GAME_ID is required")?
                .trim()
                .parse()
                .context("ACHSYNC_GAME_ID must be a positive integer")?,
            request_timeout_secs: env::var("ACHSYNC_REQUEST_TIMEOUT_SECS")
                .ok()
                .map(|s| s.trim().parse())
                .transpose()
                .context("ACHSYNC_REQUEST_TIMEOUT_SECS must be an integer")?,
            save_path: env::var("ACHSYNC_SAVE_PATH")
                .context("ACHSYNC_SAVE_PATH is required")?
                .into(),
            mapping_path: env::var("ACHSYNC_MAPPING_PATH")
                .context("ACHSYNC_MAPPING_PATH is required")?
                .into(),
            ticks_per_second: env::var("ACHSYNC_TICKS_PER_SECOND")
                .ok()
                .map(|s| s.trim().parse())
                .transpose()
                .context("ACHSYNC_TICKS_PER_SECOND must be an integer")?
                .unwrap_or(DEFAULT_TICKS_PER_SECOND),
            installed_mods: parse_mod_list(&env::var("ACHSYNC_INSTALLED_MODS").unwrap_or_default()),
            log_level: env::var("ACHSYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            anyhow::bail!(
                "ACHSYNC_USERNAME is required. \
                Set it via: export ACHSYNC_USERNAME=your_name"
            );
        }

        if self.password.is_empty() {
            anyhow::bail!(
                "ACHSYNC_PASSWORD is required. \
                Set it via: export ACHSYNC_PASSWORD=your_password"
            );
        }

        if self.game_id == 0 {
            anyhow::bail!("ACHSYNC_GAME_ID must be > 0");
        }

        if !self.remote_host.starts_with("https://") && !self.remote_host.starts_with("http://") {
            anyhow::bail!(
                "ACHSYNC_REMOTE_HOST must use HTTP or HTTPS scheme. Got: {}",
                self.remote_host
            );
        }

        if self.remote_host.starts_with("http://") {
            eprintln!(
                "WARNING: ACHSYNC_REMOTE_HOST uses HTTP (not HTTPS). \
                Credentials will be sent in clear text."
            );
        }

        if let Some(timeout) = self.request_timeout_secs
            && !(1..=120).contains(&timeout)
        {
            anyhow::bail!(
                "ACHSYNC_REQUEST_TIMEOUT_SECS must be between 1 and 120 seconds. Got: {}",
                timeout
            );
        }

        if !(1..=MAX_TICKS_PER_SECOND).contains(&self.ticks_per_second) {
            anyhow::bail!(
                "ACHSYNC_TICKS_PER_SECOND must be between 1 and {}. Got: {}",
                MAX_TICKS_PER_SECOND,
                self.ticks_per_second
            );
        }

        if !self.mapping_path.is_file() {
            anyhow::bail!(
                "ACHSYNC_MAPPING_PATH does not point to a file: {}",
                self.mapping_path.display()
            );
        }

        if let Some(parent) = self.save_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            anyhow::bail!(
                "ACHSYNC_SAVE_PATH parent directory does not exist: {}",
                parent.display()
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "ACHSYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Build the core configuration
    fn sync_config(&self) -> SyncConfig {
        let mut engine = EngineConfig {
            ticks_per_poll: u64::from(self.ticks_per_second),
            ..EngineConfig::default()
        };
        if let Some(timeout) = self.request_timeout_secs {
            engine.request_timeout_secs = timeout;
        }

        SyncConfig {
            remote: RemoteConfig::RetroAchievements {
                host: self.remote_host.clone(),
                game_id: self.game_id,
            },
            credentials: CredentialsConfig::new(&self.username, &self.password, self.hardcore),
            engine,
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected true or false, got '{}'", other),
    }
}

fn parse_mod_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return AchsyncExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return AchsyncExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return AchsyncExitCode::ConfigError.into();
    }

    info!("Starting achsyncd daemon");

    // The whitelist gate runs before any sync component exists
    let whitelist = ModWhitelist::default();
    if let Err(e) = whitelist.check(config.installed_mods.iter().map(String::as_str)) {
        error!("Achievement sync disabled: {}", e);
        return AchsyncExitCode::NotWhitelisted.into();
    }
    info!("All installed mods are whitelisted. Running normally.");

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return AchsyncExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            AchsyncExitCode::RuntimeError
        } else {
            AchsyncExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let registry = ClientRegistry::new();

    #[cfg(feature = "retroachievements")]
    {
        info!("Registering RetroAchievements backend");
        achsync_retroachievements::register(&registry);
    }

    let sync_config = config.sync_config();
    let client = registry
        .create_client(&sync_config.remote)
        .context("Failed to create remote backend")?;
    info!(
        "Remote backend: {} at {} (game {})",
        client.backend_name(),
        sync_config.remote.host(),
        sync_config.remote.game_id()
    );

    let mapping = MappingTable::load(&config.mapping_path)
        .await
        .context("Failed to load mapping table")?;
    info!("Loaded {} achievement mapping(s)", mapping.len());

    let host = FileHost::new(&config.save_path, config.ticks_per_second);
    info!("Watching save snapshot {}", config.save_path.display());

    let (mut engine, events) = SyncEngine::new(
        Arc::new(host),
        Arc::from(client),
        mapping,
        Arc::new(TracingStatusSink),
        sync_config,
    )?;

    tokio::spawn(log_events(events));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Shutdown signal error: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    info!("Starting sync engine");
    engine.run_with_shutdown(Some(shutdown_rx)).await?;
    info!("Shutting down daemon");

    Ok(())
}

/// Drain engine events into the debug log
async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        debug!(?event, "engine event");
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("TRUE").unwrap());
        assert!(parse_bool(" 1 ").unwrap());
        assert!(!parse_bool("off").unwrap());
        assert!(!parse_bool("").unwrap());
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn test_parse_mod_list() {
        assert_eq!(
            parse_mod_list("Pathoschild.SMAPI, CJBok.CheatsMenu,,"),
            vec!["Pathoschild.SMAPI", "CJBok.CheatsMenu"]
        );
        assert!(parse_mod_list("").is_empty());
    }

    #[test]
    fn test_sync_config_polls_once_per_second() {
        let config = Config {
            username: "player".to_string(),
            password: "pw".to_string(),
            hardcore: true,
            remote_host: DEFAULT_REMOTE_HOST.to_string(),
            game_id: 28_000,
            request_timeout_secs: Some(5),
            save_path: PathBuf::from("save.json"),
            mapping_path: PathBuf::from("mapping.json"),
            ticks_per_second: 30,
            installed_mods: Vec::new(),
            log_level: "info".to_string(),
        };

        let sync_config = config.sync_config();
        assert!(sync_config.validate().is_ok());
        assert_eq!(sync_config.engine.ticks_per_poll, 30);
        assert_eq!(sync_config.engine.request_timeout_secs, 5);
        assert!(sync_config.credentials.hardcore);
        assert_eq!(sync_config.remote.type_name(), "retroachievements");
    }
}
