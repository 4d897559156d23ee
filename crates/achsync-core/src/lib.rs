// # achsync-core
//
// Core library for mirroring a host application's unlocked achievements
// to a remote achievement-tracking service.
//
// ## Architecture Overview
//
// - **AchievementHost**: Trait for the host application (poll source + tick/save events)
// - **RemoteSyncClient**: Trait for the remote service backend (login, award)
// - **SessionManager**: Owns the authentication state and the single-flight login
// - **DeltaTracker**: Computes newly unlocked achievements against a baseline
// - **MappingTable**: Translates local achievement IDs to remote IDs
// - **SyncEngine**: Orchestrates the poll → diff → map → award flow
// - **ClientRegistry**: Plugin-based registry for remote backends
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Sync logic is separate from host and backend implementations
// 2. **Non-blocking**: Network calls run as background tasks, never on the poll path
// 3. **Plugin-Based**: Backends are registered dynamically, no hard-coded if-else
// 4. **Library-First**: All core functionality can be used as a library
// 5. **At-most-once**: A detected delta is attempted once and never duplicated

pub mod client;
pub mod config;
pub mod delta;
pub mod engine;
pub mod error;
pub mod host;
pub mod mapping;
pub mod model;
pub mod registry;
pub mod session;
pub mod sink;
pub mod whitelist;

// Re-export core types for convenience
pub use client::{AwardOutcome, LoginOutcome, RemoteSyncClient, RequestHeader};
pub use config::{CredentialsConfig, EngineConfig, RemoteConfig, SyncConfig};
pub use delta::DeltaTracker;
pub use engine::{EngineEvent, PollReport, SyncEngine};
pub use error::{AuthError, Error, Result};
pub use host::{AchievementHost, FileHost, HostEvent, MemoryHost};
pub use mapping::MappingTable;
pub use model::{
    Baseline, DeltaBatch, LocalAchievementId, RemoteAchievementId, SessionCredentials,
    SessionState, UnlockedSet,
};
pub use registry::ClientRegistry;
pub use session::{LoginResult, SessionManager, SessionSettings, SessionStatus};
pub use sink::{NullStatusSink, StatusSink, TracingStatusSink};
pub use whitelist::ModWhitelist;
