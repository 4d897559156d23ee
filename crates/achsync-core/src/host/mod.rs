// # Achievement Host Trait
//
// Defines the interface to the host application whose achievements are mirrored.
//
// ## Implementations
//
// - In-memory: [`MemoryHost`] for embedding and tests
// - File-backed: [`FileHost`] reading a JSON save snapshot written by a game bridge
//
// ## Usage
//
// ```rust,ignore
// use achsync_core::{AchievementHost, HostEvent};
// use tokio_stream::StreamExt;
//
// let mut events = host.watch();
// while let Some(event) = events.next().await {
//     match event {
//         HostEvent::SaveLoaded => { /* capture baseline */ }
//         HostEvent::Tick(n) => { /* poll every N ticks */ }
//     }
// }
// ```

pub mod file;
pub mod memory;

pub use file::{FileHost, MAX_TICKS_PER_SECOND};
pub use memory::MemoryHost;

use async_trait::async_trait;
use std::pin::Pin;
use tokio_stream::Stream;

use crate::model::{LocalAchievementId, UnlockedSet};

/// Display name used when the host has no data for an achievement
pub const UNKNOWN_ACHIEVEMENT: &str = "Unknown Achievement";

/// Lifecycle and timing events emitted by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// A save was loaded (new or different unlocked set)
    SaveLoaded,
    /// One host update tick, numbered from 1
    Tick(u64),
}

/// Trait for host application implementations
///
/// The host is a read-only poll source plus an event stream. It never
/// decides what to sync.
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ Read the host's own achievement storage
/// - ✅ Apply host-side unlock rules in [`run_local_unlocks`](AchievementHost::run_local_unlocks)
/// - ⚠️ Spawn a task ONLY to drive the event stream returned by `watch()`
///
/// ## Forbidden Capabilities
/// - ❌ Call the remote service (use `RemoteSyncClient`)
/// - ❌ Touch the baseline or session (owned by `SyncEngine`)
#[async_trait]
pub trait AchievementHost: Send + Sync {
    /// Achievements the player currently holds, in host iteration order
    async fn unlocked_achievement_ids(&self) -> Result<UnlockedSet, crate::Error>;

    /// Human-readable name; [`UNKNOWN_ACHIEVEMENT`] when the host has none
    async fn achievement_display_name(&self, id: LocalAchievementId) -> String;

    /// Apply host-side unlock triggers (e.g. "first crop shipped")
    ///
    /// Called by the engine strictly before reading the unlocked set of the
    /// same tick, so anything written here takes part in that tick's delta.
    async fn run_local_unlocks(&self) -> Result<(), crate::Error> {
        Ok(())
    }

    /// Stream of save-load and tick events
    ///
    /// Must be cancellation-safe: dropping the stream releases resources.
    fn watch(&self) -> Pin<Box<dyn Stream<Item = HostEvent> + Send + 'static>>;
}

/// Extract the display name from raw host achievement data
///
/// Host data is `^`-separated with the name first (`"Gofer^Ship 15 items^..."`).
pub fn display_name_from_raw(raw: &str) -> String {
    let name = raw.split('^').next().unwrap_or_default().trim();
    if name.is_empty() {
        UNKNOWN_ACHIEVEMENT.to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_is_first_field() {
        assert_eq!(display_name_from_raw("Greenhorn^Earn 15,000g^true"), "Greenhorn");
        assert_eq!(display_name_from_raw("Cowpoke"), "Cowpoke");
        assert_eq!(display_name_from_raw(""), UNKNOWN_ACHIEVEMENT);
        assert_eq!(display_name_from_raw("^desc"), UNKNOWN_ACHIEVEMENT);
    }
}
