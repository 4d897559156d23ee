// # Memory Host
//
// In-process implementation of AchievementHost.
//
// ## Purpose
//
// Lets an embedding application (or a test) push the player's unlocked
// achievements and host events directly, without any game bridge.

use async_trait::async_trait;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tokio_stream::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{AchievementHost, HostEvent, UNKNOWN_ACHIEVEMENT};
use crate::Error;
use crate::model::{LocalAchievementId, UnlockedSet};

#[derive(Debug, Default)]
struct HostState {
    unlocked: UnlockedSet,
    names: HashMap<LocalAchievementId, String>,
    /// Host-side unlocks waiting for the next `run_local_unlocks`
    pending: Vec<LocalAchievementId>,
}

/// In-memory host
///
/// # Example
///
/// ```rust,no_run
/// use achsync_core::{AchievementHost, HostEvent, MemoryHost};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let host = MemoryHost::new();
///     host.unlock(5).await;
///     host.emit(HostEvent::SaveLoaded);
///
///     let ids = host.unlocked_achievement_ids().await?;
///     assert_eq!(ids.len(), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryHost {
    state: Arc<RwLock<HostState>>,
    event_tx: mpsc::UnboundedSender<HostEvent>,
    event_rx: Arc<std::sync::Mutex<Option<mpsc::UnboundedReceiver<HostEvent>>>>,
}

impl MemoryHost {
    /// Create a host with nothing unlocked
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            state: Arc::new(RwLock::new(HostState::default())),
            event_tx,
            event_rx: Arc::new(std::sync::Mutex::new(Some(event_rx))),
        }
    }

    /// Create a host with the given achievements already unlocked
    pub async fn with_unlocked<I: IntoIterator<Item = u32>>(ids: I) -> Self {
        let host = Self::new();
        host.set_unlocked(ids).await;
        host
    }

    /// Mark an achievement as unlocked
    pub async fn unlock(&self, id: u32) {
        self.state.write().await.unlocked.insert(LocalAchievementId(id));
    }

    /// Replace the whole unlocked set (e.g. a different save)
    pub async fn set_unlocked<I: IntoIterator<Item = u32>>(&self, ids: I) {
        self.state.write().await.unlocked = ids.into_iter().collect();
    }

    /// Register a display name
    pub async fn set_name(&self, id: u32, name: impl Into<String>) {
        self.state
            .write()
            .await
            .names
            .insert(LocalAchievementId(id), name.into());
    }

    /// Queue a host-side unlock, applied on the next `run_local_unlocks`
    pub async fn queue_local_unlock(&self, id: u32) {
        self.state.write().await.pending.push(LocalAchievementId(id));
    }

    /// Emit a host event to the `watch()` stream
    pub fn emit(&self, event: HostEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AchievementHost for MemoryHost {
    async fn unlocked_achievement_ids(&self) -> Result<UnlockedSet, Error> {
        Ok(self.state.read().await.unlocked.clone())
    }

    async fn achievement_display_name(&self, id: LocalAchievementId) -> String {
        self.state
            .read()
            .await
            .names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_ACHIEVEMENT.to_string())
    }

    async fn run_local_unlocks(&self) -> Result<(), Error> {
        let mut guard = self.state.write().await;
        let pending = std::mem::take(&mut guard.pending);
        for id in pending {
            if guard.unlocked.insert(id) {
                tracing::debug!("Host unlocked achievement {} locally", id);
            }
        }
        Ok(())
    }

    fn watch(&self) -> Pin<Box<dyn Stream<Item = HostEvent> + Send + 'static>> {
        let rx = self
            .event_rx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();

        match rx {
            Some(rx) => Box::pin(UnboundedReceiverStream::new(rx)),
            None => {
                tracing::warn!("MemoryHost::watch() called more than once; returning an empty stream");
                Box::pin(tokio_stream::empty())
            }
        }
    }
}
