// # File Host
//
// File-backed implementation of AchievementHost.
//
// ## Purpose
//
// A game-side bridge writes a JSON snapshot of the current save; this host
// reads it on every poll and synthesizes the tick and save-load events the
// engine expects.
//
// ## File Format
//
// ```json
// {
//   "save_id": "Farm_128736",
//   "unlocked": [0, 5, 12],
//   "names": {
//     "5": "Gofer^Ship 15 different items",
//     "12": "Greenhorn^Earn 15,000g"
//   }
// }
// ```
//
// `names` holds raw host data; the display name is the first `^` field.
// A change of `save_id` is reported as `HostEvent::SaveLoaded`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::fs;
use tokio::sync::{RwLock, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};

use super::{AchievementHost, HostEvent, UNKNOWN_ACHIEVEMENT, display_name_from_raw};
use crate::Error;
use crate::model::{LocalAchievementId, UnlockedSet};

/// Capacity of the host event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Upper bound on the tick rate
pub const MAX_TICKS_PER_SECOND: u32 = 1000;

/// Serializable snapshot written by the game bridge
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SaveSnapshot {
    /// Identifies the loaded save
    #[serde(default)]
    pub save_id: String,
    /// Unlocked achievements in host order
    #[serde(default)]
    pub unlocked: Vec<u32>,
    /// Raw achievement data keyed by local ID
    #[serde(default)]
    pub names: HashMap<u32, String>,
}

/// Item sent by the watch task, before the consumer sees it
enum WatchItem {
    Save(String),
    Tick(u64),
}

/// File-backed host
///
/// Reads made while the file holds a save the event consumer has not yet
/// received `SaveLoaded` for fail with `Error::Host`, so a poll can never
/// diff a new save against the previous save's baseline.
///
/// # Example
///
/// ```rust,no_run
/// use achsync_core::{AchievementHost, FileHost};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let host = FileHost::new("/run/achsync/save.json", 60);
///     let ids = host.unlocked_achievement_ids().await?;
///     println!("{} achievements unlocked", ids.len());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileHost {
    path: PathBuf,
    ticks_per_second: u32,
    /// Names from the most recent successful read
    names: Arc<RwLock<HashMap<LocalAchievementId, String>>>,
    /// Save whose `SaveLoaded` the consumer has pulled from `watch()`
    delivered_save: Arc<Mutex<Option<String>>>,
}

impl FileHost {
    /// Create a host reading `path`, ticking `ticks_per_second` times a second
    ///
    /// The rate is clamped to `1..=MAX_TICKS_PER_SECOND`.
    pub fn new<P: AsRef<Path>>(path: P, ticks_per_second: u32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ticks_per_second: ticks_per_second.clamp(1, MAX_TICKS_PER_SECOND),
            names: Arc::new(RwLock::new(HashMap::new())),
            delivered_save: Arc::new(Mutex::new(None)),
        }
    }

    /// Read and parse the snapshot file
    pub async fn read_snapshot(path: &Path) -> Result<SaveSnapshot, Error> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::host(format!("Failed to read save snapshot {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            Error::host(format!(
                "Failed to parse save snapshot {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Effective tick rate after clamping
    pub fn ticks_per_second(&self) -> u32 {
        self.ticks_per_second
    }

    fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / self.ticks_per_second
    }

    fn delivered_save(&self) -> Option<String> {
        self.delivered_save
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AchievementHost for FileHost {
    async fn unlocked_achievement_ids(&self) -> Result<UnlockedSet, Error> {
        let snapshot = Self::read_snapshot(&self.path).await?;

        if let Some(delivered) = self.delivered_save()
            && delivered != snapshot.save_id
        {
            return Err(Error::host(format!(
                "Save {} is not loaded yet (current: {})",
                snapshot.save_id, delivered
            )));
        }

        let names = snapshot
            .names
            .iter()
            .map(|(id, raw)| (LocalAchievementId(*id), display_name_from_raw(raw)))
            .collect();
        *self.names.write().await = names;

        Ok(snapshot.unlocked.into_iter().collect())
    }

    async fn achievement_display_name(&self, id: LocalAchievementId) -> String {
        self.names
            .read()
            .await
            .get(&id)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_ACHIEVEMENT.to_string())
    }

    fn watch(&self) -> Pin<Box<dyn Stream<Item = HostEvent> + Send + 'static>> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let path = self.path.clone();
        let mut interval = tokio::time::interval(self.tick_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // Ends when the receiver is dropped
        tokio::spawn(async move {
            let mut current_save: Option<String> = None;
            let mut tick: u64 = 0;

            loop {
                interval.tick().await;

                // The save is checked before every tick is forwarded
                match Self::read_snapshot(&path).await {
                    Ok(snapshot) if current_save.as_deref() != Some(snapshot.save_id.as_str()) => {
                        tracing::info!("Save loaded: {}", snapshot.save_id);
                        current_save = Some(snapshot.save_id.clone());
                        if tx.send(WatchItem::Save(snapshot.save_id)).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => tracing::debug!("Save snapshot unavailable: {}", e),
                }

                // Ticks before the first save are not forwarded
                if current_save.is_none() {
                    continue;
                }

                tick += 1;
                if tx.send(WatchItem::Tick(tick)).await.is_err() {
                    break;
                }
            }

            tracing::debug!("FileHost event stream closed");
        });

        // Marked as delivered only once the consumer pulls the event
        let delivered_save = Arc::clone(&self.delivered_save);
        Box::pin(ReceiverStream::new(rx).map(move |item| match item {
            WatchItem::Save(save_id) => {
                *delivered_save
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(save_id);
                HostEvent::SaveLoaded
            }
            WatchItem::Tick(tick) => HostEvent::Tick(tick),
        }))
    }
}
