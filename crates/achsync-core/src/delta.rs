//! Delta detection against the remembered baseline
//!
//! The tracker holds no state of its own. The [`Baseline`] is owned by the
//! [`SyncEngine`](crate::engine::SyncEngine), which decides when an ID is
//! committed relative to the remote call.

use crate::model::{Baseline, DeltaBatch, UnlockedSet};

/// Computes newly unlocked achievements
#[derive(Debug, Clone, Copy, Default)]
pub struct DeltaTracker;

impl DeltaTracker {
    /// Every ID in `current` that is absent from `baseline`, once each,
    /// in the host's iteration order.
    pub fn diff(baseline: &Baseline, current: &UnlockedSet) -> DeltaBatch {
        DeltaBatch(current.iter().filter(|id| !baseline.contains(*id)).collect())
    }
}
