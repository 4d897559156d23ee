//! Status sinks
//!
//! A [`StatusSink`] is the write-only channel for human-readable status
//! lines shown inside the host (chat box, HUD toast). Structured logging
//! goes through `tracing` separately.

/// Write-only sink for human-readable status strings
pub trait StatusSink: Send + Sync {
    /// Show a message to the player
    fn notify(&self, message: &str);
}

/// Forwards status lines to `tracing` on the `achsync::status` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStatusSink;

impl StatusSink for TracingStatusSink {
    fn notify(&self, message: &str) {
        tracing::info!(target: "achsync::status", "{}", message);
    }
}

/// Discards every message
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStatusSink;

impl StatusSink for NullStatusSink {
    fn notify(&self, _message: &str) {}
}
