//! Download listener port.
//!
//! Listeners observe lifecycle events without coupling the manager to a
//! delivery mechanism (terminal UI, channels, JSON lines).

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::download::DownloadEvent;

/// Handle returned when a listener is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Allocate a process-unique listener id.
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Port for observing download events.
///
/// Called synchronously from worker tasks, so implementations must not
/// block. A panicking listener is isolated by the manager and never affects
/// the download.
pub trait DownloadListener: Send + Sync {
    fn on_event(&self, event: &DownloadEvent);
}

/// A listener that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl DownloadListener for NoopListener {
    fn on_event(&self, _event: &DownloadEvent) {
        // Intentionally do nothing
    }
}
