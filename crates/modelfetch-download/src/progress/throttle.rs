//! Progress throttling.
//!
//! Rate-limits progress notifications so listeners see at most one per
//! interval for each task.

use std::time::{Duration, Instant};

/// Rate-limiter for progress notifications.
///
/// The first check always passes; afterwards a check passes only once the
/// interval has fully elapsed since the last passing check.
#[derive(Debug)]
pub struct ProgressThrottle {
    last_emit: Option<Instant>,
    min_interval: Duration,
}

impl ProgressThrottle {
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            last_emit: None,
            min_interval,
        }
    }

    /// Check if enough time has passed to emit another progress update.
    pub fn should_emit(&mut self) -> bool {
        self.should_emit_at(Instant::now())
    }

    pub(crate) fn should_emit_at(&mut self, now: Instant) -> bool {
        match self.last_emit {
            Some(last) if now.saturating_duration_since(last) < self.min_interval => false,
            _ => {
                self.last_emit = Some(now);
                true
            }
        }
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}
