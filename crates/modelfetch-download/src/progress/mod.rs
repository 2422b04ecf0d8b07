//! Progress tracking and throttling.
//!
//! This module handles rate-limiting of progress notifications and the
//! speed/ETA estimate attached to them.

mod speed;
mod throttle;

pub use speed::SpeedTracker;
pub use throttle::ProgressThrottle;
