//! Transfer speed and ETA estimation.

use std::time::Instant;

/// EWA smoothing factor (20% instantaneous speed, 80% history).
const EWA_SMOOTHING: f64 = 0.2;

/// Exponentially weighted speed estimate for one run of a task.
#[derive(Debug)]
pub struct SpeedTracker {
    last_bytes: u64,
    last_time: Instant,
    ewa_speed: f64,
    first_update: bool,
}

impl SpeedTracker {
    /// Start tracking from `start_bytes` (non-zero when resuming).
    pub fn new(start_bytes: u64) -> Self {
        Self::starting_at(start_bytes, Instant::now())
    }

    pub(crate) const fn starting_at(start_bytes: u64, now: Instant) -> Self {
        Self {
            last_bytes: start_bytes,
            last_time: now,
            ewa_speed: 0.0,
            first_update: true,
        }
    }

    /// Record a sample and return `(bytes_per_second, eta_seconds)`.
    ///
    /// The ETA is `None` when the total is unknown or no speed is measured.
    pub fn sample(&mut self, downloaded: u64, total: i64) -> (f64, Option<u64>) {
        self.sample_at(downloaded, total, Instant::now())
    }

    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn sample_at(&mut self, downloaded: u64, total: i64, now: Instant) -> (f64, Option<u64>) {
        let elapsed = now.saturating_duration_since(self.last_time).as_secs_f64();
        if elapsed > 0.0 {
            let bytes_delta = downloaded.saturating_sub(self.last_bytes);
            let instant_speed = bytes_delta as f64 / elapsed;

            self.ewa_speed = if self.first_update {
                instant_speed
            } else {
                EWA_SMOOTHING.mul_add(instant_speed, (1.0 - EWA_SMOOTHING) * self.ewa_speed)
            };
            self.first_update = false;
            self.last_bytes = downloaded;
            self.last_time = now;
        }

        (self.ewa_speed, self.eta(downloaded, total))
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn eta(&self, downloaded: u64, total: i64) -> Option<u64> {
        let total = u64::try_from(total).ok().filter(|t| *t > 0)?;
        if self.ewa_speed <= 0.0 || downloaded >= total {
            return None;
        }
        let remaining = total - downloaded;
        Some((remaining as f64 / self.ewa_speed).ceil() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_first_sample_uses_instant_speed() {
        let start = Instant::now();
        let mut tracker = SpeedTracker::starting_at(0, start);
        let (speed, eta) = tracker.sample_at(1000, 3000, start + Duration::from_secs(1));
        assert!((speed - 1000.0).abs() < 1e-6);
        assert_eq!(eta, Some(2));
    }

    #[test]
    fn test_subsequent_samples_are_smoothed() {
        let start = Instant::now();
        let mut tracker = SpeedTracker::starting_at(0, start);
        tracker.sample_at(1000, -1, start + Duration::from_secs(1));
        let (speed, eta) = tracker.sample_at(3000, -1, start + Duration::from_secs(2));
        // 0.2 * 2000 + 0.8 * 1000
        assert!((speed - 1200.0).abs() < 1e-6);
        assert_eq!(eta, None);
    }

    #[test]
    fn test_resume_offset_is_not_counted_as_speed() {
        let start = Instant::now();
        let mut tracker = SpeedTracker::starting_at(5000, start);
        let (speed, _) = tracker.sample_at(5500, 10_000, start + Duration::from_secs(1));
        assert!((speed - 500.0).abs() < 1e-6);
    }

    #[test]
    fn test_no_elapsed_time_keeps_previous_estimate() {
        let start = Instant::now();
        let mut tracker = SpeedTracker::starting_at(0, start);
        let (speed, eta) = tracker.sample_at(100, 1000, start);
        assert!(speed.abs() < f64::EPSILON);
        assert_eq!(eta, None);
    }
}
