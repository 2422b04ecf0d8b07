//! Read-only snapshot DTOs for queries and UIs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DownloadErrorKind;
use super::status::DownloadStatus;
use super::types::{DownloadId, DownloadPriority, ModelKind};

/// Percentage complete, clamped to `0..=100`.
///
/// Returns 0 when the total is unknown (`total <= 0`).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn progress_percent(downloaded: u64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    (downloaded as f64 * 100.0 / total as f64).clamp(0.0, 100.0)
}

/// Progress across the whole pipeline, in `0.0..=1.0`.
///
/// Byte progress is scaled into the status's
/// [`progress_range`](DownloadStatus::progress_range). An unknown total
/// counts as the start of the range.
#[must_use]
pub fn overall_progress(status: DownloadStatus, downloaded: u64, total: i64) -> f64 {
    let (start, end) = status.progress_range();
    let fraction = match status {
        DownloadStatus::Queued | DownloadStatus::Downloading | DownloadStatus::Paused => {
            progress_percent(downloaded, total) / 100.0
        }
        _ => 0.0,
    };
    (end - start).mul_add(fraction, start)
}

/// Byte-level progress of one task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub downloaded: u64,
    /// Known content length, or -1 when unknown.
    pub total: i64,
    pub pct: f64,
    pub speed_bps: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<u64>,
}

/// Diagnostic view of a task at one instant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadSnapshot {
    pub id: DownloadId,
    pub model_ref: String,
    pub url: String,
    pub kind: ModelKind,
    pub priority: DownloadPriority,
    pub status: DownloadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DownloadErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub total_bytes: i64,
    pub downloaded_bytes: u64,
    pub progress_pct: f64,
    /// See [`overall_progress`].
    pub overall_progress: f64,
    pub speed_bps: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<u64>,
    pub retry_attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl DownloadSnapshot {
    /// The byte-level part of this snapshot.
    #[must_use]
    pub const fn progress(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            downloaded: self.downloaded_bytes,
            total: self.total_bytes,
            pct: self.progress_pct,
            speed_bps: self.speed_bps,
            eta_seconds: self.eta_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent_unknown_total() {
        assert!(progress_percent(500, -1).abs() < f64::EPSILON);
        assert!(progress_percent(500, 0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_overall_progress_by_stage() {
        let close = |a: f64, b: f64| (a - b).abs() < 1e-9;
        assert!(close(overall_progress(DownloadStatus::Queued, 0, 100), 0.0));
        assert!(close(overall_progress(DownloadStatus::Downloading, 50, 100), 0.475));
        assert!(close(overall_progress(DownloadStatus::Paused, 100, 100), 0.95));
        assert!(close(overall_progress(DownloadStatus::Downloading, 50, -1), 0.0));
        assert!(close(overall_progress(DownloadStatus::Verifying, 100, 100), 0.95));
        assert!(close(overall_progress(DownloadStatus::Completed, 100, 100), 1.0));
        assert!(close(overall_progress(DownloadStatus::Failed, 50, 100), 0.0));
    }

    #[test]
    fn test_progress_percent_clamped() {
        assert!((progress_percent(50, 200) - 25.0).abs() < f64::EPSILON);
        assert!((progress_percent(300, 200) - 100.0).abs() < f64::EPSILON);
    }
}
