//! Download status and its transition graph.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a download task.
///
/// ```text
/// Queued ──► Downloading ──► Verifying ──► Completed
///    │          │   ▲   │         │
///    │          ▼   │   └─────────┼──► Completed / Failed
///    │         Paused             └──► Failed
///    └──────────┴──────────────────────► Cancelled (from any non-terminal)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Waiting for a pool slot.
    Queued,
    /// Bytes are being transferred.
    Downloading,
    /// Stopped by the user; the partial file is kept for resume.
    Paused,
    /// Transfer finished, checksum is being computed.
    Verifying,
    /// Completed successfully.
    Completed,
    /// Failed with an error.
    Failed,
    /// Cancelled by user.
    Cancelled,
}

impl DownloadStatus {
    /// Whether this status is final. Terminal tasks never change again.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the transition `self -> next` is allowed.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        use DownloadStatus::{
            Cancelled, Completed, Downloading, Failed, Paused, Queued, Verifying,
        };

        matches!(
            (*self, next),
            (Queued, Downloading | Failed | Cancelled)
                | (
                    Downloading,
                    Paused | Verifying | Completed | Failed | Cancelled
                )
                | (Paused, Downloading | Cancelled)
                | (Verifying, Completed | Failed | Cancelled)
        )
    }

    /// Convert to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Paused => "paused",
            Self::Verifying => "verifying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "downloading" => Some(Self::Downloading),
            "paused" => Some(Self::Paused),
            "verifying" => Some(Self::Verifying),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Human-readable label for UIs.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Queued => "Queued",
            Self::Downloading => "Downloading",
            Self::Paused => "Paused",
            Self::Verifying => "Verifying",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl DownloadStatus {
    /// Slice of overall progress covered by this stage, as `(start, end)`
    /// fractions of 1.0.
    ///
    /// The transfer takes 0-95%, checksum verification 95-99%, completion
    /// is 100%. Failed and cancelled tasks report no progress.
    #[must_use]
    pub const fn progress_range(&self) -> (f64, f64) {
        match self {
            Self::Queued | Self::Downloading | Self::Paused => (0.0, 0.95),
            Self::Verifying => (0.95, 0.99),
            Self::Completed => (1.0, 1.0),
            Self::Failed | Self::Cancelled => (0.0, 0.0),
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
