//! Download lifecycle events.
//!
//! Listeners receive these as individual callbacks; [`DownloadEvent`] is the
//! owned, serializable form used by channel subscribers and JSON output.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::errors::DownloadErrorKind;
use super::types::DownloadId;

/// Events emitted during a download's lifecycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadEvent {
    Started {
        id: DownloadId,
        model_ref: String,
        url: String,
    },
    Progress {
        id: DownloadId,
        downloaded: u64,
        /// -1 when unknown.
        total: i64,
        pct: f64,
        speed_bps: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        eta_seconds: Option<u64>,
    },
    Completed {
        id: DownloadId,
        model_ref: String,
        final_path: PathBuf,
        size: u64,
    },
    Failed {
        id: DownloadId,
        model_ref: String,
        error_kind: DownloadErrorKind,
        message: String,
    },
    Paused {
        id: DownloadId,
    },
    Resumed {
        id: DownloadId,
    },
    Cancelled {
        id: DownloadId,
    },
}

impl DownloadEvent {
    /// The download this event belongs to.
    #[must_use]
    pub const fn id(&self) -> &DownloadId {
        match self {
            Self::Started { id, .. }
            | Self::Progress { id, .. }
            | Self::Completed { id, .. }
            | Self::Failed { id, .. }
            | Self::Paused { id }
            | Self::Resumed { id }
            | Self::Cancelled { id } => id,
        }
    }

    /// Whether no further events follow for this download.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tagging() {
        let event = DownloadEvent::Failed {
            id: DownloadId::new("d1"),
            model_ref: "m1".into(),
            error_kind: DownloadErrorKind::ServerError,
            message: "HTTP 503".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "failed");
        assert_eq!(value["error_kind"], "SERVER_ERROR");
        assert_eq!(value["id"], "d1");
    }

    #[test]
    fn test_terminal_events() {
        let id = DownloadId::new("d1");
        assert!(DownloadEvent::Cancelled { id: id.clone() }.is_terminal());
        assert!(!DownloadEvent::Paused { id: id.clone() }.is_terminal());
        assert_eq!(DownloadEvent::Resumed { id: id.clone() }.id(), &id);
    }
}
