//! Download domain types, events, errors, and the task record.
//!
//! This module contains pure data types for the download system. No network
//! or file I/O allowed.
//!
//! # Structure
//!
//! - `types` - Identifiers and request parameters (`DownloadId`, `ModelKind`, `DownloadPriority`)
//! - `status` - `DownloadStatus` and its transition graph
//! - `errors` - `DownloadErrorKind` taxonomy and `DownloadError`
//! - `task` - The shared `DownloadTask` record
//! - `snapshot` - Read-only snapshot DTOs
//! - `events` - Serializable lifecycle events
//! - `config` - `DownloadManagerConfig`

pub mod config;
pub mod errors;
pub mod events;
pub mod snapshot;
pub mod status;
pub mod task;
pub mod types;

// Re-export commonly used types
pub use config::DownloadManagerConfig;
pub use errors::{DownloadError, DownloadErrorKind, DownloadResult};
pub use events::DownloadEvent;
pub use snapshot::{DownloadSnapshot, ProgressSnapshot, overall_progress, progress_percent};
pub use status::DownloadStatus;
pub use task::{DownloadRequest, DownloadTask};
pub use types::{DownloadId, DownloadPriority, ModelKind};
