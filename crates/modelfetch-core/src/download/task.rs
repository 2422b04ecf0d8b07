//! The canonical record of one requested transfer.
//!
//! A [`DownloadTask`] is shared (`Arc`) between the registry, the bound
//! worker, and control calls. Status, error and timestamps sit behind one
//! mutex so a transition is observed atomically; byte counters are plain
//! atomics written only by the bound worker.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::errors::DownloadError;
use super::snapshot::{DownloadSnapshot, ProgressSnapshot, overall_progress, progress_percent};
use super::status::DownloadStatus;
use super::types::{DownloadId, DownloadPriority, ModelKind};

/// Parameters of a `start_download` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    /// Opaque caller key, passed back to the model registry hook.
    pub model_ref: String,
    pub kind: ModelKind,
    pub priority: DownloadPriority,
    /// Expected hex digest. `None` skips verification.
    pub expected_checksum: Option<String>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, model_ref: impl Into<String>, kind: ModelKind) -> Self {
        Self {
            url: url.into(),
            model_ref: model_ref.into(),
            kind,
            priority: DownloadPriority::Normal,
            expected_checksum: None,
        }
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: DownloadPriority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.expected_checksum = Some(checksum.into());
        self
    }
}

#[derive(Debug)]
struct TaskState {
    status: DownloadStatus,
    error: Option<DownloadError>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    speed_bps: f64,
    eta_seconds: Option<u64>,
    retry_attempt: u32,
}

/// One download task.
#[derive(Debug)]
pub struct DownloadTask {
    id: DownloadId,
    request: DownloadRequest,
    temp_path: PathBuf,
    state: Mutex<TaskState>,
    downloaded: AtomicU64,
    total: AtomicI64,
}

impl DownloadTask {
    /// Create a task in `Queued` state.
    pub fn new(id: DownloadId, request: DownloadRequest, temp_path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            request,
            temp_path: temp_path.into(),
            state: Mutex::new(TaskState {
                status: DownloadStatus::Queued,
                error: None,
                started_at: None,
                completed_at: None,
                speed_bps: 0.0,
                eta_seconds: None,
                retry_attempt: 0,
            }),
            downloaded: AtomicU64::new(0),
            total: AtomicI64::new(-1),
        }
    }

    fn state(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub const fn id(&self) -> &DownloadId {
        &self.id
    }

    pub const fn request(&self) -> &DownloadRequest {
        &self.request
    }

    pub fn url(&self) -> &str {
        &self.request.url
    }

    pub fn model_ref(&self) -> &str {
        &self.request.model_ref
    }

    pub const fn kind(&self) -> ModelKind {
        self.request.kind
    }

    pub fn expected_checksum(&self) -> Option<&str> {
        self.request.expected_checksum.as_deref()
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn status(&self) -> DownloadStatus {
        self.state().status
    }

    pub fn error(&self) -> Option<DownloadError> {
        self.state().error.clone()
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Move to `next` if the transition graph allows it.
    ///
    /// Returns `false` and leaves the task untouched otherwise.
    pub fn transition(&self, next: DownloadStatus) -> bool {
        let mut state = self.state();
        let current = state.status;
        Self::apply(&mut state, current, next)
    }

    /// Move to `next` only if the current status is `expected`.
    pub fn transition_from(&self, expected: DownloadStatus, next: DownloadStatus) -> bool {
        let mut state = self.state();
        let current = state.status;
        if current != expected {
            return false;
        }
        Self::apply(&mut state, current, next)
    }

    /// Drive the task to `Failed` with `error`.
    pub fn fail(&self, error: DownloadError) -> bool {
        let mut state = self.state();
        let current = state.status;
        if !Self::apply(&mut state, current, DownloadStatus::Failed) {
            return false;
        }
        state.error = Some(error);
        true
    }

    /// Drive the task to `Cancelled`.
    pub fn cancel(&self) -> bool {
        let mut state = self.state();
        let current = state.status;
        if !Self::apply(&mut state, current, DownloadStatus::Cancelled) {
            return false;
        }
        state.error = Some(DownloadError::Cancelled);
        true
    }

    fn apply(state: &mut TaskState, current: DownloadStatus, next: DownloadStatus) -> bool {
        if !current.can_transition_to(next) {
            tracing::trace!(from = %current, to = %next, "rejected status transition");
            return false;
        }
        state.status = next;
        if next == DownloadStatus::Downloading && state.started_at.is_none() {
            state.started_at = Some(Utc::now());
        }
        if next.is_terminal() {
            state.completed_at = Some(Utc::now());
            state.eta_seconds = None;
        }
        true
    }

    pub fn downloaded_bytes(&self) -> u64 {
        self.downloaded.load(Ordering::Acquire)
    }

    /// Known content length, or -1.
    pub fn total_bytes(&self) -> i64 {
        self.total.load(Ordering::Acquire)
    }

    pub fn set_total_bytes(&self, total: i64) {
        self.total.store(total, Ordering::Release);
    }

    pub fn set_downloaded_bytes(&self, downloaded: u64) {
        self.downloaded.store(downloaded, Ordering::Release);
    }

    /// Add `n` bytes and return the new count.
    pub fn add_downloaded_bytes(&self, n: u64) -> u64 {
        self.downloaded.fetch_add(n, Ordering::AcqRel) + n
    }

    pub fn record_rate(&self, speed_bps: f64, eta_seconds: Option<u64>) {
        let mut state = self.state();
        state.speed_bps = speed_bps;
        state.eta_seconds = eta_seconds;
    }

    pub fn retry_attempt(&self) -> u32 {
        self.state().retry_attempt
    }

    pub fn set_retry_attempt(&self, attempt: u32) {
        self.state().retry_attempt = attempt;
    }

    pub fn progress_pct(&self) -> f64 {
        progress_percent(self.downloaded_bytes(), self.total_bytes())
    }

    pub fn progress(&self) -> ProgressSnapshot {
        let (speed_bps, eta_seconds) = {
            let state = self.state();
            (state.speed_bps, state.eta_seconds)
        };
        let downloaded = self.downloaded_bytes();
        let total = self.total_bytes();
        ProgressSnapshot {
            downloaded,
            total,
            pct: progress_percent(downloaded, total),
            speed_bps,
            eta_seconds,
        }
    }

    pub fn snapshot(&self) -> DownloadSnapshot {
        let state = self.state();
        let downloaded = self.downloaded_bytes();
        let total = self.total_bytes();
        DownloadSnapshot {
            id: self.id.clone(),
            model_ref: self.request.model_ref.clone(),
            url: self.request.url.clone(),
            kind: self.request.kind,
            priority: self.request.priority,
            status: state.status,
            error: state.error.as_ref().map(DownloadError::kind),
            error_message: state.error.as_ref().map(ToString::to_string),
            total_bytes: total,
            downloaded_bytes: downloaded,
            progress_pct: progress_percent(downloaded, total),
            overall_progress: overall_progress(state.status, downloaded, total),
            speed_bps: state.speed_bps,
            eta_seconds: state.eta_seconds,
            retry_attempt: state.retry_attempt,
            started_at: state.started_at,
            completed_at: state.completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::errors::DownloadErrorKind;

    fn task() -> DownloadTask {
        DownloadTask::new(
            DownloadId::new("t1"),
            DownloadRequest::new("https://example.com/m.gguf", "m1", ModelKind::Llm),
            "/tmp/t1.part",
        )
    }

    #[test]
    fn test_new_task_is_queued_with_unknown_total() {
        let t = task();
        assert_eq!(t.status(), DownloadStatus::Queued);
        assert_eq!(t.total_bytes(), -1);
        assert_eq!(t.downloaded_bytes(), 0);
        assert!(t.snapshot().started_at.is_none());
    }

    #[test]
    fn test_downloading_stamps_started_at_once() {
        let t = task();
        assert!(t.transition(DownloadStatus::Downloading));
        let first = t.snapshot().started_at;
        assert!(first.is_some());
        assert!(t.transition(DownloadStatus::Paused));
        assert!(t.transition(DownloadStatus::Downloading));
        assert_eq!(t.snapshot().started_at, first);
    }

    #[test]
    fn test_terminal_state_is_frozen() {
        let t = task();
        assert!(t.cancel());
        assert!(!t.cancel());
        assert!(!t.fail(DownloadError::network("late")));
        assert!(!t.transition(DownloadStatus::Downloading));
        assert_eq!(t.status(), DownloadStatus::Cancelled);
        assert_eq!(t.snapshot().error, Some(DownloadErrorKind::Cancelled));
        assert!(t.snapshot().completed_at.is_some());
    }

    #[test]
    fn test_transition_from_requires_expected_status() {
        let t = task();
        assert!(!t.transition_from(DownloadStatus::Paused, DownloadStatus::Downloading));
        assert!(t.transition_from(DownloadStatus::Queued, DownloadStatus::Downloading));
    }

    #[test]
    fn test_fail_records_error() {
        let t = task();
        t.transition(DownloadStatus::Downloading);
        assert!(t.fail(DownloadError::server(503, "busy")));
        let snap = t.snapshot();
        assert_eq!(snap.status, DownloadStatus::Failed);
        assert_eq!(snap.error, Some(DownloadErrorKind::ServerError));
        assert!(snap.error_message.unwrap().contains("503"));
    }

    #[test]
    fn test_byte_counters() {
        let t = task();
        t.set_total_bytes(100);
        assert_eq!(t.add_downloaded_bytes(40), 40);
        assert_eq!(t.add_downloaded_bytes(10), 50);
        let progress = t.progress();
        assert_eq!(progress.downloaded, 50);
        assert!((progress.pct - 50.0).abs() < f64::EPSILON);
    }
}
