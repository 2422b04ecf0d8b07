//! Download manager port.
//!
//! The public operation surface, used by adapters (CLI and any embedding
//! application) without depending on the implementation crate.

use async_trait::async_trait;
use std::sync::Arc;

use crate::download::{
    DownloadId, DownloadRequest, DownloadResult, DownloadSnapshot, DownloadStatus,
    ProgressSnapshot,
};

use super::listener::{DownloadListener, ListenerId};

/// Port for managing downloads.
///
/// Every method may be called concurrently from any task. Control methods
/// return `false` when the task is missing or its current status does not
/// allow the operation.
#[async_trait]
pub trait DownloadManagerPort: Send + Sync {
    /// Validate and admit a download. Returns the new task's id.
    async fn start_download(&self, request: DownloadRequest) -> DownloadResult<DownloadId>;

    async fn cancel_download(&self, id: &DownloadId) -> bool;

    async fn pause_download(&self, id: &DownloadId) -> bool;

    async fn resume_download(&self, id: &DownloadId) -> bool;

    fn get_status(&self, id: &DownloadId) -> Option<DownloadStatus>;

    fn get_progress_snapshot(&self, id: &DownloadId) -> Option<ProgressSnapshot>;

    /// Full diagnostic snapshot of one task.
    fn get_snapshot(&self, id: &DownloadId) -> Option<DownloadSnapshot>;

    /// Non-terminal tasks in submission order.
    fn list_active(&self) -> Vec<DownloadSnapshot>;

    /// Remove all terminal tasks. Returns how many were removed.
    fn clear_completed(&self) -> usize;

    /// Cancel every non-terminal task. Returns how many were cancelled.
    async fn cancel_all(&self) -> usize;

    /// Pause every running task, withdraw pending resumes and hold queued
    /// tasks until [`resume_all`](Self::resume_all). Returns how many tasks
    /// were paused.
    async fn pause_all(&self) -> usize;

    /// Release the queue and resume every paused task. Returns how many
    /// resumes were scheduled.
    async fn resume_all(&self) -> usize;

    /// Remove one terminal task.
    fn remove_task(&self, id: &DownloadId) -> bool;

    fn add_listener(&self, listener: Arc<dyn DownloadListener>) -> ListenerId;

    fn remove_listener(&self, id: ListenerId) -> bool;

    fn is_healthy(&self) -> bool;

    /// Stop accepting work, cancel everything, and drain workers with a
    /// bounded wait.
    async fn shutdown(&self);
}
