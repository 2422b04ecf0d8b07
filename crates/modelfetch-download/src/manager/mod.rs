//! Download manager implementation.
//!
//! [`DownloadManager`] is the concrete `DownloadManagerPort`. It owns its
//! task registry, scheduler and listener set; nothing is process-global.
//!
//! # Concurrency Model
//!
//! - Control calls write only the task status, then cancel the run token
//! - The bound run is the sole writer of byte counters
//! - Cancel cleanup runs exactly once, after the last run has stopped
//! - Admission (start, resume) and the shutdown flag share one lock, so no
//!   work is admitted once `shutdown` has begun
//! - Lock order: admission → scheduler runs → task state

mod preflight;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use modelfetch_core::{
    AssumeOnline, ConnectivityProbePort, DownloadError, DownloadEvent, DownloadId,
    DownloadListener, DownloadManagerConfig, DownloadManagerPort, DownloadRequest,
    DownloadResult, DownloadSnapshot, DownloadStatus, DownloadTask, ListenerId,
    ModelRegistryPort, NoopModelRegistry, ProgressSnapshot, StorageResolverPort, TransportPort,
};

use crate::listeners::ListenerSet;
use crate::registry::TaskRegistry;
use crate::scheduler::{RunMode, Scheduler};
use crate::worker::{self, WorkerDeps};

pub use preflight::validate_url;

const LOG_TARGET: &str = "modelfetch.download";

/// Dependencies for building a download manager.
pub struct DownloadManagerDeps {
    pub transport: Arc<dyn TransportPort>,
    pub storage: Arc<dyn StorageResolverPort>,
    /// Defaults to [`NoopModelRegistry`].
    pub model_registry: Option<Arc<dyn ModelRegistryPort>>,
    /// Defaults to [`AssumeOnline`].
    pub connectivity: Option<Arc<dyn ConnectivityProbePort>>,
    pub config: DownloadManagerConfig,
}

/// Build a download manager from its dependencies.
pub fn build_download_manager(deps: DownloadManagerDeps) -> DownloadManager {
    DownloadManager::new(deps)
}

/// Resumable, bounded-concurrency download manager.
pub struct DownloadManager {
    registry: TaskRegistry,
    scheduler: Scheduler,
    worker_deps: WorkerDeps,
    connectivity: Arc<dyn ConnectivityProbePort>,
    /// `true` until shutdown begins.
    admission: Mutex<bool>,
}

impl DownloadManager {
    pub fn new(deps: DownloadManagerDeps) -> Self {
        let scheduler = Scheduler::new(deps.config.max_concurrent);
        tracing::debug!(
            target: LOG_TARGET,
            max_concurrent = scheduler.capacity(),
            "Download manager created"
        );
        Self {
            registry: TaskRegistry::new(),
            scheduler,
            worker_deps: WorkerDeps {
                transport: deps.transport,
                storage: deps.storage,
                model_registry: deps
                    .model_registry
                    .unwrap_or_else(|| Arc::new(NoopModelRegistry)),
                listeners: Arc::new(ListenerSet::new()),
                config: deps.config,
            },
            connectivity: deps
                .connectivity
                .unwrap_or_else(|| Arc::new(AssumeOnline)),
            admission: Mutex::new(true),
        }
    }

    pub const fn config(&self) -> &DownloadManagerConfig {
        &self.worker_deps.config
    }

    fn admission(&self) -> MutexGuard<'_, bool> {
        self.admission.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn submit(&self, task: &Arc<DownloadTask>, mode: RunMode) -> bool {
        let run_task = Arc::clone(task);
        let deps = self.worker_deps.clone();
        self.scheduler.submit(task, mode, move |token| {
            worker::run(run_task, mode, token, deps)
        })
    }

    fn emit(&self, event: &DownloadEvent) {
        self.worker_deps.listeners.emit(event);
    }

    /// Cancel one task. `false` if missing or already terminal.
    fn cancel_task(&self, task: &Arc<DownloadTask>) -> bool {
        if !task.cancel() {
            return false;
        }

        let run = self.scheduler.interrupt(task.id());
        let task = Arc::clone(task);
        let deps = self.worker_deps.clone();
        self.scheduler.spawn_tracked(async move {
            if let Some(run) = run {
                run.stopped().await;
            }
            worker::finish_cancelled(&task, &deps).await;
        });
        true
    }

    /// Cancel every non-terminal task. Returns how many were cancelled.
    fn cancel_active(&self) -> usize {
        let mut cancelled = 0;
        for task in self.registry.list_active() {
            if self.cancel_task(&task) {
                cancelled += 1;
            }
        }
        cancelled
    }
}

#[async_trait]
impl DownloadManagerPort for DownloadManager {
    async fn start_download(&self, request: DownloadRequest) -> DownloadResult<DownloadId> {
        if !self.is_healthy() {
            return Err(DownloadError::ManagerShutdown);
        }

        let url = preflight::validate_url(&request.url)?;
        preflight::check_connectivity(self.connectivity.as_ref(), &url).await?;
        preflight::warn_if_low_space(
            &self.worker_deps.storage,
            self.worker_deps.config.low_space_threshold,
        )
        .await;

        let id = DownloadId::generate();
        let temp_path = self.worker_deps.storage.temp_path(&id);
        let task = Arc::new(DownloadTask::new(id.clone(), request, temp_path));
        {
            // Shutdown may have begun while the pre-flight checks awaited.
            let admission = self.admission();
            if !*admission {
                return Err(DownloadError::ManagerShutdown);
            }
            self.registry.register(Arc::clone(&task));
            self.submit(&task, RunMode::Fresh);
        }

        tracing::info!(
            target: LOG_TARGET,
            id = %id,
            model_ref = task.model_ref(),
            kind = %task.kind(),
            priority = task.request().priority.as_str(),
            "Download queued"
        );
        Ok(id)
    }

    async fn cancel_download(&self, id: &DownloadId) -> bool {
        self.registry
            .get(id)
            .is_some_and(|task| self.cancel_task(&task))
    }

    async fn pause_download(&self, id: &DownloadId) -> bool {
        let Some(task) = self.registry.get(id) else {
            return false;
        };

        let paused = if task.transition_from(DownloadStatus::Downloading, DownloadStatus::Paused) {
            self.scheduler.interrupt(id);
            true
        } else {
            self.scheduler.withdraw_pending(&task)
        };

        if paused {
            tracing::info!(target: LOG_TARGET, id = %id, "Download pause requested");
            self.emit(&DownloadEvent::Paused { id: id.clone() });
        }
        paused
    }

    async fn resume_download(&self, id: &DownloadId) -> bool {
        let Some(task) = self.registry.get(id) else {
            return false;
        };
        {
            let admission = self.admission();
            if !*admission || !self.submit(&task, RunMode::Resume) {
                return false;
            }
        }

        tracing::info!(
            target: LOG_TARGET,
            id = %id,
            bytes = task.downloaded_bytes(),
            "Download resume requested"
        );
        self.emit(&DownloadEvent::Resumed { id: id.clone() });
        true
    }

    fn get_status(&self, id: &DownloadId) -> Option<DownloadStatus> {
        self.registry.get(id).map(|task| task.status())
    }

    fn get_progress_snapshot(&self, id: &DownloadId) -> Option<ProgressSnapshot> {
        self.registry.get(id).map(|task| task.progress())
    }

    fn get_snapshot(&self, id: &DownloadId) -> Option<DownloadSnapshot> {
        self.registry.get(id).map(|task| task.snapshot())
    }

    fn list_active(&self) -> Vec<DownloadSnapshot> {
        self.registry
            .list_active()
            .iter()
            .map(|task| task.snapshot())
            .collect()
    }

    fn clear_completed(&self) -> usize {
        let removed = self.registry.remove_terminal();
        tracing::debug!(target: LOG_TARGET, removed, "Cleared finished downloads");
        removed
    }

    async fn cancel_all(&self) -> usize {
        let cancelled = self.cancel_active();
        let removed = self.registry.remove_terminal();
        tracing::info!(target: LOG_TARGET, cancelled, removed, "Cancelled all downloads");
        cancelled
    }

    async fn pause_all(&self) -> usize {
        self.scheduler.hold_queue();
        let mut paused = 0;
        for task in self.registry.list_active() {
            if self.pause_download(task.id()).await {
                paused += 1;
            }
        }
        tracing::info!(target: LOG_TARGET, paused, "Paused all downloads");
        paused
    }

    async fn resume_all(&self) -> usize {
        if !self.is_healthy() {
            return 0;
        }
        self.scheduler.release_queue();
        let mut resumed = 0;
        for task in self.registry.list_active() {
            if task.status() == DownloadStatus::Paused && self.resume_download(task.id()).await {
                resumed += 1;
            }
        }
        tracing::info!(target: LOG_TARGET, resumed, "Resumed all downloads");
        resumed
    }

    fn remove_task(&self, id: &DownloadId) -> bool {
        self.registry.remove_if_terminal(id)
    }

    fn add_listener(&self, listener: Arc<dyn DownloadListener>) -> ListenerId {
        self.worker_deps.listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.worker_deps.listeners.remove(id)
    }

    fn is_healthy(&self) -> bool {
        *self.admission()
    }

    async fn shutdown(&self) {
        {
            let mut admission = self.admission();
            if !*admission {
                tracing::debug!(target: LOG_TARGET, "Shutdown already in progress");
            }
            *admission = false;
        }

        let cancelled = self.cancel_active();
        tracing::info!(
            target: LOG_TARGET,
            cancelled,
            in_flight = self.scheduler.in_flight(),
            "Download manager shutting down"
        );

        let timeout = self.worker_deps.config.shutdown_timeout;
        if tokio::time::timeout(timeout, self.scheduler.drain())
            .await
            .is_err()
        {
            let aborted = self.scheduler.abort_all();
            tracing::warn!(
                target: LOG_TARGET,
                aborted,
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "Workers did not stop in time; aborted (partial files may remain)"
            );
        }
    }
}
