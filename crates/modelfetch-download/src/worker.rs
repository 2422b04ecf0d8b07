//! Download worker pipeline.
//!
//! Executes one run of one task: connect, stream into the partial file,
//! verify, finalize. The scheduler has already moved the task to
//! `Downloading` when [`run`] is called.
//!
//! Control calls change the task status and cancel the run token. The
//! worker observes both: the token wakes it out of a pending network read,
//! and the status is checked before every chunk write. On pause the partial
//! file and byte counter are kept; on cancel the worker only stops, and the
//! manager cleans up once the run has stopped.

use std::path::Path;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use modelfetch_core::{
    DownloadError, DownloadEvent, DownloadManagerConfig, DownloadStatus, DownloadTask,
    ModelRegistryPort, StorageResolverPort, TransportPort,
};

use crate::checksum;
use crate::listeners::ListenerSet;
use crate::progress::{ProgressThrottle, SpeedTracker};
use crate::scheduler::RunMode;

const LOG_TARGET: &str = "modelfetch.download";

/// Dependencies for the download worker.
///
/// Cloned `Arc` references to ports, so a run owns everything it needs.
#[derive(Clone)]
pub struct WorkerDeps {
    pub transport: Arc<dyn TransportPort>,
    pub storage: Arc<dyn StorageResolverPort>,
    pub model_registry: Arc<dyn ModelRegistryPort>,
    pub listeners: Arc<ListenerSet>,
    pub config: DownloadManagerConfig,
}

/// Why a transfer attempt stopped early.
#[derive(Debug)]
enum Stop {
    Paused,
    Cancelled,
    Failed(DownloadError),
}

impl From<DownloadError> for Stop {
    fn from(err: DownloadError) -> Self {
        Self::Failed(err)
    }
}

impl From<std::io::Error> for Stop {
    fn from(err: std::io::Error) -> Self {
        Self::Failed(DownloadError::from_io_error(&err))
    }
}

/// Map the task's current status onto the reason the run was interrupted.
fn interrupted(task: &DownloadTask) -> Stop {
    match task.status() {
        DownloadStatus::Paused => Stop::Paused,
        _ => Stop::Cancelled,
    }
}

/// Run a task to completion, pause, cancellation or failure.
pub async fn run(task: Arc<DownloadTask>, mode: RunMode, token: CancellationToken, deps: WorkerDeps) {
    let id = task.id().clone();

    if mode == RunMode::Fresh {
        tracing::info!(target: LOG_TARGET, id = %id, url = task.url(), "Download started");
        deps.listeners.emit(&DownloadEvent::Started {
            id: id.clone(),
            model_ref: task.model_ref().to_string(),
            url: task.url().to_string(),
        });
    }

    let mut resume = mode == RunMode::Resume;
    let mut attempt = 0;
    loop {
        let offset = if resume {
            partial_len(&task).await
        } else {
            0
        };

        match transfer(&task, offset, &token, &deps).await {
            Ok(()) => break,
            Err(Stop::Paused) => {
                tracing::info!(
                    target: LOG_TARGET,
                    id = %id,
                    bytes = task.downloaded_bytes(),
                    "Download paused"
                );
                return;
            }
            Err(Stop::Cancelled) => {
                tracing::debug!(target: LOG_TARGET, id = %id, "Run stopped by cancellation");
                return;
            }
            Err(Stop::Failed(err)) => {
                if err.is_retryable() && attempt < deps.config.max_retry_attempts {
                    attempt += 1;
                    task.set_retry_attempt(attempt);
                    tracing::warn!(
                        target: LOG_TARGET,
                        id = %id,
                        attempt,
                        max_attempts = deps.config.max_retry_attempts,
                        error = %err,
                        "Transient download failure, retrying"
                    );
                    tokio::select! {
                        () = token.cancelled() => return,
                        () = tokio::time::sleep(deps.config.retry_delay) => {}
                    }
                    resume = true;
                    continue;
                }
                fail(&task, err, &deps).await;
                return;
            }
        }
    }

    match verify_and_finalize(&task, &token, &deps).await {
        Ok(()) => {}
        Err(Stop::Failed(err)) => fail(&task, err, &deps).await,
        Err(Stop::Paused | Stop::Cancelled) => {
            tracing::debug!(target: LOG_TARGET, id = %id, "Run stopped before finalizing");
        }
    }
}

/// Size of the partial file on disk, or 0 if there is none.
async fn partial_len(task: &DownloadTask) -> u64 {
    tokio::fs::metadata(task.temp_path())
        .await
        .map(|meta| meta.len())
        .unwrap_or(0)
}

/// One transfer attempt starting at `offset`.
async fn transfer(
    task: &DownloadTask,
    offset: u64,
    token: &CancellationToken,
    deps: &WorkerDeps,
) -> Result<(), Stop> {
    let known_total = u64::try_from(task.total_bytes()).ok().filter(|t| *t > 0);
    if offset > 0 && known_total == Some(offset) {
        // Everything arrived before the interruption.
        task.set_downloaded_bytes(offset);
        return Ok(());
    }

    let range_start = (offset > 0).then_some(offset);
    let response = tokio::select! {
        biased;
        () = token.cancelled() => return Err(interrupted(task)),
        response = deps.transport.stream_get(task.url(), range_start, &[]) => {
            response.map_err(DownloadError::from)?
        }
    };

    if offset > 0 && response.is_range_not_satisfiable() {
        let expected = response.range_total.or(known_total);
        if expected.is_none_or(|total| total == offset) {
            // The partial file already holds the whole resource.
            tracing::debug!(
                target: LOG_TARGET,
                id = %task.id(),
                offset,
                "Range starts at end of resource, nothing left to fetch"
            );
            task.set_total_bytes(i64::try_from(offset).unwrap_or(-1));
            task.set_downloaded_bytes(offset);
            return Ok(());
        }
    }

    if response.is_error() {
        return Err(DownloadError::server(
            response.status,
            format!("request for {} failed", task.url()),
        )
        .into());
    }

    let (start, total) = if offset > 0 && response.is_partial() {
        let total = response
            .range_total
            .or_else(|| response.content_length.map(|len| len + offset));
        (offset, total)
    } else {
        if offset > 0 {
            tracing::info!(
                target: LOG_TARGET,
                id = %task.id(),
                offset,
                "Server ignored range request, restarting from 0"
            );
        }
        (0, response.content_length)
    };
    let total_signed = total.and_then(|t| i64::try_from(t).ok()).unwrap_or(-1);
    task.set_total_bytes(total_signed);
    task.set_downloaded_bytes(start);

    let mut file = open_destination(task.temp_path(), start > 0).await?;
    let streamed = stream_body(task, response.body, &mut file, total, token, deps).await;
    // Flush before releasing the file so a later resume sees every byte.
    let flushed = file.flush().await;
    drop(file);
    streamed?;
    flushed?;

    let downloaded = task.downloaded_bytes();
    if let Some(total) = total {
        if downloaded < total {
            return Err(DownloadError::network(format!(
                "connection closed after {downloaded} of {total} bytes"
            ))
            .into());
        }
    }
    Ok(())
}

/// Open the partial file for append (resume) or truncate-create.
async fn open_destination(path: &Path, append: bool) -> Result<File, Stop> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let file = if append {
        OpenOptions::new().append(true).open(path).await?
    } else {
        File::create(path).await?
    };
    Ok(file)
}

async fn stream_body(
    task: &DownloadTask,
    mut body: modelfetch_core::ByteStream,
    file: &mut File,
    total: Option<u64>,
    token: &CancellationToken,
    deps: &WorkerDeps,
) -> Result<(), Stop> {
    let chunk_size = deps.config.chunk_size.max(1);
    let total_signed = task.total_bytes();
    let mut throttle = ProgressThrottle::new(deps.config.progress_interval);
    let mut speed = SpeedTracker::new(task.downloaded_bytes());

    loop {
        let next = tokio::select! {
            biased;
            () = token.cancelled() => return Err(interrupted(task)),
            next = body.next() => next,
        };
        let Some(bytes) = next else {
            return Ok(());
        };
        let bytes = bytes.map_err(DownloadError::from)?;

        for chunk in bytes.chunks(chunk_size) {
            if task.status() != DownloadStatus::Downloading {
                return Err(interrupted(task));
            }

            let len = chunk.len() as u64;
            if let Some(total) = total {
                if task.downloaded_bytes() + len > total {
                    return Err(DownloadError::network(format!(
                        "server sent more than the advertised {total} bytes"
                    ))
                    .into());
                }
            }

            file.write_all(chunk).await?;
            let downloaded = task.add_downloaded_bytes(len);

            if throttle.should_emit() {
                let (speed_bps, eta_seconds) = speed.sample(downloaded, total_signed);
                task.record_rate(speed_bps, eta_seconds);
                tracing::trace!(
                    target: LOG_TARGET,
                    id = %task.id(),
                    bytes = downloaded,
                    total = total_signed,
                    "Download progress"
                );
                deps.listeners.emit(&DownloadEvent::Progress {
                    id: task.id().clone(),
                    downloaded,
                    total: total_signed,
                    pct: task.progress_pct(),
                    speed_bps,
                    eta_seconds,
                });
            }
        }
    }
}

async fn verify_and_finalize(
    task: &DownloadTask,
    token: &CancellationToken,
    deps: &WorkerDeps,
) -> Result<(), Stop> {
    let id = task.id();
    let temp_path = task.temp_path().to_path_buf();

    if let Some(expected) = task.expected_checksum() {
        if !task.transition(DownloadStatus::Verifying) {
            return Err(interrupted(task));
        }
        tracing::debug!(target: LOG_TARGET, id = %id, "Verifying checksum");
        let verified = tokio::select! {
            biased;
            () = token.cancelled() => return Err(interrupted(task)),
            verified = checksum::verify_file(temp_path.clone(), expected.to_string()) => verified,
        };
        verified?;
    }

    if task.status().is_terminal() || task.status() == DownloadStatus::Paused {
        return Err(interrupted(task));
    }

    let final_path = deps
        .storage
        .move_to_final(&temp_path, id, task.request())
        .await
        .map_err(DownloadError::from)?;
    let size = tokio::fs::metadata(&final_path).await?.len();

    if !task.transition(DownloadStatus::Completed) {
        // Cancelled while the file was being moved.
        remove_file_best_effort(task, &final_path).await;
        return Err(interrupted(task));
    }

    tracing::info!(
        target: LOG_TARGET,
        id = %id,
        path = %final_path.display(),
        size,
        "Download completed"
    );
    deps.listeners.emit(&DownloadEvent::Completed {
        id: id.clone(),
        model_ref: task.model_ref().to_string(),
        final_path: final_path.clone(),
        size,
    });
    deps.model_registry
        .update_download_status(task.model_ref(), Some(final_path));
    Ok(())
}

/// Drive the task to `Failed`, delete its partial file and notify.
async fn fail(task: &DownloadTask, err: DownloadError, deps: &WorkerDeps) {
    let kind = err.kind();
    let message = err.to_string();
    if !task.fail(err) {
        tracing::debug!(
            target: LOG_TARGET,
            id = %task.id(),
            status = ?task.status(),
            "Failure ignored, task already stopped"
        );
        return;
    }

    tracing::warn!(
        target: LOG_TARGET,
        id = %task.id(),
        kind = %kind,
        error = %message,
        "Download failed"
    );
    remove_file_best_effort(task, task.temp_path()).await;
    deps.listeners.emit(&DownloadEvent::Failed {
        id: task.id().clone(),
        model_ref: task.model_ref().to_string(),
        error_kind: kind,
        message,
    });
    deps.model_registry
        .update_download_status(task.model_ref(), None);
}

/// Cleanup for a cancelled task, run once its last run has stopped.
pub async fn finish_cancelled(task: &DownloadTask, deps: &WorkerDeps) {
    remove_file_best_effort(task, task.temp_path()).await;
    tracing::info!(target: LOG_TARGET, id = %task.id(), "Download cancelled");
    deps.listeners.emit(&DownloadEvent::Cancelled {
        id: task.id().clone(),
    });
    deps.model_registry
        .update_download_status(task.model_ref(), None);
}

async fn remove_file_best_effort(task: &DownloadTask, path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            target: LOG_TARGET,
            id = %task.id(),
            path = %path.display(),
            error = %e,
            "Failed to delete partial file"
        ),
    }
}
