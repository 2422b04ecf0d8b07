//! Get command handler.
//!
//! Starts every requested download, renders progress until each one has
//! reached a terminal state, then shuts the manager down. Ctrl+C cancels
//! whatever is still running.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;

use modelfetch_core::{
    DownloadEvent, DownloadId, DownloadPriority, DownloadRequest, DownloadStatus, ModelKind,
};
use modelfetch_download::{ChannelListener, validate_url};

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::{JsonLinesListener, TerminalProgress, format_bytes};

/// Get command arguments passed from the CLI.
pub struct GetArgs {
    pub urls: Vec<String>,
    pub model_ref: Option<String>,
    pub kind: ModelKind,
    pub priority: DownloadPriority,
    pub checksum: Option<String>,
    pub json: bool,
}

/// Result of one `get` invocation.
#[derive(Debug, Default)]
pub struct GetSummary {
    pub completed: Vec<(String, Option<PathBuf>)>,
    pub failed: Vec<(String, String)>,
    pub cancelled: usize,
    pub interrupted: bool,
}

impl GetSummary {
    const fn total(&self) -> usize {
        self.completed.len() + self.failed.len() + self.cancelled
    }
}

/// Build the download requests for `args`.
fn build_requests(args: &GetArgs) -> Result<Vec<DownloadRequest>, CliError> {
    if args.urls.len() > 1 {
        if args.model_ref.is_some() {
            return Err(CliError::Arguments(
                "--model-ref can only be used with a single URL".into(),
            ));
        }
        if args.checksum.is_some() {
            return Err(CliError::Arguments(
                "--checksum can only be used with a single URL".into(),
            ));
        }
    }

    Ok(args
        .urls
        .iter()
        .map(|url| {
            let model_ref = args
                .model_ref
                .clone()
                .or_else(|| default_model_ref(url))
                .unwrap_or_else(|| url.clone());
            let mut request =
                DownloadRequest::new(url, model_ref, args.kind).with_priority(args.priority);
            if let Some(checksum) = &args.checksum {
                request = request.with_checksum(checksum);
            }
            request
        })
        .collect())
}

/// File stem of the last path segment, e.g. `model` for `.../model.gguf`.
fn default_model_ref(raw: &str) -> Option<String> {
    let url = validate_url(raw).ok()?;
    let name = url.path_segments()?.rev().find(|s| !s.is_empty())?;
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    (!stem.is_empty()).then(|| stem.to_string())
}

/// Execute the get command.
pub async fn execute(ctx: &CliContext, args: GetArgs) -> Result<GetSummary> {
    let requests = build_requests(&args)?;
    let downloads = &ctx.downloads;

    // Subscribe before starting anything so no event is missed.
    let (channel, mut events) = ChannelListener::new(1024);
    downloads.add_listener(Arc::new(channel));
    if args.json {
        downloads.add_listener(Arc::new(JsonLinesListener::stdout()));
    } else {
        downloads.add_listener(Arc::new(TerminalProgress::new()));
    }

    let single = requests.len() == 1;
    let mut summary = GetSummary::default();
    let mut started = Vec::new();
    let mut pending = HashSet::new();
    for request in requests {
        let label = request.model_ref.clone();
        match downloads.start_download(request).await {
            Ok(id) => {
                pending.insert(id.clone());
                started.push((id, label));
            }
            // A single-URL invocation reports admission errors directly.
            Err(err) if single => return Err(CliError::from(err).into()),
            Err(err) => summary.failed.push((label, err.user_message())),
        }
    }

    let mut paths: HashMap<DownloadId, PathBuf> = HashMap::new();
    let mut ctrl_c = Box::pin(signal::ctrl_c());
    while !pending.is_empty() {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!(pending = pending.len(), "Interrupted, cancelling downloads");
                for id in &pending {
                    downloads.cancel_download(id).await;
                }
                summary.interrupted = true;
                break;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if let DownloadEvent::Completed { id, final_path, .. } = &event {
                        paths.insert(id.clone(), final_path.clone());
                    }
                    if event.is_terminal() {
                        pending.remove(event.id());
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event receiver lagged");
                    pending.retain(|id| {
                        downloads.get_status(id).is_some_and(|status| !status.is_terminal())
                    });
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    downloads.shutdown().await;

    for (id, label) in started {
        match downloads.get_snapshot(&id) {
            Some(snapshot) if snapshot.status == DownloadStatus::Completed => {
                summary.completed.push((label, paths.remove(&id)));
            }
            Some(snapshot) if snapshot.status == DownloadStatus::Failed => {
                let message = snapshot
                    .error_message
                    .unwrap_or_else(|| "unknown error".to_string());
                summary.failed.push((label, message));
            }
            _ => summary.cancelled += 1,
        }
    }

    if !args.json {
        print_summary(&summary);
    }
    if summary.interrupted {
        return Err(CliError::Interrupted.into());
    }
    if !summary.failed.is_empty() {
        return Err(CliError::DownloadsFailed {
            failed: summary.failed.len(),
            total: summary.total(),
        }
        .into());
    }
    Ok(summary)
}

fn print_summary(summary: &GetSummary) {
    for (label, path) in &summary.completed {
        match path {
            Some(path) => {
                let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or_default();
                println!("✓ {label} → {} ({})", path.display(), format_bytes(size));
            }
            None => println!("✓ {label}"),
        }
    }
    for (label, message) in &summary.failed {
        println!("✗ {label}: {message}");
    }
    if summary.cancelled > 0 {
        println!("{} download(s) cancelled", summary.cancelled);
    }
}
