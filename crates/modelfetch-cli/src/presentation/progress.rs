//! Progress bars for concurrent downloads.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};

use modelfetch_core::{DownloadEvent, DownloadId, DownloadListener};

use super::{format_bytes, truncate_label};

const MAX_LABEL: usize = 32;

struct Row {
    bar: ProgressBar,
    label: String,
    sized: bool,
}

/// One indicatif bar per download, drawn to stderr.
///
/// Hidden automatically when stderr is not a terminal.
pub struct TerminalProgress {
    multi: MultiProgress,
    rows: Mutex<HashMap<DownloadId, Row>>,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    pub fn with_draw_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            rows: Mutex::new(HashMap::new()),
        }
    }

    fn rows(&self) -> MutexGuard<'_, HashMap<DownloadId, Row>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of bars still being updated.
    pub fn active(&self) -> usize {
        self.rows().values().filter(|row| !row.bar.is_finished()).count()
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{msg:32} {bar:28.cyan/blue} {human_bytes:>10} / {human_total:>10} ({percent:>3}%) {binary_bytes_per_sec} ETA {eta}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key("human_bytes", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
            let _ = write!(w, "{}", format_bytes(state.pos()));
        })
        .with_key("human_total", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
            let value = state.len().map_or_else(|| "?".to_string(), format_bytes);
            let _ = write!(w, "{value}");
        })
    }

    fn start_row(&self, id: &DownloadId, model_ref: &str) {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(Self::spinner_style());
        let label = truncate_label(model_ref, MAX_LABEL);
        bar.set_message(label.clone());
        bar.enable_steady_tick(Duration::from_millis(120));
        self.rows().insert(
            id.clone(),
            Row {
                bar,
                label,
                sized: false,
            },
        );
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadListener for TerminalProgress {
    fn on_event(&self, event: &DownloadEvent) {
        if let DownloadEvent::Started { id, model_ref, .. } = event {
            self.start_row(id, model_ref);
            return;
        }

        let mut rows = self.rows();
        let Some(row) = rows.get_mut(event.id()) else {
            return;
        };
        match event {
            DownloadEvent::Progress {
                downloaded, total, ..
            } => {
                if let Ok(total) = u64::try_from(*total) {
                    if !row.sized && total > 0 {
                        row.bar.set_style(Self::bar_style());
                        row.bar.set_length(total);
                        row.bar.set_message(row.label.clone());
                        row.sized = true;
                    }
                }
                row.bar.set_position(*downloaded);
            }
            DownloadEvent::Paused { .. } => {
                row.bar.set_message(format!("{} (paused)", row.label));
            }
            DownloadEvent::Resumed { .. } => row.bar.set_message(row.label.clone()),
            DownloadEvent::Completed { size, .. } => {
                row.bar.set_position(*size);
                row.bar
                    .finish_with_message(format!("✓ {}", row.label));
            }
            DownloadEvent::Failed { message, .. } => {
                row.bar
                    .abandon_with_message(format!("✗ {}: {message}", row.label));
            }
            DownloadEvent::Cancelled { .. } => {
                row.bar
                    .abandon_with_message(format!("✗ {} (cancelled)", row.label));
            }
            DownloadEvent::Started { .. } => {}
        }
    }
}
