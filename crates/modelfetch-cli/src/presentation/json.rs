//! JSON-lines event output for scripts.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use modelfetch_core::{DownloadEvent, DownloadListener};

/// Writes every event as one JSON object per line.
pub struct JsonLinesListener<W: Write + Send> {
    out: Mutex<W>,
}

impl JsonLinesListener<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> JsonLinesListener<W> {
    pub const fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> DownloadListener for JsonLinesListener<W> {
    fn on_event(&self, event: &DownloadEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize download event");
                return;
            }
        };
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            tracing::debug!(error = %e, "Failed to write download event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelfetch_core::DownloadId;

    #[test]
    fn test_writes_one_object_per_line() {
        let listener = JsonLinesListener::new(Vec::new());
        let id = DownloadId::new("d1");
        listener.on_event(&DownloadEvent::Paused { id: id.clone() });
        listener.on_event(&DownloadEvent::Progress {
            id,
            downloaded: 10,
            total: -1,
            pct: 0.0,
            speed_bps: 0.0,
            eta_seconds: None,
        });

        let output = String::from_utf8(listener.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "paused");
        assert_eq!(lines[0]["id"], "d1");
        assert_eq!(lines[1]["type"], "progress");
        assert_eq!(lines[1]["total"], -1);
    }
}
