//! Terminal renderings of download events.

mod json;
mod progress;

pub use json::JsonLinesListener;
pub use progress::TerminalProgress;

use indicatif::HumanBytes;

/// Human-readable byte count.
pub fn format_bytes(bytes: u64) -> String {
    HumanBytes(bytes).to_string()
}

/// Truncate `raw` to at most `max` characters, marking the cut with `…`.
pub fn truncate_label(raw: &str, max: usize) -> String {
    if raw.chars().count() <= max {
        return raw.to_string();
    }
    let mut buf: String = raw.chars().take(max.saturating_sub(1)).collect();
    buf.push('…');
    buf
}
