//! Model registry hook.
//!
//! The manager reports the outcome of every download to the registry that
//! owns model bookkeeping. Registry internals are outside this crate.

use std::path::PathBuf;

/// Receives download outcomes keyed by the caller's model reference.
pub trait ModelRegistryPort: Send + Sync {
    /// `Some(path)` after a successful download, `None` after failure or cancel.
    fn update_download_status(&self, model_ref: &str, final_path: Option<PathBuf>);
}

/// Registry hook that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopModelRegistry;

impl ModelRegistryPort for NoopModelRegistry {
    fn update_download_status(&self, _model_ref: &str, _final_path: Option<PathBuf>) {}
}
