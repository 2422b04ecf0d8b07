//! CLI bootstrap - the composition root.
//!
//! The only place where the download manager is wired to its adapters:
//! - `ReqwestTransport` for HTTP
//! - `LocalStorageResolver` rooted at the data directory
//! - `HostLookupProbe` for admission-time connectivity checks

use std::path::PathBuf;
use std::sync::Arc;

use modelfetch_core::{DownloadManagerConfig, DownloadManagerPort};
use modelfetch_download::{
    DownloadManagerDeps, HostLookupProbe, LocalStorageResolver, ReqwestTransport,
    build_download_manager,
};

use crate::error::CliError;

/// Directory name under the platform data directory.
const APP_DIR: &str = "modelfetch";

/// Default data directory, e.g. `~/.local/share/modelfetch` on Linux.
pub fn default_base_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join(APP_DIR))
}

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub base_dir: PathBuf,
    pub manager: DownloadManagerConfig,
}

impl CliConfig {
    /// Resolve the data directory: explicit override, else the platform default.
    pub fn resolve(base_dir: Option<PathBuf>) -> Result<Self, CliError> {
        let base_dir = base_dir
            .or_else(default_base_dir)
            .ok_or_else(|| CliError::Config("could not determine a data directory".into()))?;
        Ok(Self {
            base_dir,
            manager: DownloadManagerConfig::default(),
        })
    }

    #[must_use]
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.manager = self.manager.with_max_concurrent(max);
        self
    }

    #[must_use]
    pub fn with_retries(mut self, attempts: u32) -> Self {
        self.manager = self.manager.with_max_retry_attempts(attempts);
        self
    }
}

/// Fully composed context for CLI commands.
pub struct CliContext {
    pub downloads: Arc<dyn DownloadManagerPort>,
    pub storage: LocalStorageResolver,
}

/// Wire the download manager for this invocation.
pub fn bootstrap(config: &CliConfig) -> Result<CliContext, CliError> {
    let transport = ReqwestTransport::from_config(&config.manager)
        .map_err(|e| CliError::Config(format!("HTTP client: {e}")))?;
    let storage = LocalStorageResolver::new(&config.base_dir);

    let downloads = build_download_manager(DownloadManagerDeps {
        transport: Arc::new(transport),
        storage: Arc::new(storage.clone()),
        model_registry: None,
        connectivity: Some(Arc::new(HostLookupProbe::default())),
        config: config.manager.clone(),
    });
    tracing::debug!(
        base_dir = %config.base_dir.display(),
        max_concurrent = config.manager.max_concurrent,
        "CLI bootstrapped"
    );

    Ok(CliContext {
        downloads: Arc::new(downloads),
        storage,
    })
}
