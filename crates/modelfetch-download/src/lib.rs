//! Resumable, concurrent download manager for model artifacts.
//!
//! # Structure
//!
//! - `manager` - `DownloadManager`, the `DownloadManagerPort` implementation
//! - `scheduler` - bounded pool of K concurrent runs with FIFO admission
//! - `worker` - one run: connect, stream, verify, finalize, retry
//! - `registry` - insertion-ordered task store
//! - `checksum` - streaming SHA-256 verification
//! - `listeners` - panic-isolated listener fan-out and a broadcast adapter
//! - `progress` - progress throttle and speed/ETA estimation
//! - `transport`, `storage`, `connectivity` - default adapters for the ports

#![deny(unused_crate_dependencies)]

// Re-export core types for convenience
pub use modelfetch_core::download::{
    DownloadError, DownloadErrorKind, DownloadEvent, DownloadId, DownloadManagerConfig,
    DownloadPriority, DownloadRequest, DownloadResult, DownloadSnapshot, DownloadStatus,
    ModelKind, ProgressSnapshot,
};
pub use modelfetch_core::ports::{
    AssumeOnline, ConnectivityProbePort, DownloadListener, DownloadManagerPort, ListenerId,
    ModelRegistryPort, NoopListener, NoopModelRegistry, StorageResolverPort, TransportPort,
};

pub mod checksum;
mod connectivity;
mod listeners;
mod manager;
pub(crate) mod progress;
mod registry;
pub(crate) mod scheduler;
mod storage;
mod transport;
mod worker;

pub use connectivity::HostLookupProbe;
pub use listeners::{ChannelListener, ListenerSet};
pub use manager::{DownloadManager, DownloadManagerDeps, build_download_manager, validate_url};
pub use progress::{ProgressThrottle, SpeedTracker};
pub use registry::TaskRegistry;
pub use storage::LocalStorageResolver;
pub use transport::ReqwestTransport;

// Used only by integration tests
#[cfg(test)]
use mockall as _;
#[cfg(test)]
use serde_json as _;
