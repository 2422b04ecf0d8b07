//! Core domain types and ports for modelfetch.
//!
//! This crate holds everything the download manager shares with its
//! adapters: identifiers, the status graph, the error taxonomy, the task
//! record, events, configuration, and the port traits for transport,
//! storage, registry, connectivity and listeners. It performs no I/O.

#![deny(unused_crate_dependencies)]

pub mod download;
pub mod ports;

// Re-export commonly used types for convenience
pub use download::{
    DownloadError, DownloadErrorKind, DownloadEvent, DownloadId, DownloadManagerConfig,
    DownloadPriority, DownloadRequest, DownloadResult, DownloadSnapshot, DownloadStatus,
    DownloadTask, ModelKind, ProgressSnapshot, overall_progress, progress_percent,
};
pub use ports::{
    AssumeOnline, ByteStream, ConnectivityProbePort, DownloadListener, DownloadManagerPort,
    ListenerId, ModelRegistryPort, NoopListener, NoopModelRegistry, StorageError,
    StorageResolverPort, TransportError, TransportPort, TransportResponse,
};
