//! Port definitions (trait abstractions) for external collaborators.
//!
//! Ports define the interfaces the download core expects from
//! infrastructure. They contain no implementation details and use only
//! domain types.
//!
//! # Design Rules
//!
//! - No `reqwest` or filesystem types in any signature
//! - Adapter errors convert into `DownloadError` via `From`
//! - Every optional capability has a safe default implementation

pub mod connectivity;
pub mod download_manager;
pub mod listener;
pub mod model_registry;
pub mod storage;
pub mod transport;

pub use connectivity::{AssumeOnline, ConnectivityProbePort};
pub use download_manager::DownloadManagerPort;
pub use listener::{DownloadListener, ListenerId, NoopListener};
pub use model_registry::{ModelRegistryPort, NoopModelRegistry};
pub use storage::{StorageError, StorageResolverPort};
pub use transport::{ByteStream, TransportError, TransportPort, TransportResponse};
