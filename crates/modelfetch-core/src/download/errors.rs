//! Download error types.
//!
//! These errors are serializable and never carry `std::io::Error` or
//! transport-library errors directly. I/O failures are captured as kind and
//! message strings so snapshots and events can cross any boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a download failure.
///
/// Every [`DownloadError`] maps to exactly one kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DownloadErrorKind {
    InvalidUrl,
    NetworkUnavailable,
    NetworkError,
    DnsError,
    SslError,
    ServerError,
    Timeout,
    InsufficientStorage,
    FileError,
    ChecksumFailed,
    Cancelled,
    Unknown,
}

impl DownloadErrorKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidUrl => "INVALID_URL",
            Self::NetworkUnavailable => "NETWORK_UNAVAILABLE",
            Self::NetworkError => "NETWORK_ERROR",
            Self::DnsError => "DNS_ERROR",
            Self::SslError => "SSL_ERROR",
            Self::ServerError => "SERVER_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::InsufficientStorage => "INSUFFICIENT_STORAGE",
            Self::FileError => "FILE_ERROR",
            Self::ChecksumFailed => "CHECKSUM_FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Whether a failure of this kind is worth another attempt.
    ///
    /// Only transient transport failures qualify.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError | Self::Timeout)
    }
}

impl fmt::Display for DownloadErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for download operations.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum DownloadError {
    /// The URL could not be parsed or is not http(s).
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// No network connectivity at admission time.
    #[error("Network unavailable: {message}")]
    NetworkUnavailable { message: String },

    /// Network/HTTP error during download.
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },

    /// Host name could not be resolved.
    #[error("DNS error: {message}")]
    Dns { message: String },

    /// TLS handshake or certificate failure.
    #[error("SSL error: {message}")]
    Ssl { message: String },

    /// The server answered with a 4xx/5xx status.
    #[error("Server returned HTTP {status}: {message}")]
    Server { status: u16, message: String },

    /// Connect or read timeout.
    #[error("Timed out: {message}")]
    Timeout { message: String },

    /// The destination disk is full.
    #[error("Insufficient storage: {message}")]
    InsufficientStorage { message: String },

    /// I/O error during file operations.
    #[error("I/O error ({kind}): {message}")]
    Io {
        /// The kind of I/O error (e.g., "`NotFound`", "`PermissionDenied`").
        kind: String,
        message: String,
    },

    /// Integrity check failed (checksum mismatch).
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumFailed { expected: String, actual: String },

    /// Download was cancelled by user.
    #[error("Download cancelled")]
    Cancelled,

    /// The manager no longer accepts work.
    #[error("Download manager is shut down")]
    ManagerShutdown,

    /// General/uncategorized error.
    #[error("{message}")]
    Other { message: String },
}

impl DownloadError {
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn network_unavailable(message: impl Into<String>) -> Self {
        Self::NetworkUnavailable {
            message: message.into(),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            status_code: None,
        }
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create an I/O error from kind and message strings.
    pub fn io(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Io {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Create an error from a `std::io::Error`.
    ///
    /// A full disk is reported as [`DownloadError::InsufficientStorage`],
    /// everything else as [`DownloadError::Io`].
    #[must_use]
    pub fn from_io_error(err: &std::io::Error) -> Self {
        let kind = err.kind();
        if kind == std::io::ErrorKind::StorageFull {
            return Self::InsufficientStorage {
                message: err.to_string(),
            };
        }
        Self::Io {
            kind: format!("{kind:?}"),
            message: err.to_string(),
        }
    }

    pub fn checksum_failed(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::ChecksumFailed {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a general error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// The taxonomy kind of this error.
    #[must_use]
    pub const fn kind(&self) -> DownloadErrorKind {
        match self {
            Self::InvalidUrl { .. } => DownloadErrorKind::InvalidUrl,
            Self::NetworkUnavailable { .. } => DownloadErrorKind::NetworkUnavailable,
            Self::Network { .. } => DownloadErrorKind::NetworkError,
            Self::Dns { .. } => DownloadErrorKind::DnsError,
            Self::Ssl { .. } => DownloadErrorKind::SslError,
            Self::Server { .. } => DownloadErrorKind::ServerError,
            Self::Timeout { .. } => DownloadErrorKind::Timeout,
            Self::InsufficientStorage { .. } => DownloadErrorKind::InsufficientStorage,
            Self::Io { .. } => DownloadErrorKind::FileError,
            Self::ChecksumFailed { .. } => DownloadErrorKind::ChecksumFailed,
            Self::Cancelled => DownloadErrorKind::Cancelled,
            Self::ManagerShutdown | Self::Other { .. } => DownloadErrorKind::Unknown,
        }
    }

    /// Check if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Get a user-friendly message for display.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidUrl { url, .. } => format!("'{url}' is not a valid download URL"),
            Self::NetworkUnavailable { .. } => "No network connection available".to_string(),
            Self::Network { message, .. } => format!("Network error: {message}"),
            Self::Dns { .. } => "Could not resolve the download host".to_string(),
            Self::Ssl { .. } => "Secure connection to the download host failed".to_string(),
            Self::Server { status, .. } => format!("The server responded with HTTP {status}"),
            Self::Timeout { .. } => "The connection timed out".to_string(),
            Self::InsufficientStorage { .. } => "Not enough free disk space".to_string(),
            Self::Io { message, .. } => format!("File error: {message}"),
            Self::ChecksumFailed { .. } => {
                "Downloaded file is corrupted (checksum mismatch)".to_string()
            }
            Self::Cancelled => "Download was cancelled".to_string(),
            Self::ManagerShutdown => "The download manager is shut down".to_string(),
            Self::Other { message } => message.clone(),
        }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io_error(&err)
    }
}

/// Result type alias for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;
