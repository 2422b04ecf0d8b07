//! CLI-specific error types and exit codes.

use modelfetch_core::{DownloadError, DownloadErrorKind};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// A download could not be started.
    #[error("{0}")]
    Download(String),

    /// One or more downloads ended in failure.
    #[error("{failed} of {total} downloads failed")]
    DownloadsFailed { failed: usize, total: usize },

    /// Interrupted from the terminal.
    #[error("Interrupted")]
    Interrupted,

    /// Argument validation error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network is unreachable.
    #[error("{0}")]
    Unavailable(String),
}

impl CliError {
    /// Map error to an exit code (see sysexits.h).
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Download(_) | Self::DownloadsFailed { .. } => 1,
            Self::Arguments(_) => 2,    // EX_USAGE
            Self::Unavailable(_) => 69, // EX_UNAVAILABLE
            Self::Io(_) => 74,          // EX_IOERR
            Self::Config(_) => 78,      // EX_CONFIG
            Self::Interrupted => 130,
        }
    }
}

impl From<DownloadError> for CliError {
    fn from(err: DownloadError) -> Self {
        match err.kind() {
            DownloadErrorKind::InvalidUrl => Self::Arguments(err.user_message()),
            DownloadErrorKind::NetworkUnavailable => Self::Unavailable(err.user_message()),
            DownloadErrorKind::FileError | DownloadErrorKind::InsufficientStorage => {
                Self::Io(err.user_message())
            }
            _ => Self::Download(err.user_message()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
