//! Storage resolver port: where partial and finished files live.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::download::{DownloadError, DownloadId, DownloadRequest};

/// Errors from a storage resolver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("failed to move {from} to {to}: {message}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        message: String,
    },

    #[error("failed to prepare {path}: {message}")]
    Prepare { path: PathBuf, message: String },
}

impl From<StorageError> for DownloadError {
    fn from(err: StorageError) -> Self {
        Self::io("Storage", err.to_string())
    }
}

/// Supplies destination paths and finalizes completed transfers.
#[async_trait]
pub trait StorageResolverPort: Send + Sync {
    /// Temporary destination for a task's partial file.
    fn temp_path(&self, id: &DownloadId) -> PathBuf;

    /// Move a completed temp file to its permanent location.
    async fn move_to_final(
        &self,
        temp_path: &Path,
        id: &DownloadId,
        request: &DownloadRequest,
    ) -> Result<PathBuf, StorageError>;

    /// Free bytes on the destination volume, if it can be determined.
    fn available_bytes(&self) -> Option<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::DownloadErrorKind;

    #[test]
    fn test_storage_error_is_file_error() {
        let err = StorageError::Move {
            from: PathBuf::from("/a"),
            to: PathBuf::from("/b"),
            message: "cross-device".into(),
        };
        let download_err = DownloadError::from(err);
        assert_eq!(download_err.kind(), DownloadErrorKind::FileError);
        assert!(download_err.to_string().contains("cross-device"));
    }
}
