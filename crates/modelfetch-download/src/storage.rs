//! Local filesystem storage resolver.
//!
//! Layout under the base directory:
//!
//! ```text
//! {base}/Downloads/{download_id}.part            partial files
//! {base}/Models/{kind}/{model_ref}/{file_name}   finished files
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sysinfo::Disks;
use url::Url;

use modelfetch_core::{DownloadId, DownloadRequest, StorageError, StorageResolverPort};

const DOWNLOADS_DIR: &str = "Downloads";
const MODELS_DIR: &str = "Models";

#[derive(Debug, Clone)]
pub struct LocalStorageResolver {
    base_dir: PathBuf,
}

impl LocalStorageResolver {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.base_dir.join(DOWNLOADS_DIR)
    }

    pub fn models_dir(&self) -> PathBuf {
        self.base_dir.join(MODELS_DIR)
    }

    /// Permanent path for a finished download.
    pub fn final_path(&self, request: &DownloadRequest) -> PathBuf {
        self.models_dir()
            .join(request.kind.dir_name())
            .join(sanitize_component(&request.model_ref))
            .join(file_name_for(request))
    }
}

#[async_trait]
impl StorageResolverPort for LocalStorageResolver {
    fn temp_path(&self, id: &DownloadId) -> PathBuf {
        self.downloads_dir().join(format!("{id}.part"))
    }

    async fn move_to_final(
        &self,
        temp_path: &Path,
        id: &DownloadId,
        request: &DownloadRequest,
    ) -> Result<PathBuf, StorageError> {
        let destination = self.final_path(request);
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Prepare {
                    path: parent.to_path_buf(),
                    message: e.to_string(),
                })?;
        }

        let move_error = |e: std::io::Error| StorageError::Move {
            from: temp_path.to_path_buf(),
            to: destination.clone(),
            message: e.to_string(),
        };

        if let Err(rename_err) = tokio::fs::rename(temp_path, &destination).await {
            // Rename fails across filesystems; fall back to copy + delete.
            tracing::debug!(
                target: "modelfetch.download",
                id = %id,
                error = %rename_err,
                "Rename failed, copying instead"
            );
            tokio::fs::copy(temp_path, &destination)
                .await
                .map_err(move_error)?;
            tokio::fs::remove_file(temp_path)
                .await
                .map_err(move_error)?;
        }

        Ok(destination)
    }

    fn available_bytes(&self) -> Option<u64> {
        let target = existing_ancestor(&self.base_dir)?;
        let disks = Disks::new_with_refreshed_list();
        disks
            .list()
            .iter()
            .filter(|disk| target.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(sysinfo::Disk::available_space)
    }
}

/// The closest existing ancestor of `path`, canonicalized.
fn existing_ancestor(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .find(|candidate| candidate.exists())
        .and_then(|candidate| candidate.canonicalize().ok())
}

/// Last non-empty URL path segment, or `{model_ref}.bin`.
fn file_name_for(request: &DownloadRequest) -> String {
    Url::parse(&request.url)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|segment| !segment.is_empty())
        .map_or_else(
            || format!("{}.bin", sanitize_component(&request.model_ref)),
            |segment| sanitize_component(&segment),
        )
}

/// Make `value` safe to use as a single path component.
fn sanitize_component(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
