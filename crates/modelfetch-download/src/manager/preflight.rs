//! Admission checks run before a task is registered.

use std::sync::Arc;

use url::Url;

use modelfetch_core::{
    ConnectivityProbePort, DownloadError, DownloadResult, StorageResolverPort,
};

/// Parse `raw` and require an http(s) scheme and a host.
pub fn validate_url(raw: &str) -> DownloadResult<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| DownloadError::invalid_url(raw, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(DownloadError::invalid_url(
            raw,
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(DownloadError::invalid_url(raw, "missing host"));
    }
    Ok(url)
}

pub async fn check_connectivity(
    probe: &dyn ConnectivityProbePort,
    url: &Url,
) -> DownloadResult<()> {
    if probe.is_reachable(url.as_str()).await {
        Ok(())
    } else {
        Err(DownloadError::network_unavailable(format!(
            "{} is not reachable",
            url.host_str().unwrap_or_default()
        )))
    }
}

/// Warn when free space is below `threshold`. Never blocks admission.
///
/// The free-space query touches every mount point, so it runs on the
/// blocking pool. Returns whether space was low.
pub async fn warn_if_low_space(storage: &Arc<dyn StorageResolverPort>, threshold: u64) -> bool {
    let storage = Arc::clone(storage);
    let available = tokio::task::spawn_blocking(move || storage.available_bytes())
        .await
        .ok()
        .flatten();
    match available {
        Some(available) if available < threshold => {
            tracing::warn!(
                target: "modelfetch.download",
                available,
                threshold,
                "Low free disk space for downloads"
            );
            true
        }
        _ => false,
    }
}
