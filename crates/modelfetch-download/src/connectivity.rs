//! Connectivity probe that resolves the download host.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use modelfetch_core::ConnectivityProbePort;

/// Reports a URL reachable when its host resolves within the timeout.
#[derive(Debug, Clone, Copy)]
pub struct HostLookupProbe {
    timeout: Duration,
}

impl HostLookupProbe {
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HostLookupProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl ConnectivityProbePort for HostLookupProbe {
    async fn is_reachable(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        let port = parsed.port_or_known_default().unwrap_or(443);
        // IPv6 literals come back bracketed.
        let host = host.trim_start_matches('[').trim_end_matches(']');

        match tokio::time::timeout(self.timeout, tokio::net::lookup_host((host, port))).await {
            Ok(Ok(mut addrs)) => addrs.next().is_some(),
            Ok(Err(e)) => {
                tracing::debug!(target: "modelfetch.download", host, error = %e, "Host lookup failed");
                false
            }
            Err(_) => {
                tracing::debug!(target: "modelfetch.download", host, "Host lookup timed out");
                false
            }
        }
    }
}
