//! Connectivity probe port.
//!
//! Consulted once per admission. Without a platform-specific probe the
//! manager uses [`AssumeOnline`] and lets the transfer itself surface
//! network failures.

use async_trait::async_trait;

#[async_trait]
pub trait ConnectivityProbePort: Send + Sync {
    /// Whether `url`'s host looks reachable right now.
    async fn is_reachable(&self, url: &str) -> bool;
}

/// Probe that always reports the network as reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeOnline;

#[async_trait]
impl ConnectivityProbePort for AssumeOnline {
    async fn is_reachable(&self, _url: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_assume_online() {
        assert!(AssumeOnline.is_reachable("https://example.com").await);
    }
}
