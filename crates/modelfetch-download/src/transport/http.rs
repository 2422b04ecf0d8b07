//! HTTP transport backed by `reqwest`.
//!
//! Connect and read timeouts are configured on the client, so a stalled
//! body read surfaces as [`TransportError::Timeout`].

use std::error::Error as _;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_RANGE, RANGE};

use modelfetch_core::{DownloadManagerConfig, TransportError, TransportPort, TransportResponse};

/// Streaming GET over HTTP(S).
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .user_agent(concat!("modelfetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| classify(&e))?;
        Ok(Self { client })
    }

    /// Build a transport using the timeouts in `config`.
    pub fn from_config(config: &DownloadManagerConfig) -> Result<Self, TransportError> {
        Self::new(config.connect_timeout, config.read_timeout)
    }
}

#[async_trait]
impl TransportPort for ReqwestTransport {
    async fn stream_get(
        &self,
        url: &str,
        range_start: Option<u64>,
        headers: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        let mut request = self.client.get(url);
        if let Some(start) = range_start.filter(|start| *start > 0) {
            request = request.header(RANGE, format!("bytes={start}-"));
        }
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| classify(&e))?;
        let status = response.status().as_u16();
        let content_length = response.content_length();
        let range_total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total);

        tracing::debug!(
            target: "modelfetch.download",
            url,
            status,
            content_length,
            range_start,
            "HTTP response received"
        );

        let body = response
            .bytes_stream()
            .map(|chunk: Result<Bytes, reqwest::Error>| chunk.map_err(|e| classify(&e)))
            .boxed();

        Ok(TransportResponse {
            status,
            content_length,
            range_total,
            body,
        })
    }
}

/// Map a `reqwest` error onto the transport taxonomy.
pub(crate) fn classify(err: &reqwest::Error) -> TransportError {
    let message = error_chain(err);
    if err.is_timeout() {
        return TransportError::Timeout(message);
    }

    let lower = message.to_ascii_lowercase();
    if lower.contains("dns error")
        || lower.contains("failed to lookup address")
        || lower.contains("name or service not known")
        || lower.contains("no such host")
    {
        return TransportError::Dns(message);
    }
    if lower.contains("certificate") || lower.contains("tls") || lower.contains("ssl") {
        return TransportError::Tls(message);
    }
    if let Some(status) = err.status() {
        return TransportError::Status {
            status: status.as_u16(),
            message,
        };
    }
    TransportError::Connection(message)
}

fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Total resource length from a `Content-Range` value.
///
/// `bytes 100-199/1000` yields 1000; an unknown total (`/*`) yields `None`.
pub(crate) fn parse_content_range_total(value: &str) -> Option<u64> {
    let (unit, rest) = value.trim().split_once(' ')?;
    if !unit.eq_ignore_ascii_case("bytes") {
        return None;
    }
    let (_, total) = rest.rsplit_once('/')?;
    total.trim().parse().ok()
}
