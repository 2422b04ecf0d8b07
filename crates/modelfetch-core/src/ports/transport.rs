//! Transport port: streaming GET with an optional range start.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use thiserror::Error;

use crate::download::DownloadError;

/// Errors surfaced by a transport adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connect or read timed out: {0}")]
    Timeout(String),

    #[error("DNS resolution failed: {0}")]
    Dns(String),

    #[error("TLS failure: {0}")]
    Tls(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("connection failed: {0}")]
    Connection(String),
}

impl From<TransportError> for DownloadError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(message) => Self::Timeout { message },
            TransportError::Dns(message) => Self::Dns { message },
            TransportError::Tls(message) => Self::Ssl { message },
            TransportError::Status { status, message } => Self::Server { status, message },
            TransportError::Connection(message) => Self::Network {
                message,
                status_code: None,
            },
        }
    }
}

/// Body of a response, yielded in whatever pieces the adapter receives.
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// An opened response.
pub struct TransportResponse {
    pub status: u16,
    /// `Content-Length` of this response body, if advertised.
    pub content_length: Option<u64>,
    /// Total resource length parsed from `Content-Range`, for 206 and 416
    /// responses.
    pub range_total: Option<u64>,
    pub body: ByteStream,
}

impl TransportResponse {
    /// Whether the server honoured a range request.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        self.status == 206
    }

    /// Whether the requested range starts at or past the end of the resource.
    #[must_use]
    pub const fn is_range_not_satisfiable(&self) -> bool {
        self.status == 416
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.status >= 400
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .field("range_total", &self.range_total)
            .finish_non_exhaustive()
    }
}

/// Performs streaming GETs.
///
/// Adapters enforce connect and read timeouts and report them as
/// [`TransportError::Timeout`]. A 4xx/5xx answer is returned as a response,
/// not an error, so the caller can classify it.
#[async_trait]
pub trait TransportPort: Send + Sync {
    async fn stream_get(
        &self,
        url: &str,
        range_start: Option<u64>,
        headers: &[(String, String)],
    ) -> Result<TransportResponse, TransportError>;
}
