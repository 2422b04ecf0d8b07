//! Shared fixtures for download manager integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream;
use tempfile::TempDir;
use tokio::sync::watch;

use modelfetch_core::{TransportError, TransportPort, TransportResponse};
use modelfetch_download::{
    ConnectivityProbePort, DownloadEvent, DownloadId, DownloadListener, DownloadManager,
    DownloadManagerConfig, DownloadManagerDeps, DownloadManagerPort, DownloadStatus,
    LocalStorageResolver, ModelRegistryPort, build_download_manager,
};

pub const MIB: usize = 1024 * 1024;
pub const PIECE: usize = 64 * 1024;

/// Deterministic, non-repeating-at-power-of-two content.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// In-memory, range-capable resource server.
pub struct MockTransport {
    data: Bytes,
    status: Option<u16>,
    honor_range: bool,
    advertise_length: bool,
    advertised_override: Option<u64>,
    gate: Mutex<Option<(u64, watch::Receiver<bool>)>>,
    gate_every_request: bool,
    fail_once_at: Mutex<Option<u64>>,
    requests: Mutex<Vec<Option<u64>>>,
}

/// Opens a [`MockTransport`] gate.
pub struct GateHandle(watch::Sender<bool>);

impl GateHandle {
    pub fn open(&self) {
        let _ = self.0.send(true);
    }
}

impl MockTransport {
    pub fn serving(data: Vec<u8>) -> Self {
        Self {
            data: Bytes::from(data),
            status: None,
            honor_range: true,
            advertise_length: true,
            advertised_override: None,
            gate: Mutex::new(None),
            gate_every_request: false,
            fail_once_at: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_with(status: u16) -> Self {
        let mut transport = Self::serving(Vec::new());
        transport.status = Some(status);
        transport
    }

    /// Hold the first response body once `offset` bytes have been sent.
    ///
    /// Ranges starting at or past the end of the data are answered with 416.
    pub fn gated_at(mut self, offset: u64) -> (Self, GateHandle) {
        let (tx, rx) = watch::channel(false);
        self.gate = Mutex::new(Some((offset, rx)));
        (self, GateHandle(tx))
    }

    /// Hold every response body at `offset` until the gate opens.
    pub fn gated_every_request_at(self, offset: u64) -> (Self, GateHandle) {
        let (mut transport, gate) = self.gated_at(offset);
        transport.gate_every_request = true;
        (transport, gate)
    }

    pub const fn ignoring_ranges(mut self) -> Self {
        self.honor_range = false;
        self
    }

    pub const fn without_length(mut self) -> Self {
        self.advertise_length = false;
        self
    }

    pub const fn advertising_length(mut self, length: u64) -> Self {
        self.advertised_override = Some(length);
        self
    }

    /// Reset the connection once `offset` bytes have been sent.
    pub fn resetting_once_at(self, offset: u64) -> Self {
        *self.fail_once_at.lock().unwrap() = Some(offset);
        self
    }

    /// Range start of every request, in order.
    pub fn requests(&self) -> Vec<Option<u64>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

struct BodyState {
    data: Bytes,
    pos: usize,
    gate: Option<(u64, watch::Receiver<bool>)>,
    fail_at: Option<u64>,
}

#[async_trait]
impl TransportPort for MockTransport {
    async fn stream_get(
        &self,
        _url: &str,
        range_start: Option<u64>,
        _headers: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(range_start);

        if let Some(status) = self.status {
            return Ok(TransportResponse {
                status,
                content_length: None,
                range_total: None,
                body: stream::empty().boxed(),
            });
        }

        let total = self.data.len() as u64;
        if self.honor_range && range_start.is_some_and(|start| start >= total) {
            return Ok(TransportResponse {
                status: 416,
                content_length: None,
                range_total: Some(total),
                body: stream::empty().boxed(),
            });
        }
        let (start, status, range_total) = match range_start {
            Some(start) if self.honor_range => (start, 206, Some(total)),
            _ => (0, 200, None),
        };
        let content_length = self
            .advertised_override
            .or_else(|| self.advertise_length.then_some(total - start));

        let gate = {
            let mut gate = self.gate.lock().unwrap();
            if self.gate_every_request {
                gate.clone()
            } else {
                gate.take()
            }
        };
        let state = BodyState {
            data: self.data.clone(),
            pos: usize::try_from(start).unwrap(),
            gate,
            fail_at: self.fail_once_at.lock().unwrap().take(),
        };

        let body = stream::unfold(state, |mut st| async move {
            let pos = st.pos as u64;
            // A gate at the end of the data holds the body open after the last byte.
            if let Some((at, rx)) = st.gate.as_mut() {
                if pos >= *at {
                    let _ = rx.wait_for(|open| *open).await;
                    st.gate = None;
                }
            }
            if st.pos >= st.data.len() {
                return None;
            }
            if st.fail_at.is_some_and(|at| pos >= at) {
                st.fail_at = None;
                st.pos = st.data.len();
                return Some((Err(TransportError::Connection("connection reset".into())), st));
            }

            let mut end = (st.pos + PIECE).min(st.data.len());
            for stop in [st.gate.as_ref().map(|(at, _)| *at), st.fail_at] {
                if let Some(stop) = stop.and_then(|s| usize::try_from(s).ok()) {
                    if stop > st.pos {
                        end = end.min(stop);
                    }
                }
            }
            let piece = st.data.slice(st.pos..end);
            st.pos = end;
            Some((Ok(piece), st))
        })
        .boxed();

        Ok(TransportResponse {
            status,
            content_length,
            range_total,
            body,
        })
    }
}

/// Records every event it receives.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<DownloadEvent>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<DownloadEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn events_for(&self, id: &DownloadId) -> Vec<DownloadEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.id() == id)
            .collect()
    }

    /// `(downloaded, total)` of every progress event for `id`.
    pub fn progress_for(&self, id: &DownloadId) -> Vec<(u64, i64)> {
        self.events_for(id)
            .into_iter()
            .filter_map(|event| match event {
                DownloadEvent::Progress {
                    downloaded, total, ..
                } => Some((downloaded, total)),
                _ => None,
            })
            .collect()
    }

    pub fn has_terminal_event(&self, id: &DownloadId) -> bool {
        self.events_for(id).iter().any(DownloadEvent::is_terminal)
    }
}

impl DownloadListener for RecordingListener {
    fn on_event(&self, event: &DownloadEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Records every registry hook call.
#[derive(Default)]
pub struct RecordingRegistry {
    calls: Mutex<Vec<(String, Option<PathBuf>)>>,
}

impl RecordingRegistry {
    pub fn calls(&self) -> Vec<(String, Option<PathBuf>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ModelRegistryPort for RecordingRegistry {
    fn update_download_status(&self, model_ref: &str, final_path: Option<PathBuf>) {
        self.calls
            .lock()
            .unwrap()
            .push((model_ref.to_string(), final_path));
    }
}

pub struct Offline;

#[async_trait]
impl ConnectivityProbePort for Offline {
    async fn is_reachable(&self, _url: &str) -> bool {
        false
    }
}

pub fn test_config() -> DownloadManagerConfig {
    DownloadManagerConfig::default()
        .with_progress_interval(Duration::from_millis(1))
        .with_retry_delay(Duration::from_millis(10))
        .with_shutdown_timeout(Duration::from_secs(2))
}

pub struct Harness {
    pub dir: TempDir,
    pub storage: LocalStorageResolver,
    pub transport: Arc<MockTransport>,
    pub listener: Arc<RecordingListener>,
    pub registry: Arc<RecordingRegistry>,
    pub manager: DownloadManager,
}

impl Harness {
    pub fn new(transport: MockTransport) -> Self {
        Self::with_config(transport, test_config())
    }

    pub fn with_config(transport: MockTransport, config: DownloadManagerConfig) -> Self {
        Self::build(transport, config, Arc::new(RecordingRegistry::default()), None)
    }

    pub fn build(
        transport: MockTransport,
        config: DownloadManagerConfig,
        registry: Arc<RecordingRegistry>,
        connectivity: Option<Arc<dyn ConnectivityProbePort>>,
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorageResolver::new(dir.path());
        let transport = Arc::new(transport);
        let manager = build_download_manager(DownloadManagerDeps {
            transport: transport.clone(),
            storage: Arc::new(storage.clone()),
            model_registry: Some(registry.clone()),
            connectivity,
            config,
        });
        let listener = Arc::new(RecordingListener::default());
        manager.add_listener(listener.clone());
        Self {
            dir,
            storage,
            transport,
            listener,
            registry,
            manager,
        }
    }

    /// Wait until the task with `id` has emitted a terminal event.
    pub async fn wait_terminal(&self, id: &DownloadId) {
        wait_until(|| self.listener.has_terminal_event(id)).await;
    }

    pub async fn wait_downloaded(&self, id: &DownloadId, bytes: u64) {
        wait_until(|| {
            self.manager
                .get_progress_snapshot(id)
                .is_some_and(|progress| progress.downloaded >= bytes)
        })
        .await;
    }

    pub fn count_in(&self, status: DownloadStatus) -> usize {
        self.manager
            .list_active()
            .iter()
            .filter(|snapshot| snapshot.status == status)
            .count()
    }
}

/// Poll `condition` every few milliseconds, failing after ten seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within 10s"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
