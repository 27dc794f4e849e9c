//! Content-side end of the bridge.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, OnceCell};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, instrument, trace, warn};
use uuid::Uuid;

use pagegenie_core::{defaults, logging};
use pagegenie_core::{Error, LocalChannel, LocalRequest, ProgressSender, Result};

use super::pending::{PendingRequests, Reply};
use super::protocol::{BridgeEnd, BridgeMessage};

/// Prefix of progress lines relayed from the page side.
pub const PROGRESS_PREFIX: &str = "On-device • ";

/// Bridge client timing.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `PAGEGENIE_LOCAL_TIMEOUT_SECS` | 20 | Wait for a correlated response |
#[derive(Debug, Clone)]
pub struct BridgeClientConfig {
    pub request_timeout: Duration,
    pub probe_timeout: Duration,
}

impl Default for BridgeClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(defaults::LOCAL_TIMEOUT_SECS),
            probe_timeout: Duration::from_millis(defaults::LOCAL_PROBE_TIMEOUT_MS),
        }
    }
}

impl BridgeClientConfig {
    pub fn from_env() -> Self {
        let secs = std::env::var("PAGEGENIE_LOCAL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::LOCAL_TIMEOUT_SECS)
            .max(1);
        Self {
            request_timeout: Duration::from_secs(secs),
            ..Self::default()
        }
    }
}

type ReadyWaiters = Arc<Mutex<Vec<oneshot::Sender<bool>>>>;

/// [`LocalChannel`] that posts requests across the bridge and awaits the
/// correlated responses.
pub struct BridgeClient {
    tx: mpsc::Sender<BridgeMessage>,
    pending: Arc<PendingRequests>,
    ready_waiters: ReadyWaiters,
    available: OnceCell<bool>,
    config: BridgeClientConfig,
    reader: JoinHandle<()>,
}

impl BridgeClient {
    /// Take the content end of a bridge and start routing its inbound
    /// messages. Must be called inside a tokio runtime.
    pub fn new(end: BridgeEnd, config: BridgeClientConfig) -> Self {
        let BridgeEnd { tx, rx } = end;
        let pending = PendingRequests::new();
        let ready_waiters: ReadyWaiters = Arc::new(Mutex::new(Vec::new()));
        let reader = tokio::spawn(read_loop(
            rx,
            Arc::clone(&pending),
            Arc::clone(&ready_waiters),
        ));
        Self {
            tx,
            pending,
            ready_waiters,
            available: OnceCell::new(),
            config,
            reader,
        }
    }

    /// Number of requests still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Page side still attached.
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    async fn probe(&self) -> bool {
        if !self.is_alive() {
            return false;
        }
        let (ready_tx, ready_rx) = oneshot::channel();
        self.ready_waiters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ready_tx);

        if self.tx.send(BridgeMessage::Ping).await.is_err() {
            return false;
        }
        match timeout(self.config.probe_timeout, ready_rx).await {
            Ok(Ok(ready)) => {
                debug!(subsystem = "bridge", component = "client", ready, "Probe answered");
                ready
            }
            _ => {
                debug!(subsystem = "bridge", component = "client", "Probe unanswered");
                false
            }
        }
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl LocalChannel for BridgeClient {
    /// Probed once; the answer is kept for the client's lifetime.
    async fn is_available(&self) -> bool {
        *self.available.get_or_init(|| self.probe()).await
    }

    #[instrument(
        skip(self, request, progress),
        fields(subsystem = "bridge", component = "client", op = %request.operation, request_id = tracing::field::Empty)
    )]
    async fn execute(
        &self,
        request: LocalRequest,
        progress: Option<ProgressSender>,
    ) -> Result<String> {
        if !self.is_alive() {
            return Err(Error::ExtensionContextInvalidated);
        }

        let id = Uuid::now_v7().to_string();
        tracing::Span::current().record(logging::REQUEST_ID, id.as_str());

        let (_guard, reply_rx) = self.pending.register(&id, progress);
        self.tx
            .send(BridgeMessage::request(&id, &request))
            .await
            .map_err(|_| Error::ExtensionContextInvalidated)?;

        let start = Instant::now();
        let reply = match timeout(self.config.request_timeout, reply_rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => {
                warn!("Page side closed while waiting");
                return Err(Error::ExtensionContextInvalidated);
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.config.request_timeout.as_secs(),
                    "On-device request timed out"
                );
                return Err(Error::LocalUnavailable("On-device AI timeout".to_string()));
            }
        };

        debug!(
            ok = reply.ok,
            duration_ms = start.elapsed().as_millis() as u64,
            "On-device response"
        );
        if reply.ok {
            Ok(reply.result.unwrap_or_default())
        } else {
            Err(Error::LocalUnavailable(
                reply
                    .error
                    .unwrap_or_else(|| "On-device AI failed".to_string()),
            ))
        }
    }
}

async fn read_loop(
    mut rx: mpsc::Receiver<BridgeMessage>,
    pending: Arc<PendingRequests>,
    ready_waiters: ReadyWaiters,
) {
    while let Some(msg) = rx.recv().await {
        trace!(subsystem = "bridge", component = "client", kind = msg.kind(), "Inbound");
        match msg {
            BridgeMessage::Response {
                id,
                ok,
                result,
                error,
            } => {
                if !pending.resolve(&id, Reply { ok, result, error }) {
                    trace!(request_id = %id, "Response for unknown request");
                }
            }
            BridgeMessage::Progress { id, message } => {
                pending.progress(&id, format!("{PROGRESS_PREFIX}{message}"));
            }
            BridgeMessage::Ready { ready } => {
                let waiters: Vec<_> = ready_waiters
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .drain(..)
                    .collect();
                for waiter in waiters {
                    let _ = waiter.send(ready);
                }
            }
            BridgeMessage::Request { .. } | BridgeMessage::Ping => {}
        }
    }

    let dropped = pending.close_all();
    ready_waiters
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clear();
    debug!(
        subsystem = "bridge",
        component = "client",
        dropped,
        "Page side detached"
    );
}
