//! Call-counting channel stubs for deterministic testing.
//!
//! ## Usage
//!
//! ```rust
//! use pagegenie_client::mock::{MockLocalChannel, MockRemoteChannel};
//!
//! let local = MockLocalChannel::failing("no model");
//! let remote = MockRemoteChannel::responding("from cloud");
//! assert_eq!(local.call_count(), 0);
//! assert_eq!(remote.call_count(), 0);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use pagegenie_core::{
    AiRequest, BackendTransport, Error, LocalChannel, LocalRequest, ProgressSender, RemoteChannel,
    Result,
};

/// How a stub answers each call.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Respond(String),
    /// `LocalUnavailable(msg)` for the local stub, `BackendError{500, msg}`
    /// for the remote stub.
    Fail(String),
    Unauthorized,
    Invalidated,
}

impl MockOutcome {
    fn local_result(&self) -> Result<String> {
        match self {
            Self::Respond(text) => Ok(text.clone()),
            Self::Fail(msg) => Err(Error::LocalUnavailable(msg.clone())),
            Self::Unauthorized => Err(Error::Unauthorized),
            Self::Invalidated => Err(Error::ExtensionContextInvalidated),
        }
    }

    fn remote_result(&self) -> Result<String> {
        match self {
            Self::Respond(text) => Ok(text.clone()),
            Self::Fail(msg) => Err(Error::BackendError {
                status: 500,
                body: msg.clone(),
            }),
            Self::Unauthorized => Err(Error::Unauthorized),
            Self::Invalidated => Err(Error::ExtensionContextInvalidated),
        }
    }
}

// =============================================================================
// LOCAL CHANNEL
// =============================================================================

/// Stub on-device channel.
#[derive(Clone)]
pub struct MockLocalChannel {
    available: bool,
    outcome: MockOutcome,
    progress: Vec<String>,
    calls: Arc<Mutex<Vec<LocalRequest>>>,
}

impl MockLocalChannel {
    pub fn responding(text: impl Into<String>) -> Self {
        Self::with_outcome(MockOutcome::Respond(text.into()))
    }

    pub fn failing(msg: impl Into<String>) -> Self {
        Self::with_outcome(MockOutcome::Fail(msg.into()))
    }

    pub fn with_outcome(outcome: MockOutcome) -> Self {
        Self {
            available: true,
            outcome,
            progress: Vec::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Report the capability as absent from `is_available`.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Emit these progress lines on every call.
    pub fn with_progress(mut self, lines: &[&str]) -> Self {
        self.progress = lines.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<LocalRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LocalChannel for MockLocalChannel {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn execute(
        &self,
        request: LocalRequest,
        progress: Option<ProgressSender>,
    ) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request);
        }
        if let Some(tx) = progress {
            for line in &self.progress {
                let _ = tx.send(line.clone());
            }
        }
        self.outcome.local_result()
    }
}

// =============================================================================
// REMOTE CHANNEL
// =============================================================================

/// Stub backend AI channel.
#[derive(Clone)]
pub struct MockRemoteChannel {
    outcome: MockOutcome,
    calls: Arc<Mutex<Vec<AiRequest>>>,
}

impl MockRemoteChannel {
    pub fn responding(text: impl Into<String>) -> Self {
        Self::with_outcome(MockOutcome::Respond(text.into()))
    }

    pub fn failing(msg: impl Into<String>) -> Self {
        Self::with_outcome(MockOutcome::Fail(msg.into()))
    }

    pub fn with_outcome(outcome: MockOutcome) -> Self {
        Self {
            outcome,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<AiRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RemoteChannel for MockRemoteChannel {
    async fn execute(&self, request: AiRequest) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request);
        }
        self.outcome.remote_result()
    }
}

// =============================================================================
// TRANSPORT
// =============================================================================

/// A recorded transport call.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportCall {
    pub method: &'static str,
    pub path: String,
    pub payload: Option<Value>,
}

/// Stub [`BackendTransport`] answering canned JSON per path (`{}` otherwise).
#[derive(Clone, Default)]
pub struct MockTransport {
    responses: Arc<HashMap<String, Value>>,
    calls: Arc<Mutex<Vec<TransportCall>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, path: impl Into<String>, body: Value) -> Self {
        Arc::make_mut(&mut self.responses).insert(path.into(), body);
        self
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, method: &'static str, path: &str, payload: Option<Value>) -> Value {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(TransportCall {
                method,
                path: path.to_string(),
                payload,
            });
        }
        self.responses.get(path).cloned().unwrap_or_else(|| json!({}))
    }
}

#[async_trait]
impl BackendTransport for MockTransport {
    async fn post_json(&self, path: &str, payload: Value) -> Result<Value> {
        Ok(self.record("POST", path, Some(payload)))
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        Ok(self.record("GET", path, None))
    }
}
