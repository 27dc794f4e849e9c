//! Core traits for pagegenie's execution channels.
//!
//! The router only sees [`LocalChannel`] and [`RemoteChannel`], so either side
//! can be replaced by a stub in tests.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::models::*;

/// Sink for human-readable progress lines shown while a request runs.
pub type ProgressSender = mpsc::UnboundedSender<String>;

// =============================================================================
// EXECUTION CHANNELS
// =============================================================================

/// Request for the on-device channel.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalRequest {
    pub operation: Operation,
    pub text: String,
    pub target_lang: String,
    pub persona: Option<Persona>,
}

/// On-device execution path.
#[async_trait]
pub trait LocalChannel: Send + Sync {
    /// Whether an on-device capability exists at all.
    async fn is_available(&self) -> bool;

    /// Run one operation on-device and return the raw result text.
    ///
    /// Fails with `LocalUnavailable` or `ExtensionContextInvalidated`.
    async fn execute(
        &self,
        request: LocalRequest,
        progress: Option<ProgressSender>,
    ) -> Result<String>;
}

/// Backend AI execution path.
#[async_trait]
pub trait RemoteChannel: Send + Sync {
    /// Run one `/api/v1/ai` request and return the extracted result string.
    async fn execute(&self, request: AiRequest) -> Result<String>;
}

// =============================================================================
// BACKEND TRANSPORT
// =============================================================================

/// Authenticated JSON transport to the backend.
#[async_trait]
pub trait BackendTransport: Send + Sync {
    async fn post_json(&self, path: &str, payload: JsonValue) -> Result<JsonValue>;

    async fn get_json(&self, path: &str) -> Result<JsonValue>;
}

// =============================================================================
// ON-DEVICE MODELS
// =============================================================================

/// A task-specific on-device model (summarizer, translator, proofreader...).
#[async_trait]
pub trait OnDeviceCapability: Send + Sync {
    /// Display name, used in progress messages.
    fn name(&self) -> &str;

    fn supports(&self, operation: Operation) -> bool;

    async fn is_ready(&self) -> bool;

    async fn invoke(&self, request: &LocalRequest) -> Result<String>;
}

/// A general-purpose on-device language model driven by prompt text.
#[async_trait]
pub trait PromptModel: Send + Sync {
    /// Display name, used in progress messages.
    fn name(&self) -> &str {
        "Prompt API"
    }

    async fn is_ready(&self) -> bool;

    async fn prompt(&self, prompt: &str) -> Result<String>;
}
