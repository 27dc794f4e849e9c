//! Messages exchanged between the content side and the page side.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use pagegenie_core::{LocalRequest, Operation, Persona};

/// One bridge message. Serialized with a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeMessage {
    #[serde(rename = "AI_REQUEST", rename_all = "camelCase")]
    Request {
        id: String,
        operation: Operation,
        text: String,
        target_lang: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        persona: Option<Persona>,
    },

    #[serde(rename = "AI_RESPONSE")]
    Response {
        id: String,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "AI_PROGRESS")]
    Progress { id: String, message: String },

    #[serde(rename = "AI_PING")]
    Ping,

    #[serde(rename = "AI_READY")]
    Ready { ready: bool },
}

impl BridgeMessage {
    pub fn request(id: &str, request: &LocalRequest) -> Self {
        Self::Request {
            id: id.to_string(),
            operation: request.operation,
            text: request.text.clone(),
            target_lang: request.target_lang.clone(),
            persona: request.persona,
        }
    }

    pub fn success(id: &str, result: String) -> Self {
        Self::Response {
            id: id.to_string(),
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: &str, error: String) -> Self {
        Self::Response {
            id: id.to_string(),
            ok: false,
            result: None,
            error: Some(error),
        }
    }

    /// Wire `type` of the message, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Request { .. } => "AI_REQUEST",
            Self::Response { .. } => "AI_RESPONSE",
            Self::Progress { .. } => "AI_PROGRESS",
            Self::Ping => "AI_PING",
            Self::Ready { .. } => "AI_READY",
        }
    }
}

/// One side of the bridge pipe.
#[derive(Debug)]
pub struct BridgeEnd {
    pub tx: mpsc::Sender<BridgeMessage>,
    pub rx: mpsc::Receiver<BridgeMessage>,
}

/// Create the two ends of a bridge: `(content side, page side)`.
pub fn link(capacity: usize) -> (BridgeEnd, BridgeEnd) {
    let (to_page, from_content) = mpsc::channel(capacity);
    let (to_content, from_page) = mpsc::channel(capacity);
    (
        BridgeEnd {
            tx: to_page,
            rx: from_page,
        },
        BridgeEnd {
            tx: to_content,
            rx: from_content,
        },
    )
}
