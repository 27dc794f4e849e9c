//! Pending-request map keyed by correlation id.
//!
//! Every registration returns a [`PendingGuard`]; dropping the guard removes
//! the entry, so success, failure, timeout and cancellation all release it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use pagegenie_core::ProgressSender;

/// Final answer to one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub ok: bool,
    pub result: Option<String>,
    pub error: Option<String>,
}

struct Entry {
    reply: oneshot::Sender<Reply>,
    progress: Option<ProgressSender>,
}

/// Requests waiting for a correlated response.
#[derive(Default)]
pub struct PendingRequests {
    entries: Mutex<HashMap<String, Entry>>,
}

impl PendingRequests {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `id`. The receiver resolves on [`resolve`](Self::resolve) and
    /// errors when the entry is dropped without a reply.
    pub fn register(
        self: &Arc<Self>,
        id: &str,
        progress: Option<ProgressSender>,
    ) -> (PendingGuard, oneshot::Receiver<Reply>) {
        let (tx, rx) = oneshot::channel();
        self.lock().insert(
            id.to_string(),
            Entry {
                reply: tx,
                progress,
            },
        );
        (
            PendingGuard {
                pending: Arc::clone(self),
                id: id.to_string(),
            },
            rx,
        )
    }

    /// Deliver the reply for `id`. Returns false when nobody is waiting.
    pub fn resolve(&self, id: &str, reply: Reply) -> bool {
        match self.lock().remove(id) {
            Some(entry) => entry.reply.send(reply).is_ok(),
            None => false,
        }
    }

    /// Forward a progress line for `id`. Returns false when nobody is waiting.
    pub fn progress(&self, id: &str, message: String) -> bool {
        let entries = self.lock();
        match entries.get(id) {
            Some(Entry {
                progress: Some(tx), ..
            }) => tx.send(message).is_ok(),
            Some(_) => true,
            None => false,
        }
    }

    /// Drop every entry; their receivers see a closed channel.
    pub fn close_all(&self) -> usize {
        let mut entries = self.lock();
        let n = entries.len();
        entries.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, id: &str) {
        self.lock().remove(id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Removes its entry from the map on drop.
pub struct PendingGuard {
    pending: Arc<PendingRequests>,
    id: String,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}
