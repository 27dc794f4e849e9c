//! Background coordinator: one task that owns the gateway and auth client and
//! serves persistence, fetch and auth requests from any number of handles.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use pagegenie_core::defaults;
use pagegenie_core::{BackendTransport, Credential, Error, Result};

use crate::credentials::AuthClient;
use crate::gateway::Gateway;

/// Work the coordinator accepts.
#[derive(Debug)]
pub enum CoordinatorRequest {
    Persist {
        endpoint: String,
        payload: Value,
        reply: oneshot::Sender<Result<Value>>,
    },
    Fetch {
        endpoint: String,
        reply: oneshot::Sender<Result<Value>>,
    },
    Login {
        username: String,
        password: String,
        reply: oneshot::Sender<Result<Credential>>,
    },
    Signup {
        full_name: String,
        username: String,
        password: String,
        reply: oneshot::Sender<Result<Credential>>,
    },
    Logout {
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown,
}

impl CoordinatorRequest {
    fn kind(&self) -> &'static str {
        match self {
            Self::Persist { .. } => "persist",
            Self::Fetch { .. } => "fetch",
            Self::Login { .. } => "login",
            Self::Signup { .. } => "signup",
            Self::Logout { .. } => "logout",
            Self::Shutdown => "shutdown",
        }
    }
}

/// The coordinator actor.
pub struct Coordinator {
    gateway: Gateway,
    auth: AuthClient,
}

impl Coordinator {
    pub fn new(gateway: Gateway) -> Self {
        let auth = AuthClient::new(gateway.clone());
        Self { gateway, auth }
    }

    /// Spawn the actor. It stops on [`CoordinatorHandle::shutdown`] or when
    /// every handle is dropped.
    pub fn start(self) -> (CoordinatorHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(defaults::COORDINATOR_CAPACITY);
        let coordinator = Arc::new(self);
        let task = tokio::spawn(coordinator.run(rx));
        (CoordinatorHandle { tx }, task)
    }

    async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<CoordinatorRequest>) {
        info!(subsystem = "coordinator", "Coordinator started");
        while let Some(request) = rx.recv().await {
            debug!(subsystem = "coordinator", kind = request.kind(), "Request received");
            if matches!(request, CoordinatorRequest::Shutdown) {
                info!(subsystem = "coordinator", "Coordinator received shutdown signal");
                break;
            }
            let coordinator = Arc::clone(&self);
            tokio::spawn(async move { coordinator.handle(request).await });
        }
        info!(subsystem = "coordinator", "Coordinator stopped");
    }

    async fn handle(&self, request: CoordinatorRequest) {
        let delivered = match request {
            CoordinatorRequest::Persist {
                endpoint,
                payload,
                reply,
            } => reply.send(self.gateway.call(&endpoint, &payload).await).is_ok(),
            CoordinatorRequest::Fetch { endpoint, reply } => {
                reply.send(self.gateway.get(&endpoint).await).is_ok()
            }
            CoordinatorRequest::Login {
                username,
                password,
                reply,
            } => reply
                .send(self.auth.login(&username, &password).await)
                .is_ok(),
            CoordinatorRequest::Signup {
                full_name,
                username,
                password,
                reply,
            } => reply
                .send(self.auth.signup(&full_name, &username, &password).await)
                .is_ok(),
            CoordinatorRequest::Logout { reply } => reply.send(self.auth.logout().await).is_ok(),
            CoordinatorRequest::Shutdown => true,
        };
        if !delivered {
            warn!(subsystem = "coordinator", "Caller went away before the reply");
        }
    }
}

/// Cloneable sender side of the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<CoordinatorRequest>,
}

impl CoordinatorHandle {
    /// The coordinator task is still accepting requests.
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    pub async fn persist(&self, endpoint: &str, payload: Value) -> Result<Value> {
        self.request(|reply| CoordinatorRequest::Persist {
            endpoint: endpoint.to_string(),
            payload,
            reply,
        })
        .await
    }

    pub async fn fetch(&self, endpoint: &str) -> Result<Value> {
        self.request(|reply| CoordinatorRequest::Fetch {
            endpoint: endpoint.to_string(),
            reply,
        })
        .await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Credential> {
        self.request(|reply| CoordinatorRequest::Login {
            username: username.to_string(),
            password: password.to_string(),
            reply,
        })
        .await
    }

    pub async fn signup(&self, full_name: &str, username: &str, password: &str) -> Result<Credential> {
        self.request(|reply| CoordinatorRequest::Signup {
            full_name: full_name.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            reply,
        })
        .await
    }

    pub async fn logout(&self) -> Result<()> {
        self.request(|reply| CoordinatorRequest::Logout { reply }).await
    }

    /// Ask the coordinator to stop after the requests already queued.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(CoordinatorRequest::Shutdown).await;
    }

    async fn request<T, F>(&self, build: F) -> Result<T>
    where
        F: FnOnce(oneshot::Sender<Result<T>>) -> CoordinatorRequest,
    {
        if !self.is_alive() {
            return Err(Error::ExtensionContextInvalidated);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| Error::ExtensionContextInvalidated)?;
        reply_rx
            .await
            .map_err(|_| Error::ExtensionContextInvalidated)?
    }
}

#[async_trait]
impl BackendTransport for CoordinatorHandle {
    async fn post_json(&self, path: &str, payload: Value) -> Result<Value> {
        self.persist(path, payload).await
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        self.fetch(path).await
    }
}
