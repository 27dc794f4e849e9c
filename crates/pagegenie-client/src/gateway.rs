//! Remote request gateway: authenticated JSON calls to the configured backend.
//!
//! Every call resolves the endpoint against the current `backendUrl`, attaches
//! the bearer token when a valid credential exists, clears the credential on
//! 401 and tolerates non-JSON success bodies.
//!
//! ## Configuration
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PAGEGENIE_REQUEST_TIMEOUT_SECS` | unset | Whole-request timeout; unset leaves the transport default |

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, error, instrument, warn};

use pagegenie_core::defaults;
use pagegenie_core::{BackendTransport, Error, Result, SettingsStore};

use crate::credentials::CredentialStore;

/// Gateway transport settings.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    /// Whole-request timeout. `None` relies on the transport default.
    pub request_timeout: Option<Duration>,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let request_timeout = std::env::var("PAGEGENIE_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        Self { request_timeout }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

/// Authenticated backend client.
#[derive(Debug, Clone)]
pub struct Gateway {
    client: Client,
    credentials: CredentialStore,
}

impl Gateway {
    pub fn new(settings: Arc<SettingsStore>) -> Result<Self> {
        Self::with_config(settings, GatewayConfig::default())
    }

    pub fn with_config(settings: Arc<SettingsStore>, config: GatewayConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            credentials: CredentialStore::new(settings),
        })
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    /// Absolute URL for `path`. Absolute `http(s)` paths are used as-is.
    pub fn endpoint(&self, path: &str) -> Result<String> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(path.to_string());
        }
        let settings = self.credentials.settings().get();
        let base = settings.backend_url().ok_or(Error::BackendNotConfigured)?;
        if path.starts_with('/') {
            Ok(format!("{}{}", base, path))
        } else {
            Ok(format!("{}/{}", base, path))
        }
    }

    /// POST `payload` as JSON.
    #[instrument(skip(self, payload), fields(subsystem = "gateway", op = "call"))]
    pub async fn call(&self, path: &str, payload: &Value) -> Result<Value> {
        self.send(Method::POST, path, Some(payload)).await
    }

    /// GET a JSON resource.
    #[instrument(skip(self), fields(subsystem = "gateway", op = "get"))]
    pub async fn get(&self, path: &str) -> Result<Value> {
        self.send(Method::GET, path, None).await
    }

    /// Probe `/api/health`. The token is attached when valid, and a rejection
    /// does not clear it.
    #[instrument(skip(self), fields(subsystem = "gateway", op = "health"))]
    pub async fn health(&self) -> Result<()> {
        let url = self.endpoint(defaults::HEALTH_PATH)?;
        let mut request = self.client.get(&url);
        if let Some(credential) = self.credentials.current().filter(|c| !c.is_expired()) {
            request = request.bearer_auth(&credential.token);
        }
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), "Backend healthy");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::BackendError {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn send(&self, method: Method, path: &str, payload: Option<&Value>) -> Result<Value> {
        let url = self.endpoint(path)?;
        let credential = self.credentials.current_valid();

        let mut request = self.client.request(method, &url);
        if let Some(credential) = &credential {
            request = request.bearer_auth(&credential.token);
        }
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let start = Instant::now();
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!(
                endpoint = path,
                has_token = credential.is_some(),
                "Backend rejected credential, clearing"
            );
            if let Err(e) = self.credentials.clear() {
                error!(error = %e, "Failed to persist cleared credential");
            }
            return Err(Error::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(endpoint = path, status = status.as_u16(), "Backend error");
            return Err(Error::BackendError {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await.unwrap_or_default();
        let data = serde_json::from_str(&text).unwrap_or_else(|_| json!({}));
        debug!(
            endpoint = path,
            status = status.as_u16(),
            has_token = credential.is_some(),
            duration_ms = start.elapsed().as_millis() as u64,
            response_len = text.len(),
            "Backend call complete"
        );
        Ok(data)
    }
}

#[async_trait]
impl BackendTransport for Gateway {
    async fn post_json(&self, path: &str, payload: Value) -> Result<Value> {
        self.call(path, &payload).await
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        self.get(path).await
    }
}
