//! On-device prompt model backed by a local Ollama server.
//!
//! ## Configuration
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PAGEGENIE_OLLAMA_URL` | `http://127.0.0.1:11434` | Ollama base URL |
//! | `PAGEGENIE_OLLAMA_MODEL` | `llama3.2:3b` | Model used for prompts |

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use pagegenie_core::defaults;
use pagegenie_core::{Error, PromptModel, Result};

/// Readiness probes give up after this long.
const TAGS_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

/// [`PromptModel`] that calls Ollama's `/api/generate`.
#[derive(Debug, Clone)]
pub struct OllamaPromptModel {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl Default for OllamaPromptModel {
    fn default() -> Self {
        Self::new(defaults::OLLAMA_URL, defaults::OLLAMA_MODEL)
    }
}

impl OllamaPromptModel {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: defaults::PROMPT_TEMPERATURE,
        }
    }

    pub fn from_env() -> Self {
        let base_url =
            std::env::var("PAGEGENIE_OLLAMA_URL").unwrap_or_else(|_| defaults::OLLAMA_URL.into());
        let model = std::env::var("PAGEGENIE_OLLAMA_MODEL")
            .unwrap_or_else(|_| defaults::OLLAMA_MODEL.into());
        Self::new(base_url, model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn serves(&self, name: &str) -> bool {
        name == self.model || (!self.model.contains(':') && name == format!("{}:latest", self.model))
    }
}

#[async_trait]
impl PromptModel for OllamaPromptModel {
    fn name(&self) -> &str {
        "Prompt API"
    }

    /// Ready when the server answers and has the model pulled.
    async fn is_ready(&self) -> bool {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(TAGS_TIMEOUT_SECS))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.json::<TagsResponse>().await {
                Ok(tags) => {
                    let ready = tags.models.iter().any(|m| self.serves(&m.name));
                    debug!(model = %self.model, ready, "Ollama tags checked");
                    ready
                }
                Err(e) => {
                    warn!(error = %e, "Unreadable Ollama tags response");
                    false
                }
            },
            Ok(resp) => {
                debug!(status = resp.status().as_u16(), "Ollama not ready");
                false
            }
            Err(e) => {
                debug!(error = %e, "Ollama unreachable");
                false
            }
        }
    }

    #[instrument(skip(self, prompt), fields(subsystem = "bridge", component = "ollama", model = %self.model))]
    async fn prompt(&self, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::LocalUnavailable(format!("Ollama request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::LocalUnavailable(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::LocalUnavailable(format!("Failed to parse response: {}", e)))?;

        debug!(
            response_len = result.response.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Prompt complete"
        );
        Ok(result.response)
    }
}
