//! Page-side end of the bridge: runs requests on the on-device models.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, instrument, trace, warn};

use pagegenie_core::defaults;
use pagegenie_core::{Error, LocalRequest, OnDeviceCapability, PromptModel, Result};

use super::protocol::{BridgeEnd, BridgeMessage};
use crate::prompts;

/// Answers pings and requests arriving from the content side.
#[derive(Clone)]
pub struct BridgeHost {
    capabilities: Vec<Arc<dyn OnDeviceCapability>>,
    prompt_model: Option<Arc<dyn PromptModel>>,
    capability_timeout: Duration,
    prompt_timeout: Duration,
}

impl Default for BridgeHost {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeHost {
    pub fn new() -> Self {
        Self {
            capabilities: Vec::new(),
            prompt_model: None,
            capability_timeout: Duration::from_secs(defaults::CAPABILITY_TIMEOUT_SECS),
            prompt_timeout: Duration::from_secs(defaults::PROMPT_TIMEOUT_SECS),
        }
    }

    /// Add a task-specific capability. Capabilities are tried in insertion
    /// order before the prompt model.
    pub fn with_capability(mut self, capability: Arc<dyn OnDeviceCapability>) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn with_prompt_model(mut self, model: Arc<dyn PromptModel>) -> Self {
        self.prompt_model = Some(model);
        self
    }

    pub fn with_timeouts(mut self, capability: Duration, prompt: Duration) -> Self {
        self.capability_timeout = capability;
        self.prompt_timeout = prompt;
        self
    }

    /// Whether any on-device model can serve requests.
    pub async fn is_ready(&self) -> bool {
        for capability in &self.capabilities {
            if capability.is_ready().await {
                return true;
            }
        }
        match &self.prompt_model {
            Some(model) => model.is_ready().await,
            None => false,
        }
    }

    /// Serve the page end until the content side detaches.
    pub fn spawn(self, end: BridgeEnd) -> JoinHandle<()> {
        let host = Arc::new(self);
        tokio::spawn(async move {
            let BridgeEnd { tx, mut rx } = end;
            info!(subsystem = "bridge", component = "host", "Bridge host started");
            while let Some(msg) = rx.recv().await {
                trace!(subsystem = "bridge", component = "host", kind = msg.kind(), "Inbound");
                match msg {
                    BridgeMessage::Ping => {
                        let ready = host.is_ready().await;
                        let _ = tx.send(BridgeMessage::Ready { ready }).await;
                    }
                    BridgeMessage::Request {
                        id,
                        operation,
                        text,
                        target_lang,
                        persona,
                    } => {
                        let host = Arc::clone(&host);
                        let tx = tx.clone();
                        let request = LocalRequest {
                            operation,
                            text,
                            target_lang,
                            persona,
                        };
                        tokio::spawn(async move {
                            let reply = host.respond(&id, &request, &tx).await;
                            let _ = tx.send(reply).await;
                        });
                    }
                    BridgeMessage::Response { .. }
                    | BridgeMessage::Progress { .. }
                    | BridgeMessage::Ready { .. } => {}
                }
            }
            info!(subsystem = "bridge", component = "host", "Bridge host stopped");
        })
    }

    /// Run one request and build its `AI_RESPONSE`. Progress lines go out on
    /// `tx` tagged with `id`.
    pub async fn respond(
        &self,
        id: &str,
        request: &LocalRequest,
        tx: &mpsc::Sender<BridgeMessage>,
    ) -> BridgeMessage {
        let progress = |message: String| {
            let _ = tx.try_send(BridgeMessage::Progress {
                id: id.to_string(),
                message,
            });
        };
        match self.run(request, progress).await {
            Ok(result) => BridgeMessage::success(id, result),
            Err(e) => BridgeMessage::failure(id, failure_message(&e)),
        }
    }

    #[instrument(skip(self, request, progress), fields(subsystem = "bridge", component = "host", op = %request.operation))]
    async fn run<P>(&self, request: &LocalRequest, progress: P) -> Result<String>
    where
        P: Fn(String) + Send + Sync,
    {
        if request.text.trim().is_empty() {
            return Err(Error::InvalidInput("No input text".to_string()));
        }

        for capability in &self.capabilities {
            if !capability.supports(request.operation) || !capability.is_ready().await {
                continue;
            }
            progress(format!("Using {}", capability.name()));
            match timeout(self.capability_timeout, capability.invoke(request)).await {
                Ok(Ok(output)) if !output.trim().is_empty() => return Ok(output),
                Ok(Ok(_)) => debug!(capability = capability.name(), "Empty capability output"),
                Ok(Err(e)) => debug!(capability = capability.name(), error = %e, "Capability failed"),
                Err(_) => warn!(capability = capability.name(), "Capability timed out"),
            }
        }

        let model = self
            .prompt_model
            .as_ref()
            .ok_or_else(|| Error::LocalUnavailable("No on-device model available".to_string()))?;
        if !model.is_ready().await {
            return Err(Error::LocalUnavailable(format!(
                "{} not ready",
                model.name()
            )));
        }

        progress(format!("Using {} ({})", model.name(), request.operation));
        let prompt = prompts::build_prompt_for(
            request.operation,
            &request.text,
            &request.target_lang,
            request.persona,
        );
        match timeout(self.prompt_timeout, model.prompt(&prompt)).await {
            Ok(result) => result,
            Err(_) => Err(Error::LocalUnavailable(format!(
                "{} timed out",
                model.name()
            ))),
        }
    }
}

/// Error text carried in `AI_RESPONSE.error`.
fn failure_message(error: &Error) -> String {
    match error {
        Error::InvalidInput(msg) | Error::LocalUnavailable(msg) => msg.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::protocol::link;
    use async_trait::async_trait;
    use pagegenie_core::Operation;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubCapability {
        name: &'static str,
        op: Operation,
        output: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl OnDeviceCapability for StubCapability {
        fn name(&self) -> &str {
            self.name
        }
        fn supports(&self, operation: Operation) -> bool {
            operation == self.op
        }
        async fn is_ready(&self) -> bool {
            true
        }
        async fn invoke(&self, request: &LocalRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.output {
                Some(out) => Ok(format!("{}:{}", out, request.text)),
                None => Err(Error::LocalUnavailable("broken".to_string())),
            }
        }
    }

    struct EchoPrompt;

    #[async_trait]
    impl PromptModel for EchoPrompt {
        async fn is_ready(&self) -> bool {
            true
        }
        async fn prompt(&self, prompt: &str) -> Result<String> {
            Ok(prompt.to_string())
        }
    }

    fn request(op: Operation, text: &str) -> LocalRequest {
        LocalRequest {
            operation: op,
            text: text.to_string(),
            target_lang: "de".to_string(),
            persona: None,
        }
    }

    #[tokio::test]
    async fn test_capability_preferred_over_prompt_model() {
        let host = BridgeHost::new()
            .with_capability(Arc::new(StubCapability {
                name: "Summarizer",
                op: Operation::Summarize,
                output: Some("sum"),
                calls: AtomicUsize::new(0),
            }))
            .with_prompt_model(Arc::new(EchoPrompt));
        let (tx, mut rx) = mpsc::channel(8);

        let reply = host.respond("r1", &request(Operation::Summarize, "abc"), &tx).await;
        assert_eq!(reply, BridgeMessage::success("r1", "sum:abc".to_string()));
        assert_eq!(
            rx.recv().await.unwrap(),
            BridgeMessage::Progress {
                id: "r1".to_string(),
                message: "Using Summarizer".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_failed_capability_falls_back_to_prompt() {
        let host = BridgeHost::new()
            .with_capability(Arc::new(StubCapability {
                name: "Translator",
                op: Operation::Translate,
                output: None,
                calls: AtomicUsize::new(0),
            }))
            .with_prompt_model(Arc::new(EchoPrompt));
        let (tx, _rx) = mpsc::channel(8);

        match host.respond("r2", &request(Operation::Translate, "hola"), &tx).await {
            BridgeMessage::Response {
                ok: true,
                result: Some(prompt),
                ..
            } => assert!(prompt.starts_with("Translate the following text to de.")),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let host = BridgeHost::new().with_prompt_model(Arc::new(EchoPrompt));
        let (tx, _rx) = mpsc::channel(8);
        let reply = host.respond("r3", &request(Operation::Rewrite, "   "), &tx).await;
        assert_eq!(reply, BridgeMessage::failure("r3", "No input text".to_string()));
    }

    #[tokio::test]
    async fn test_no_models_reports_unavailable() {
        let host = BridgeHost::new();
        assert!(!host.is_ready().await);
        let (tx, _rx) = mpsc::channel(8);
        let reply = host.respond("r4", &request(Operation::Rewrite, "x"), &tx).await;
        assert_eq!(
            reply,
            BridgeMessage::failure("r4", "No on-device model available".to_string())
        );
    }

    #[tokio::test]
    async fn test_spawned_host_answers_ping_and_request() {
        let (mut content, page) = link(8);
        let handle = BridgeHost::new()
            .with_prompt_model(Arc::new(EchoPrompt))
            .spawn(page);

        content.tx.send(BridgeMessage::Ping).await.unwrap();
        assert_eq!(
            content.rx.recv().await.unwrap(),
            BridgeMessage::Ready { ready: true }
        );

        content
            .tx
            .send(BridgeMessage::request("q", &request(Operation::Proofread, "teh")))
            .await
            .unwrap();
        loop {
            match content.rx.recv().await.unwrap() {
                BridgeMessage::Progress { .. } => continue,
                BridgeMessage::Response { id, ok, result, .. } => {
                    assert_eq!(id, "q");
                    assert!(ok);
                    assert!(result.unwrap().contains("\n---\nteh\n---"));
                    break;
                }
                other => panic!("unexpected {:?}", other),
            }
        }

        drop(content);
        handle.await.unwrap();
    }
}
