//! Execution-path router: on-device first, backend as fallback.
//!
//! | Mode | Local | Remote |
//! |------|-------|--------|
//! | `auto` | tried first | on local failure |
//! | `offline-only` | only path | never |
//! | `online-only` | never | only path |

use std::sync::Arc;

use tracing::{debug, info, instrument, warn, Span};

use pagegenie_core::logging;
use pagegenie_core::{
    AiRequest, AiResult, Error, LocalChannel, LocalRequest, Mode, Operation, Persona,
    ProgressSender, RemoteChannel, Result, RouteDecision, Settings,
};

/// Progress line sent before trying the on-device channel.
pub const PROGRESS_LOCAL: &str = "Using on-device AI";
/// Progress line sent when the on-device channel failed and the backend is next.
pub const PROGRESS_FALLBACK: &str = "Falling back to cloud AI";
/// Progress line sent when the backend is the first choice.
pub const PROGRESS_REMOTE: &str = "Using cloud AI";

/// One routed operation.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub operation: Operation,
    pub text: String,
    pub target_lang: String,
    pub mode: Mode,
    pub persona: Option<Persona>,
    pub cite_sources: Option<bool>,
    /// Ask the backend for `{bullets, citations}`. Defaults to true for
    /// summarize and explain.
    pub structured: Option<bool>,
}

impl RouteRequest {
    pub fn new(operation: Operation, text: impl Into<String>) -> Self {
        Self {
            operation,
            text: text.into(),
            target_lang: pagegenie_core::defaults::TARGET_LANG.to_string(),
            mode: Mode::Auto,
            persona: None,
            cite_sources: None,
            structured: None,
        }
    }

    /// Take mode, language, persona and citation preference from settings.
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.mode = settings.mode;
        self.target_lang = settings.target_lang().to_string();
        self.persona = Some(settings.persona);
        self.cite_sources = Some(settings.cite_sources);
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_target_lang(mut self, target_lang: impl Into<String>) -> Self {
        self.target_lang = target_lang.into();
        self
    }

    fn local_request(&self) -> LocalRequest {
        LocalRequest {
            operation: self.operation,
            text: self.text.clone(),
            target_lang: self.target_lang.clone(),
            persona: self.persona,
        }
    }

    fn ai_request(&self, action: &str) -> AiRequest {
        AiRequest {
            text: self.text.clone(),
            action: action.to_string(),
            target_lang: self.target_lang.clone(),
            persona: self.persona,
            cite_sources: self.cite_sources,
            structured: Some(
                self.structured
                    .unwrap_or_else(|| self.operation.prefers_structured()),
            ),
        }
    }
}

/// Picks the execution path for each operation.
#[derive(Clone)]
pub struct Router {
    local: Arc<dyn LocalChannel>,
    remote: Arc<dyn RemoteChannel>,
}

impl Router {
    pub fn new(local: Arc<dyn LocalChannel>, remote: Arc<dyn RemoteChannel>) -> Self {
        Self { local, remote }
    }

    /// Route `text` through `operation` under `mode`.
    pub async fn run(
        &self,
        operation: Operation,
        text: &str,
        target_lang: &str,
        mode: Mode,
    ) -> Result<AiResult> {
        let request = RouteRequest::new(operation, text)
            .with_target_lang(target_lang)
            .with_mode(mode);
        self.route(request, None).await
    }

    #[instrument(
        skip(self, request, progress),
        fields(
            subsystem = "router",
            op = %request.operation,
            mode = %request.mode,
            route = tracing::field::Empty,
        )
    )]
    pub async fn route(
        &self,
        request: RouteRequest,
        progress: Option<ProgressSender>,
    ) -> Result<AiResult> {
        let notify = |line: &str| {
            if let Some(tx) = &progress {
                let _ = tx.send(line.to_string());
            }
        };

        if request.mode.allows_local() {
            notify(PROGRESS_LOCAL);
            match self.try_local(&request, progress.clone()).await {
                Ok(text) => {
                    Span::current().record(logging::ROUTE, "local");
                    info!(response_len = text.len(), "Served on-device");
                    return Ok(AiResult {
                        text,
                        route: RouteDecision::Local,
                    });
                }
                Err(e) if !request.mode.allows_remote() => {
                    warn!(error = %e, "On-device failed in offline-only mode");
                    return Err(Error::OnDeviceUnavailable);
                }
                Err(e) => {
                    warn!(error = %e, "On-device failed, falling back to backend");
                    notify(PROGRESS_FALLBACK);
                }
            }
        } else {
            notify(PROGRESS_REMOTE);
        }

        let action = request
            .operation
            .backend_action()
            .ok_or_else(|| Error::UnsupportedOperation(request.operation.to_string()))?;
        let text = self.remote.execute(request.ai_request(action)).await?;
        Span::current().record(logging::ROUTE, "remote");
        info!(response_len = text.len(), "Served by backend");
        Ok(AiResult {
            text,
            route: RouteDecision::Remote,
        })
    }

    async fn try_local(
        &self,
        request: &RouteRequest,
        progress: Option<ProgressSender>,
    ) -> Result<String> {
        if !self.local.is_available().await {
            return Err(Error::LocalUnavailable(
                "On-device AI not available".to_string(),
            ));
        }
        let text = self.local.execute(request.local_request(), progress).await?;
        if text.trim().is_empty() {
            debug!("On-device returned an empty result");
            return Err(Error::LocalUnavailable(
                "On-device AI returned nothing".to_string(),
            ));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockLocalChannel, MockOutcome, MockRemoteChannel};
    use tokio::sync::mpsc;

    fn router(local: &MockLocalChannel, remote: &MockRemoteChannel) -> Router {
        Router::new(Arc::new(local.clone()), Arc::new(remote.clone()))
    }

    #[tokio::test]
    async fn test_local_success_skips_remote() {
        let local = MockLocalChannel::responding("short version");
        let remote = MockRemoteChannel::responding("cloud");
        let result = router(&local, &remote)
            .run(Operation::Summarize, "long text", "en", Mode::Auto)
            .await
            .unwrap();

        assert_eq!(result.text, "short version");
        assert_eq!(result.route, RouteDecision::Local);
        assert_eq!(local.call_count(), 1);
        assert_eq!(remote.call_count(), 0);
    }

    #[tokio::test]
    async fn test_local_failure_falls_back_in_auto() {
        let local = MockLocalChannel::failing("model not ready");
        let remote = MockRemoteChannel::responding("cloud");
        let result = router(&local, &remote)
            .run(Operation::Translate, "hola", "fr", Mode::Auto)
            .await
            .unwrap();

        assert_eq!(result.route, RouteDecision::Remote);
        assert_eq!(result.text, "cloud");
        let sent = remote.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].action, "translate");
        assert_eq!(sent[0].target_lang, "fr");
        assert_eq!(sent[0].structured, Some(false));
    }

    #[tokio::test]
    async fn test_offline_only_never_calls_remote() {
        let local = MockLocalChannel::failing("boom");
        let remote = MockRemoteChannel::responding("cloud");
        let err = router(&local, &remote)
            .run(Operation::Rewrite, "x", "en", Mode::OfflineOnly)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::OnDeviceUnavailable));
        assert_eq!(remote.call_count(), 0);
    }

    #[tokio::test]
    async fn test_online_only_never_calls_local() {
        let local = MockLocalChannel::responding("local");
        let remote = MockRemoteChannel::responding("cloud");
        let result = router(&local, &remote)
            .run(Operation::Explain, "x", "en", Mode::OnlineOnly)
            .await
            .unwrap();

        assert_eq!(result.route, RouteDecision::Remote);
        assert_eq!(local.call_count(), 0);
        assert_eq!(remote.requests()[0].structured, Some(true));
    }

    #[tokio::test]
    async fn test_unavailable_local_is_not_executed() {
        let local = MockLocalChannel::responding("local").unavailable();
        let remote = MockRemoteChannel::responding("cloud");
        let result = router(&local, &remote)
            .run(Operation::Proofread, "teh", "en", Mode::Auto)
            .await
            .unwrap();

        assert_eq!(result.route, RouteDecision::Remote);
        assert_eq!(local.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_local_result_counts_as_failure() {
        let local = MockLocalChannel::responding("   ");
        let remote = MockRemoteChannel::responding("cloud");
        let result = router(&local, &remote)
            .run(Operation::Rewrite, "x", "en", Mode::Auto)
            .await
            .unwrap();
        assert_eq!(result.route, RouteDecision::Remote);
    }

    #[tokio::test]
    async fn test_unsupported_operation_fails_before_remote() {
        let local = MockLocalChannel::failing("no");
        let remote = MockRemoteChannel::responding("cloud");
        let err = router(&local, &remote)
            .run(Operation::QuizGenerate, "x", "en", Mode::Auto)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnsupportedOperation(op) if op == "quiz_generate"));
        assert_eq!(remote.call_count(), 0);
    }

    #[tokio::test]
    async fn test_remote_error_is_surfaced() {
        let local = MockLocalChannel::failing("no");
        let remote = MockRemoteChannel::with_outcome(MockOutcome::Unauthorized);
        let err = router(&local, &remote)
            .run(Operation::Summarize, "x", "en", Mode::Auto)
            .await
            .unwrap_err();
        assert!(err.requires_login());
    }

    #[tokio::test]
    async fn test_progress_lines_follow_the_path_taken() {
        let local = MockLocalChannel::failing("no").with_progress(&["On-device • Using Rewriter"]);
        let remote = MockRemoteChannel::responding("cloud");
        let (tx, mut rx) = mpsc::unbounded_channel();

        router(&local, &remote)
            .route(RouteRequest::new(Operation::Rewrite, "x"), Some(tx))
            .await
            .unwrap();

        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        assert_eq!(
            lines,
            vec![
                PROGRESS_LOCAL.to_string(),
                "On-device • Using Rewriter".to_string(),
                PROGRESS_FALLBACK.to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_settings_carry_persona_and_citations() {
        let settings = Settings {
            mode: Mode::OnlineOnly,
            persona: Persona::Researcher,
            cite_sources: true,
            target_lang: "de".to_string(),
            ..Settings::default()
        };
        let local = MockLocalChannel::responding("local");
        let remote = MockRemoteChannel::responding("cloud");

        router(&local, &remote)
            .route(
                RouteRequest::new(Operation::Summarize, "x").with_settings(&settings),
                None,
            )
            .await
            .unwrap();

        let sent = &remote.requests()[0];
        assert_eq!(sent.persona, Some(Persona::Researcher));
        assert_eq!(sent.cite_sources, Some(true));
        assert_eq!(sent.target_lang, "de");
    }
}
