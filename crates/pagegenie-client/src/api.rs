//! Typed backend endpoints over any [`BackendTransport`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use pagegenie_core::defaults;
use pagegenie_core::{
    AiRequest, BackendTransport, CompareConceptRequest, ConceptComparison, Error, NoteRequest,
    OpsLogEntry, Quiz, QuizFromTextRequest, QuizFromUrlRequest, QuizSubmission,
    ReadingSuggestRequest, RemoteChannel, Result, SavedNote,
};

use crate::normalize;

/// Quiz titles are cut to this many characters.
const QUIZ_TITLE_MAX_CHARS: usize = 120;

/// Backend API client.
#[derive(Clone)]
pub struct BackendApi {
    transport: Arc<dyn BackendTransport>,
}

impl BackendApi {
    pub fn new(transport: Arc<dyn BackendTransport>) -> Self {
        Self { transport }
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Value> {
        let payload = serde_json::to_value(body)?;
        self.transport.post_json(path, payload).await
    }

    /// `POST /api/v1/ai`, returning the extracted result string.
    #[instrument(skip(self, request), fields(subsystem = "api", op = %request.action, text_len = request.text.len()))]
    pub async fn ai(&self, request: &AiRequest) -> Result<String> {
        let data = self.post(defaults::AI_PATH, request).await?;
        normalize::extract_result(&data)
            .ok_or_else(|| Error::InvalidResponse("no result in AI response".to_string()))
    }

    #[instrument(skip(self, selection_text), fields(subsystem = "api", op = "compare_concept"))]
    pub async fn compare_concept(
        &self,
        selection_text: &str,
        page_url: &str,
    ) -> Result<ConceptComparison> {
        let body = CompareConceptRequest {
            selection_text: selection_text.to_string(),
            page_url: page_url.to_string(),
        };
        let data = self.post(defaults::COMPARE_CONCEPT_PATH, &body).await?;
        Ok(normalize::normalize_comparison(&data))
    }

    /// Generate a quiz for a page URL and return its id.
    #[instrument(skip(self), fields(subsystem = "api", op = "quiz_generate"))]
    pub async fn generate_quiz(&self, url: &str) -> Result<String> {
        let body = QuizFromUrlRequest {
            url: url.to_string(),
        };
        let data = self.post(defaults::QUIZ_GENERATE_PATH, &body).await?;
        quiz_id(&data)
    }

    /// Generate a quiz from selected text and return its id.
    #[instrument(skip(self, text), fields(subsystem = "api", op = "quiz_generate", text_len = text.len()))]
    pub async fn generate_quiz_from_text(
        &self,
        text: &str,
        source_url: &str,
        title: &str,
    ) -> Result<String> {
        let title: String = title.chars().take(QUIZ_TITLE_MAX_CHARS).collect();
        let body = QuizFromTextRequest {
            text: text.to_string(),
            source_url: source_url.to_string(),
            title: if title.trim().is_empty() {
                "Selection".to_string()
            } else {
                title
            },
        };
        let data = self.post(defaults::QUIZ_GENERATE_FROM_TEXT_PATH, &body).await?;
        quiz_id(&data)
    }

    pub async fn quiz(&self, id: &str) -> Result<Quiz> {
        let path = format!("/api/v1/quiz/{}", urlencoding::encode(id));
        let data = self.transport.get_json(&path).await?;
        serde_json::from_value(data).map_err(|e| Error::InvalidResponse(format!("quiz: {}", e)))
    }

    /// Submit answers (`-1` for unanswered) and return the backend's verdict.
    pub async fn submit_quiz(&self, id: &str, answers: Vec<i64>) -> Result<Value> {
        let path = format!("/api/v1/quiz/{}/submit", urlencoding::encode(id));
        self.post(&path, &QuizSubmission { answers }).await
    }

    pub async fn recent_quiz_attempts(&self) -> Result<Vec<Value>> {
        let data = self
            .transport
            .get_json(defaults::QUIZ_RECENT_ATTEMPTS_PATH)
            .await?;
        Ok(list_items(&data))
    }

    pub async fn suggest_reading(&self, base_url: &str, base_summary: &str) -> Result<Vec<Value>> {
        let body = ReadingSuggestRequest {
            base_url: base_url.to_string(),
            base_summary: base_summary.to_string(),
        };
        let data = self.post(defaults::READING_SUGGEST_PATH, &body).await?;
        Ok(normalize::normalize_suggestions(&data))
    }

    pub async fn recent_reading(&self) -> Result<Vec<Value>> {
        let data = self.transport.get_json(defaults::READING_RECENT_PATH).await?;
        Ok(normalize::normalize_suggestions(&data))
    }

    #[instrument(skip(self, content), fields(subsystem = "api", op = "save_note", text_len = content.len()))]
    pub async fn save_note(&self, source: &str, content: &str) -> Result<SavedNote> {
        let body = NoteRequest {
            source: source.to_string(),
            content: content.to_string(),
            ts: Utc::now().timestamp_millis(),
        };
        let raw = self.post(defaults::NOTES_PATH, &body).await?;
        let categories = normalize::extract_note_categories(&raw);
        Ok(SavedNote { raw, categories })
    }

    pub async fn notes(&self) -> Result<Vec<Value>> {
        let data = self.transport.get_json(defaults::NOTES_PATH).await?;
        Ok(list_items(&data))
    }

    /// Record a completed operation. Failures are logged and dropped.
    pub async fn log_operation(&self, entry: &OpsLogEntry) {
        match self.post(defaults::OPS_LOG_PATH, entry).await {
            Ok(_) => debug!(op = %entry.kind, "Operation logged"),
            Err(e) => warn!(op = %entry.kind, error = %e, "Failed to log operation"),
        }
    }

    /// `GET /api/health` through the transport. Use [`crate::Gateway::health`]
    /// to probe without the 401 side effect.
    pub async fn health(&self) -> Result<Value> {
        self.transport.get_json(defaults::HEALTH_PATH).await
    }
}

#[async_trait]
impl RemoteChannel for BackendApi {
    async fn execute(&self, request: AiRequest) -> Result<String> {
        self.ai(&request).await
    }
}

fn quiz_id(data: &Value) -> Result<String> {
    normalize::extract_quiz_id(data)
        .ok_or_else(|| Error::InvalidResponse("Quiz ID missing in response".to_string()))
}

/// Items of a list response: a bare array, or `data`/`items`/`content`.
fn list_items(data: &Value) -> Vec<Value> {
    if let Some(items) = data.as_array() {
        return items.clone();
    }
    ["data", "items", "content"]
        .iter()
        .find_map(|k| data.get(*k).and_then(Value::as_array))
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use serde_json::json;

    #[test]
    fn test_list_items_shapes() {
        assert_eq!(list_items(&json!([1, 2])).len(), 2);
        assert_eq!(list_items(&json!({"content": [1]})).len(), 1);
        assert_eq!(list_items(&json!({"items": [1, 2, 3]})).len(), 3);
        assert!(list_items(&json!({})).is_empty());
    }

    #[tokio::test]
    async fn test_ai_extracts_result_field() {
        let transport = MockTransport::new()
            .with_response(defaults::AI_PATH, json!({"data": {"output": "done"}}));
        let api = BackendApi::new(Arc::new(transport.clone()));
        let request = AiRequest {
            text: "t".to_string(),
            action: "rewrite".to_string(),
            target_lang: "en".to_string(),
            persona: None,
            cite_sources: None,
            structured: Some(false),
        };

        assert_eq!(api.execute(request).await.unwrap(), "done");
        let calls = transport.calls();
        assert_eq!(calls[0].method, "POST");
        assert_eq!(
            calls[0].payload,
            Some(json!({"text": "t", "action": "rewrite", "targetLang": "en", "structured": false}))
        );
    }

    #[tokio::test]
    async fn test_ai_without_result_is_invalid() {
        let api = BackendApi::new(Arc::new(MockTransport::new()));
        let request = AiRequest {
            text: "t".to_string(),
            action: "summarize".to_string(),
            target_lang: "en".to_string(),
            persona: None,
            cite_sources: None,
            structured: None,
        };
        assert!(matches!(
            api.ai(&request).await,
            Err(Error::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_quiz_from_text_defaults_and_truncates_title() {
        let transport = MockTransport::new()
            .with_response(defaults::QUIZ_GENERATE_FROM_TEXT_PATH, json!({"quizId": 42}));
        let api = BackendApi::new(Arc::new(transport.clone()));

        assert_eq!(api.generate_quiz_from_text("body", "", "  ").await.unwrap(), "42");
        let long_title = "x".repeat(300);
        api.generate_quiz_from_text("body", "https://p", &long_title)
            .await
            .unwrap();

        let calls = transport.calls();
        let first = calls[0].payload.as_ref().unwrap();
        assert_eq!(first["title"], "Selection");
        let second = calls[1].payload.as_ref().unwrap();
        assert_eq!(second["title"].as_str().unwrap().len(), 120);
        assert_eq!(second["sourceUrl"], "https://p");
    }

    #[tokio::test]
    async fn test_quiz_paths_encode_id() {
        let transport = MockTransport::new().with_response(
            "/api/v1/quiz/a%2Fb",
            json!({"questions": [{"question": "Q?", "options": ["x", "y"], "correctIndex": 1}]}),
        );
        let api = BackendApi::new(Arc::new(transport.clone()));

        let quiz = api.quiz("a/b").await.unwrap();
        assert_eq!(quiz.questions[0].correct_index, 1);
        api.submit_quiz("a/b", vec![1, -1]).await.unwrap();

        let calls = transport.calls();
        assert_eq!(calls[1].path, "/api/v1/quiz/a%2Fb/submit");
        assert_eq!(calls[1].payload, Some(json!({"answers": [1, -1]})));
    }

    #[tokio::test]
    async fn test_log_operation_serializes_type_key() {
        let transport = MockTransport::new();
        let api = BackendApi::new(Arc::new(transport.clone()));
        api.log_operation(&OpsLogEntry {
            kind: "translate".to_string(),
            source: "https://p".to_string(),
            input: "hola".to_string(),
            output: "hello".to_string(),
            target_lang: Some("en".to_string()),
            ts: 1,
        })
        .await;

        let payload = transport.calls()[0].payload.clone().unwrap();
        assert_eq!(payload["type"], "translate");
        assert_eq!(payload["targetLang"], "en");
    }

    #[tokio::test]
    async fn test_health_reads_health_path() {
        let transport =
            MockTransport::new().with_response(defaults::HEALTH_PATH, json!({"status": "ok"}));
        let api = BackendApi::new(Arc::new(transport.clone()));

        assert_eq!(api.health().await.unwrap()["status"], "ok");
        assert_eq!(transport.calls()[0].method, "GET");
    }

    #[test]
    fn test_quiz_id_missing() {
        assert!(matches!(quiz_id(&json!({})), Err(Error::InvalidResponse(_))));
        assert_eq!(quiz_id(&json!({"data": {"id": 3}})).unwrap(), "3");
    }
}
