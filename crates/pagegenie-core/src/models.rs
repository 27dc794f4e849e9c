//! Core data models for pagegenie.

use serde::{Deserialize, Serialize};

// =============================================================================
// OPERATIONS AND ROUTING
// =============================================================================

/// Text transformation requested by a UI surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Summarize,
    Explain,
    Rewrite,
    Translate,
    Proofread,
    CommentCode,
    QuizGenerate,
    CompareConcept,
}

impl Operation {
    /// Every operation, in menu order.
    pub const ALL: [Operation; 8] = [
        Self::Summarize,
        Self::Explain,
        Self::Rewrite,
        Self::Translate,
        Self::Proofread,
        Self::CommentCode,
        Self::QuizGenerate,
        Self::CompareConcept,
    ];

    /// Wire name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::Explain => "explain",
            Self::Rewrite => "rewrite",
            Self::Translate => "translate",
            Self::Proofread => "proofread",
            Self::CommentCode => "comment_code",
            Self::QuizGenerate => "quiz_generate",
            Self::CompareConcept => "compare_concept",
        }
    }

    /// Backend `action` for `/api/v1/ai`, or `None` when the operation may
    /// not be routed remotely.
    pub fn backend_action(&self) -> Option<&'static str> {
        match self {
            Self::Summarize
            | Self::Rewrite
            | Self::Explain
            | Self::Translate
            | Self::Proofread
            | Self::CommentCode => Some(self.as_str()),
            Self::QuizGenerate | Self::CompareConcept => None,
        }
    }

    /// Whether the reader surface asks the backend for `{bullets, citations}`.
    pub fn prefers_structured(&self) -> bool {
        matches!(self, Self::Summarize | Self::Explain)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Operation {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "summarize" => Ok(Self::Summarize),
            "explain" => Ok(Self::Explain),
            "rewrite" => Ok(Self::Rewrite),
            "translate" => Ok(Self::Translate),
            "proofread" => Ok(Self::Proofread),
            "comment_code" => Ok(Self::CommentCode),
            "quiz_generate" => Ok(Self::QuizGenerate),
            "compare_concept" => Ok(Self::CompareConcept),
            _ => Err(format!("Invalid operation: {}", s)),
        }
    }
}

/// Execution-path preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Prefer on-device, fall back to the backend.
    #[default]
    #[serde(rename = "auto")]
    Auto,
    /// On-device only; never contact the backend for AI.
    #[serde(rename = "offline-only")]
    OfflineOnly,
    /// Backend only; never touch the on-device channel.
    #[serde(rename = "online-only")]
    OnlineOnly,
}

impl Mode {
    pub fn allows_local(&self) -> bool {
        !matches!(self, Self::OnlineOnly)
    }

    pub fn allows_remote(&self) -> bool {
        !matches!(self, Self::OfflineOnly)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::OfflineOnly => write!(f, "offline-only"),
            Self::OnlineOnly => write!(f, "online-only"),
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "offline-only" | "offline" => Ok(Self::OfflineOnly),
            "online-only" | "online" => Ok(Self::OnlineOnly),
            _ => Err(format!("Invalid mode: {}", s)),
        }
    }
}

/// Path a request actually took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteDecision {
    Local,
    Remote,
}

impl std::fmt::Display for RouteDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// Audience the backend and on-device prompts tailor output for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    #[default]
    General,
    Student,
    Researcher,
    Editor,
}

impl Persona {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Student => "student",
            Self::Researcher => "researcher",
            Self::Editor => "editor",
        }
    }
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Persona {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "general" => Ok(Self::General),
            "student" => Ok(Self::Student),
            "researcher" => Ok(Self::Researcher),
            "editor" => Ok(Self::Editor),
            _ => Err(format!("Invalid persona: {}", s)),
        }
    }
}

// =============================================================================
// CREDENTIALS
// =============================================================================

/// Bearer token plus the instant it stops being usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    /// Milliseconds since the Unix epoch.
    pub expires_at_ms: i64,
}

impl Credential {
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp_millis())
    }
}

// =============================================================================
// AI RESULTS
// =============================================================================

/// A source reference attached to a structured result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub url: String,
    pub title: String,
    pub note: String,
}

/// List-style result: `{bullets, citations}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredResult {
    pub bullets: Vec<String>,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

/// Display-ready content of a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiContent {
    Text(String),
    Structured(StructuredResult),
}

/// Output of a routed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiResult {
    /// Raw result text, verbatim from whichever channel produced it.
    pub text: String,
    pub route: RouteDecision,
}

// =============================================================================
// BACKEND PAYLOADS
// =============================================================================

/// Body of `POST /api/v1/ai`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiRequest {
    pub text: String,
    pub action: String,
    pub target_lang: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona: Option<Persona>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cite_sources: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub full_name: String,
    pub username: String,
    pub password: String,
}

/// Body of `POST /api/v1/ai/compare-concept`.
#[derive(Debug, Clone, Serialize)]
pub struct CompareConceptRequest {
    pub selection_text: String,
    pub page_url: String,
}

/// Concept drift analysis of a selection against the user's notes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConceptComparison {
    pub key_claim: String,
    pub agreement: String,
    pub drift: String,
}

/// Body of `POST /api/v1/quiz/generate`.
#[derive(Debug, Clone, Serialize)]
pub struct QuizFromUrlRequest {
    pub url: String,
}

/// Body of `POST /api/v1/quiz/generate-from-text`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizFromTextRequest {
    pub text: String,
    pub source_url: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_index: i64,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,
}

/// Body of `POST /api/v1/quiz/{id}/submit`. Unanswered questions are `-1`.
#[derive(Debug, Clone, Serialize)]
pub struct QuizSubmission {
    pub answers: Vec<i64>,
}

/// Body of `POST /api/notes`.
#[derive(Debug, Clone, Serialize)]
pub struct NoteRequest {
    pub source: String,
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub ts: i64,
}

/// Categorization the backend attaches to a saved note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NoteCategories {
    pub topic: Option<String>,
    pub tags: Vec<String>,
    pub related_to: Vec<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavedNote {
    pub raw: serde_json::Value,
    pub categories: Option<NoteCategories>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingSuggestRequest {
    pub base_url: String,
    pub base_summary: String,
}

/// Body of `POST /api/ops/log`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpsLogEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub source: String,
    pub input: String,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_lang: Option<String>,
    pub ts: i64,
}
