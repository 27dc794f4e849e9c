//! Centralized default constants for pagegenie.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic numbers.

// =============================================================================
// BACKEND
// =============================================================================

/// Default backend base URL.
pub const BACKEND_URL: &str = "http://localhost:8098";

/// AI operation endpoint.
pub const AI_PATH: &str = "/api/v1/ai";

/// Concept comparison endpoint.
pub const COMPARE_CONCEPT_PATH: &str = "/api/v1/ai/compare-concept";

/// Login endpoint. Token comes back in the `Authorization` response header.
pub const LOGIN_PATH: &str = "/api/v1/auth/login";

/// Signup endpoint. Token comes back in the `Authorization` response header.
pub const SIGNUP_PATH: &str = "/api/v1/auth/signup";

/// Current profile endpoint.
pub const ME_PATH: &str = "/api/v1/auth/me";

/// Quiz generation from a URL.
pub const QUIZ_GENERATE_PATH: &str = "/api/v1/quiz/generate";

/// Quiz generation from raw text.
pub const QUIZ_GENERATE_FROM_TEXT_PATH: &str = "/api/v1/quiz/generate-from-text";

/// Recent quiz attempts.
pub const QUIZ_RECENT_ATTEMPTS_PATH: &str = "/api/v1/quiz/attempts/recent";

/// Reading suggestions.
pub const READING_SUGGEST_PATH: &str = "/api/v1/reading/suggest";

/// Recent reading suggestions.
pub const READING_RECENT_PATH: &str = "/api/v1/reading/recent";

/// Note persistence.
pub const NOTES_PATH: &str = "/api/notes";

/// Operation log.
pub const OPS_LOG_PATH: &str = "/api/ops/log";

/// Liveness probe.
pub const HEALTH_PATH: &str = "/api/health";

// =============================================================================
// CREDENTIALS
// =============================================================================

/// Expiry applied when a token carries no readable `exp` claim (15 minutes).
pub const TOKEN_FALLBACK_TTL_MS: i64 = 15 * 60 * 1000;

// =============================================================================
// LOCAL CHANNEL
// =============================================================================

/// Time to wait for a correlated on-device response.
pub const LOCAL_TIMEOUT_SECS: u64 = 20;

/// Time to wait for the on-device availability answer.
pub const LOCAL_PROBE_TIMEOUT_MS: u64 = 800;

/// Per-call cap for a task-specific on-device capability.
pub const CAPABILITY_TIMEOUT_SECS: u64 = 20;

/// Per-call cap for the general prompt model.
pub const PROMPT_TIMEOUT_SECS: u64 = 30;

/// Buffer size of each bridge direction.
pub const BRIDGE_CAPACITY: usize = 64;

/// Default local Ollama base URL for the prompt model.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default on-device prompt model.
pub const OLLAMA_MODEL: &str = "llama3.2:3b";

/// Sampling temperature for on-device prompts.
pub const PROMPT_TEMPERATURE: f32 = 0.2;

// =============================================================================
// SETTINGS
// =============================================================================

/// Default translation target language.
pub const TARGET_LANG: &str = "en";

/// Settings change broadcast capacity.
pub const SETTINGS_EVENT_CAPACITY: usize = 32;

/// Coordinator request queue capacity.
pub const COORDINATOR_CAPACITY: usize = 64;

/// Settings file name under the config directory.
pub const SETTINGS_FILE: &str = "settings.json";
