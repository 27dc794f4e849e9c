//! Structured logging schema and field name constants for pagegenie.
//!
//! All crates use these names for structured `tracing` fields so log output
//! from the router, bridge, gateway and coordinator can be queried uniformly.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Unexpected internal failure (task panicked, store unwritable) |
//! | WARN  | Recoverable issue, automatic fallback applied, credential cleared |
//! | INFO  | Lifecycle events (login, logout, coordinator start/stop) |
//! | DEBUG | Decision points (route chosen, probe answers), request completions |
//! | TRACE | Per-message bridge traffic |
//!
//! Bearer tokens are never logged. Log `has_token` and `expires_at_ms` instead.

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID of a bridge round-trip. Format: UUIDv7.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "router", "bridge", "gateway", "auth", "coordinator", "settings"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "client", "host", "ollama"
pub const COMPONENT: &str = "component";

/// Logical operation name (`summarize`, `translate`, `login`, ...).
pub const OPERATION: &str = "op";

// ─── Routing fields ────────────────────────────────────────────────────────

/// Configured mode (`auto`, `offline-only`, `online-only`).
pub const MODE: &str = "mode";

/// Route actually taken (`local`, `remote`).
pub const ROUTE: &str = "route";

// ─── Remote fields ─────────────────────────────────────────────────────────

/// Backend endpoint path.
pub const ENDPOINT: &str = "endpoint";

/// Whether a bearer token was attached.
pub const HAS_TOKEN: &str = "has_token";

/// Credential expiry (ms since epoch).
pub const EXPIRES_AT_MS: &str = "expires_at_ms";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Byte length of the input text.
pub const TEXT_LEN: &str = "text_len";

/// Byte length of a result.
pub const RESPONSE_LEN: &str = "response_len";
