//! Error types for pagegenie.

use thiserror::Error;

/// Result type alias using pagegenie's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for pagegenie operations.
///
/// Every variant is recoverable: UI surfaces render it as a transient notice.
#[derive(Error, Debug)]
pub enum Error {
    /// The on-device channel is missing, timed out, or reported a failure.
    #[error("On-device AI unavailable: {0}")]
    LocalUnavailable(String),

    /// Offline-only mode and the on-device channel failed.
    #[error("On-device AI unavailable.")]
    OnDeviceUnavailable,

    /// Operation cannot be routed to the backend.
    #[error("Operation not supported by backend: {0}")]
    UnsupportedOperation(String),

    /// No backend URL in settings.
    #[error("Backend URL not configured in Options.")]
    BackendNotConfigured,

    /// Backend answered 401; the stored credential has been cleared.
    #[error("Unauthorized. Please log in again.")]
    Unauthorized,

    /// Backend answered with a non-2xx status other than 401.
    #[error("Backend error {status}: {body}")]
    BackendError { status: u16, body: String },

    /// Login/signup response without a usable `Authorization: Bearer` header.
    #[error("Authorization header missing in response.")]
    MalformedAuthResponse,

    /// The peer execution context is gone (torn down or reloaded).
    #[error("Extension context invalidated. Refresh page and try again.")]
    ExtensionContextInvalidated,

    /// A 2xx response that carries no usable result.
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the user has to log in again before retrying.
    pub fn requires_login(&self) -> bool {
        matches!(self, Error::Unauthorized)
    }

    /// True for failures of the on-device path.
    pub fn is_local_failure(&self) -> bool {
        matches!(
            self,
            Error::LocalUnavailable(_) | Error::ExtensionContextInvalidated
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
