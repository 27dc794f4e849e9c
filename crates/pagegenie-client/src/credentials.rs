//! Bearer credential lifecycle: token expiry decoding, storage, login and
//! logout.

use std::sync::Arc;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::Utc;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use pagegenie_core::defaults;
use pagegenie_core::{Credential, Error, LoginRequest, Result, SettingsStore, SignupRequest};

use crate::gateway::Gateway;

/// base64url that tolerates both padded and unpadded segments.
const TOKEN_SEGMENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Why a token's expiry could not be read.
#[derive(Debug, thiserror::Error)]
pub enum ClaimsError {
    #[error("token has {0} segments, expected 3")]
    Segments(usize),

    #[error("payload is not base64url: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("payload is not JSON: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("payload has no usable exp claim")]
    MissingExp,
}

/// Read the `exp` claim (seconds) of a three-segment token as milliseconds
/// since the epoch. Numeric strings are accepted; `0` counts as missing.
pub fn decode_expiry(token: &str) -> std::result::Result<i64, ClaimsError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(ClaimsError::Segments(segments.len()));
    }
    let bytes = TOKEN_SEGMENT.decode(segments[1])?;
    let payload: Value = serde_json::from_slice(&bytes)?;

    let secs = match payload.get("exp") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|secs| secs.is_finite() && *secs != 0.0)
    .ok_or(ClaimsError::MissingExp)?;

    Ok((secs * 1000.0) as i64)
}

/// Expiry for a freshly issued token: its `exp` claim, or `now + 15 min`.
pub fn expiry_for_token(token: &str, now_ms: i64) -> i64 {
    match decode_expiry(token) {
        Ok(exp) => exp,
        Err(e) => {
            debug!(error = %e, "Token expiry unreadable, using fallback TTL");
            now_ms + defaults::TOKEN_FALLBACK_TTL_MS
        }
    }
}

pub fn credential_from_token(token: &str, now_ms: i64) -> Credential {
    Credential {
        token: token.to_string(),
        expires_at_ms: expiry_for_token(token, now_ms),
    }
}

/// Token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token_from_header(header: Option<&str>) -> Result<String> {
    let header = header.ok_or(Error::MalformedAuthResponse)?;
    let scheme = header.get(..7).ok_or(Error::MalformedAuthResponse)?;
    if !scheme.eq_ignore_ascii_case("bearer ") {
        return Err(Error::MalformedAuthResponse);
    }
    let token = header[7..].trim();
    if token.is_empty() {
        return Err(Error::MalformedAuthResponse);
    }
    Ok(token.to_string())
}

// =============================================================================
// CREDENTIAL STORE
// =============================================================================

/// View of the credential held in [`SettingsStore`].
#[derive(Debug, Clone)]
pub struct CredentialStore {
    settings: Arc<SettingsStore>,
}

impl CredentialStore {
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    /// Stored credential, expired or not.
    pub fn current(&self) -> Option<Credential> {
        self.settings.get().credential()
    }

    /// Stored credential if still valid. An expired one is cleared; a failure
    /// to write the cleared file is logged, not returned.
    pub fn current_valid(&self) -> Option<Credential> {
        self.current_valid_at(Utc::now().timestamp_millis())
    }

    pub fn current_valid_at(&self, now_ms: i64) -> Option<Credential> {
        match self.current() {
            Some(credential) if credential.is_expired_at(now_ms) => {
                warn!(
                    expires_at_ms = credential.expires_at_ms,
                    "Stored credential expired, clearing"
                );
                if let Err(e) = self.clear() {
                    error!(error = %e, "Failed to persist cleared credential");
                }
                None
            }
            other => other,
        }
    }

    pub fn save(&self, credential: &Credential) -> Result<()> {
        self.settings.set_credential(credential)
    }

    /// Reset to `{token: "", exp: 0}`. Clearing an empty credential is a no-op.
    pub fn clear(&self) -> Result<()> {
        self.settings.clear_credential()
    }
}

// =============================================================================
// AUTH CLIENT
// =============================================================================

/// Login, signup and logout against the backend's auth endpoints.
#[derive(Debug, Clone)]
pub struct AuthClient {
    gateway: Gateway,
}

impl AuthClient {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    fn credentials(&self) -> &CredentialStore {
        self.gateway.credentials()
    }

    #[instrument(skip(self, password), fields(subsystem = "auth", op = "login"))]
    pub async fn login(&self, username: &str, password: &str) -> Result<Credential> {
        let (username, password) = (username.trim(), password.trim());
        if username.is_empty() || password.is_empty() {
            return Err(Error::InvalidInput(
                "Username and password are required.".to_string(),
            ));
        }
        let body = serde_json::to_value(LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })?;
        self.authenticate(defaults::LOGIN_PATH, body).await
    }

    #[instrument(skip(self, full_name, password), fields(subsystem = "auth", op = "signup"))]
    pub async fn signup(
        &self,
        full_name: &str,
        username: &str,
        password: &str,
    ) -> Result<Credential> {
        let (full_name, username, password) = (full_name.trim(), username.trim(), password.trim());
        if full_name.is_empty() || username.is_empty() || password.is_empty() {
            return Err(Error::InvalidInput("All fields are required.".to_string()));
        }
        let body = serde_json::to_value(SignupRequest {
            full_name: full_name.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })?;
        self.authenticate(defaults::SIGNUP_PATH, body).await
    }

    #[instrument(skip(self), fields(subsystem = "auth", op = "logout"))]
    pub async fn logout(&self) -> Result<()> {
        self.credentials().clear()?;
        info!("Signed out");
        Ok(())
    }

    /// Valid credential, clearing an expired one on the way.
    pub fn current_credential(&self) -> Option<Credential> {
        self.credentials().current_valid()
    }

    /// Current profile.
    pub async fn me(&self) -> Result<Value> {
        self.gateway.get(defaults::ME_PATH).await
    }

    /// POST credentials and store the token from the `Authorization` header.
    ///
    /// Failures leave the stored credential untouched.
    async fn authenticate(&self, path: &str, body: Value) -> Result<Credential> {
        let url = self.gateway.endpoint(path)?;
        let response = self.gateway.client().post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(endpoint = path, status = status.as_u16(), "Authentication rejected");
            return Err(Error::BackendError {
                status: status.as_u16(),
                body,
            });
        }

        let header = response
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let token = bearer_token_from_header(header)?;

        let credential = credential_from_token(&token, Utc::now().timestamp_millis());
        self.credentials().save(&credential)?;
        info!(
            endpoint = path,
            expires_at_ms = credential.expires_at_ms,
            "Signed in"
        );
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use pagegenie_core::Settings;

    fn token_with_payload(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn test_decode_expiry_numeric_exp() {
        let token = token_with_payload(r#"{"sub":"alice","exp":1700000000}"#);
        assert_eq!(decode_expiry(&token).unwrap(), 1_700_000_000_000);
    }

    #[test]
    fn test_decode_expiry_string_exp() {
        let token = token_with_payload(r#"{"exp":"1700000000"}"#);
        assert_eq!(decode_expiry(&token).unwrap(), 1_700_000_000_000);
    }

    #[test]
    fn test_decode_expiry_padded_segment() {
        let payload = base64::engine::general_purpose::URL_SAFE.encode(r#"{"exp":12}"#);
        let token = format!("h.{}.s", payload);
        assert_eq!(decode_expiry(&token).unwrap(), 12_000);
    }

    #[test]
    fn test_decode_expiry_failures() {
        assert!(matches!(
            decode_expiry("only.two"),
            Err(ClaimsError::Segments(2))
        ));
        assert!(matches!(
            decode_expiry("a.!!!.c"),
            Err(ClaimsError::Encoding(_))
        ));
        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode("nope"));
        assert!(matches!(decode_expiry(&not_json), Err(ClaimsError::Payload(_))));
        assert!(matches!(
            decode_expiry(&token_with_payload(r#"{"sub":"x"}"#)),
            Err(ClaimsError::MissingExp)
        ));
        assert!(matches!(
            decode_expiry(&token_with_payload(r#"{"exp":0}"#)),
            Err(ClaimsError::MissingExp)
        ));
    }

    #[test]
    fn test_fallback_expiry_is_fifteen_minutes() {
        let now = 1_000_000;
        assert_eq!(expiry_for_token("opaque-token", now), now + 900_000);
    }

    #[test]
    fn test_bearer_header_parsing() {
        assert_eq!(
            bearer_token_from_header(Some("Bearer abc.def.ghi")).unwrap(),
            "abc.def.ghi"
        );
        assert_eq!(bearer_token_from_header(Some("bearer   xyz ")).unwrap(), "xyz");
        assert!(matches!(
            bearer_token_from_header(None),
            Err(Error::MalformedAuthResponse)
        ));
        assert!(matches!(
            bearer_token_from_header(Some("Basic abc")),
            Err(Error::MalformedAuthResponse)
        ));
        assert!(matches!(
            bearer_token_from_header(Some("Bearer ")),
            Err(Error::MalformedAuthResponse)
        ));
        assert!(matches!(
            bearer_token_from_header(Some("Bear")),
            Err(Error::MalformedAuthResponse)
        ));
    }

    #[test]
    fn test_current_valid_clears_expired() {
        let store = CredentialStore::new(Arc::new(SettingsStore::in_memory(Settings::default())));
        store
            .save(&Credential {
                token: "t".to_string(),
                expires_at_ms: 5_000,
            })
            .unwrap();

        assert!(store.current_valid_at(4_999).is_some());
        assert!(store.current_valid_at(5_000).is_none());

        let settings = store.settings().get();
        assert_eq!(settings.api_token, "");
        assert_eq!(settings.token_exp, 0);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = CredentialStore::new(Arc::new(SettingsStore::in_memory(Settings::default())));
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.current().is_none());
    }
}
