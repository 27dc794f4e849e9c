//! Login, signup and logout against a mock backend.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use pagegenie_client::{AuthClient, Gateway};
use pagegenie_core::{Error, Settings, SettingsStore};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn jwt_expiring_at(exp_secs: i64) -> String {
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(json!({"sub": "ada", "exp": exp_secs}).to_string())
    )
}

fn auth_client(backend_url: &str) -> (AuthClient, Arc<SettingsStore>) {
    let settings = Arc::new(SettingsStore::in_memory(Settings {
        backend_url: backend_url.to_string(),
        ..Settings::default()
    }));
    let gateway = Gateway::new(Arc::clone(&settings)).unwrap();
    (AuthClient::new(gateway), settings)
}

#[tokio::test]
async fn test_login_stores_token_and_expiry_from_header() {
    let server = MockServer::start().await;
    let exp_secs = Utc::now().timestamp() + 60;
    let token = jwt_expiring_at(exp_secs);
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .and(body_json(json!({"username": "ada", "password": "hunter22"})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Authorization", format!("Bearer {}", token).as_str())
                .set_body_json(json!({"message": "ok"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (auth, settings) = auth_client(&server.uri());
    let credential = auth.login(" ada ", "hunter22").await.unwrap();

    assert_eq!(credential.token, token);
    assert_eq!(credential.expires_at_ms, exp_secs * 1000);
    let stored = settings.get();
    assert_eq!(stored.api_token, token);
    assert_eq!(stored.token_exp, exp_secs * 1000);
    assert_eq!(auth.current_credential(), Some(credential));
}

#[tokio::test]
async fn test_opaque_token_gets_fallback_expiry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .respond_with(ResponseTemplate::new(200).insert_header("authorization", "Bearer opaque"))
        .mount(&server)
        .await;

    let (auth, _settings) = auth_client(&server.uri());
    let before = Utc::now().timestamp_millis();
    let credential = auth.login("ada", "pw").await.unwrap();
    let after = Utc::now().timestamp_millis();

    assert_eq!(credential.token, "opaque");
    assert!(credential.expires_at_ms >= before + 900_000);
    assert!(credential.expires_at_ms <= after + 900_000);
}

#[tokio::test]
async fn test_missing_authorization_header_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "in-body"})))
        .mount(&server)
        .await;

    let (auth, settings) = auth_client(&server.uri());
    let err = auth.login("ada", "pw").await.unwrap_err();

    assert!(matches!(err, Error::MalformedAuthResponse));
    assert_eq!(settings.get().api_token, "");
}

#[tokio::test]
async fn test_rejected_login_leaves_existing_credential() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let settings = Arc::new(SettingsStore::in_memory(Settings {
        backend_url: server.uri(),
        api_token: "previous".to_string(),
        token_exp: Utc::now().timestamp_millis() + 60_000,
        ..Settings::default()
    }));
    let auth = AuthClient::new(Gateway::new(Arc::clone(&settings)).unwrap());

    match auth.login("ada", "wrong").await {
        Err(Error::BackendError { status, body }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "bad credentials");
        }
        other => panic!("expected BackendError, got {:?}", other),
    }
    assert_eq!(settings.get().api_token, "previous");
}

#[tokio::test]
async fn test_blank_fields_make_no_request() {
    let server = MockServer::start().await;
    let (auth, _settings) = auth_client(&server.uri());

    assert!(matches!(
        auth.login("  ", "pw").await,
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        auth.signup("Ada", "ada", "").await,
        Err(Error::InvalidInput(_))
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_signup_sends_full_name_and_stores_token() {
    let server = MockServer::start().await;
    let token = jwt_expiring_at(Utc::now().timestamp() + 3600);
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/signup"))
        .and(body_json(json!({
            "fullName": "Ada Lovelace",
            "username": "ada",
            "password": "pw"
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("Authorization", format!("Bearer {}", token).as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (auth, settings) = auth_client(&server.uri());
    auth.signup("Ada Lovelace", "ada", "pw").await.unwrap();
    assert_eq!(settings.get().api_token, token);
}

#[tokio::test]
async fn test_logout_resets_credential() {
    let settings = Arc::new(SettingsStore::in_memory(Settings {
        api_token: "tok".to_string(),
        token_exp: Utc::now().timestamp_millis() + 60_000,
        ..Settings::default()
    }));
    let auth = AuthClient::new(Gateway::new(Arc::clone(&settings)).unwrap());

    auth.logout().await.unwrap();
    auth.logout().await.unwrap();

    let after = settings.get();
    assert_eq!(after.api_token, "");
    assert_eq!(after.token_exp, 0);
    assert!(auth.current_credential().is_none());
}
