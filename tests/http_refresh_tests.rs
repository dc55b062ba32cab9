//! Tests for the HTTP client credentials refresh against a mock token endpoint.

use credential_cache::{credential_provider, CredentialProvider, InMemoryCredentialStore};
use secrecy::ExposeSecret;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/v2/oauth2/token";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn provider_for(server: &MockServer, timeout: Duration) -> CredentialProvider {
    credential_provider()
        .client_id("test-client")
        .client_secret("test-secret")
        .token_endpoint(format!("{}{}", server.uri(), TOKEN_PATH))
        .timeout(timeout)
        .store(Arc::new(InMemoryCredentialStore::new()))
        .build()
        .expect("Failed to build provider")
}

fn token_body(token: &str, expires_in: u64) -> serde_json::Value {
    json!({
        "token_type": "Bearer",
        "expires_in": expires_in,
        "access_token": token
    })
}

#[tokio::test]
async fn test_refresh_posts_client_credentials_form() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=test-client"))
        .and(body_string_contains("client_secret=test-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("http-token", 3600)))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server, Duration::from_secs(5));

    let first = provider.credential().await.expect("token");
    let second = provider.credential().await.expect("token");
    assert_eq!(first.expose_secret(), "http-token");
    assert_eq!(second.expose_secret(), "http-token");
}

#[tokio::test]
async fn test_invalid_client_resolves_to_none() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "Client authentication failed"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let provider = provider_for(&server, Duration::from_secs(5));

    assert!(provider.credential().await.is_none());
    assert!(provider.credential().await.is_none());
    assert_eq!(provider.stats().refresh_failures, 2);
}

#[tokio::test]
async fn test_server_error_resolves_to_none() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let provider = provider_for(&server, Duration::from_secs(5));
    assert!(provider.credential().await.is_none());
}

#[tokio::test]
async fn test_missing_expiry_resolves_to_none() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
        .mount(&server)
        .await;

    let provider = provider_for(&server, Duration::from_secs(5));
    assert!(provider.credential().await.is_none());
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("late", 3600))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let provider = provider_for(&server, Duration::from_millis(200));
    assert!(provider.credential().await.is_none());
    assert!(!provider.is_refreshing());
}

#[tokio::test]
async fn test_redirect_is_not_followed() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "https://elsewhere.test/"))
        .mount(&server)
        .await;

    let provider = provider_for(&server, Duration::from_secs(5));
    assert!(provider.credential().await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_hit_endpoint_once() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("shared", 3600))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = Arc::new(provider_for(&server, Duration::from_secs(5)));

    let mut handles = Vec::new();
    for _ in 0..20 {
        let provider = provider.clone();
        handles.push(tokio::spawn(async move { provider.credential().await }));
    }

    for handle in handles {
        let token = handle.await.unwrap().expect("token");
        assert_eq!(token.expose_secret(), "shared");
    }
}

#[tokio::test]
async fn test_authorization_header_from_endpoint() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("abc123", 3600)))
        .mount(&server)
        .await;

    let provider = provider_for(&server, Duration::from_secs(5));
    assert_eq!(
        provider.authorization_header().await.as_deref(),
        Some("Bearer abc123")
    );
}
