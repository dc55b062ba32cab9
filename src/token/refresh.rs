//! Refresh Client
//!
//! Exchanges the client identity for a new credential (RFC 6749 Section 4.4,
//! client credentials grant). Implementations make exactly one remote call per
//! `refresh`; retry policy belongs to the caller.

use async_trait::async_trait;
use chrono::Duration;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::core::{Clock, FormPost, HttpTransport};
use crate::error::{create_error_from_response, CredentialError, NetworkError, ProtocolError};
use crate::types::{Credential, RefreshOutcome};

/// Refresh client interface.
#[async_trait]
pub trait RefreshClient: Send + Sync {
    /// Exchange client identity for a new credential.
    async fn refresh(&self, client_id: &str, client_secret: &SecretString) -> RefreshOutcome;
}

/// Token endpoint success body.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Token type (usually "Bearer").
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Expires in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Client credentials refresh over HTTP.
pub struct ClientCredentialsRefreshClient<T: HttpTransport> {
    token_endpoint: String,
    timeout: std::time::Duration,
    transport: Arc<T>,
    clock: Arc<dyn Clock>,
}

impl<T: HttpTransport> ClientCredentialsRefreshClient<T> {
    /// Create new refresh client.
    pub fn new(
        token_endpoint: impl Into<String>,
        timeout: std::time::Duration,
        transport: Arc<T>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            token_endpoint: token_endpoint.into(),
            timeout,
            transport,
            clock,
        }
    }

    fn build_request_body(client_id: &str, client_secret: &SecretString) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "client_credentials")
            .append_pair("client_id", client_id)
            .append_pair("client_secret", client_secret.expose_secret())
            .finish()
    }

    fn into_credential(&self, response: TokenResponse) -> RefreshOutcome {
        let expires_in = response.expires_in.ok_or_else(|| ProtocolError::MissingField {
            field: "expires_in".to_string(),
        })?;
        let out_of_range = || ProtocolError::InvalidResponse {
            message: format!("expires_in out of range: {}", expires_in),
        };
        let lifetime = i64::try_from(expires_in)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(out_of_range)?;

        let expires_at = self
            .clock
            .now()
            .checked_add_signed(lifetime)
            .ok_or_else(out_of_range)?;

        Ok(Credential::new(response.access_token, expires_at))
    }
}

#[async_trait]
impl<T: HttpTransport> RefreshClient for ClientCredentialsRefreshClient<T> {
    async fn refresh(&self, client_id: &str, client_secret: &SecretString) -> RefreshOutcome {
        trace!(endpoint = %self.token_endpoint, "Requesting client credentials token");

        let request = FormPost {
            url: self.token_endpoint.clone(),
            body: Self::build_request_body(client_id, client_secret),
            timeout: self.timeout,
        };

        let response = self.transport.post_form(request).await?;

        if !response.is_success() {
            debug!(status = response.status, "Token endpoint rejected refresh");
            return Err(create_error_from_response(response.status, &response.body));
        }

        let token_response: TokenResponse =
            serde_json::from_str(&response.body).map_err(|e| ProtocolError::InvalidJson {
                message: e.to_string(),
            })?;

        self.into_credential(token_response)
    }
}

/// Mock refresh client for testing.
///
/// Returns queued outcomes in order, then the default credential if one is
/// set, and a connection failure otherwise.
#[derive(Default)]
pub struct MockRefreshClient {
    outcomes: Mutex<VecDeque<RefreshOutcome>>,
    default_credential: Mutex<Option<Credential>>,
    delay: Mutex<Option<std::time::Duration>>,
    request_history: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl MockRefreshClient {
    /// Create new mock refresh client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful refresh.
    pub fn queue_success(&self, credential: Credential) -> &Self {
        self.outcomes.lock().push_back(Ok(credential));
        self
    }

    /// Queue a failed refresh.
    pub fn queue_error(&self, error: CredentialError) -> &Self {
        self.outcomes.lock().push_back(Err(error));
        self
    }

    /// Queue a network failure.
    pub fn queue_network_error(&self) -> &Self {
        self.queue_error(
            NetworkError::ConnectionFailed {
                message: "Mock network failure".to_string(),
            }
            .into(),
        )
    }

    /// Credential returned once the queue is empty.
    pub fn set_default_credential(&self, credential: Credential) -> &Self {
        *self.default_credential.lock() = Some(credential);
        self
    }

    /// Simulated round-trip latency.
    pub fn set_delay(&self, delay: std::time::Duration) -> &Self {
        *self.delay.lock() = Some(delay);
        self
    }

    /// Number of refresh calls started.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Client ids seen by `refresh`.
    pub fn get_request_history(&self) -> Vec<String> {
        self.request_history.lock().clone()
    }
}

#[async_trait]
impl RefreshClient for MockRefreshClient {
    async fn refresh(&self, client_id: &str, _client_secret: &SecretString) -> RefreshOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.request_history.lock().push(client_id.to_string());

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self.outcomes.lock().pop_front();
        if let Some(outcome) = queued {
            return outcome;
        }

        self.default_credential.lock().clone().ok_or_else(|| {
            NetworkError::ConnectionFailed {
                message: "No mock response available".to_string(),
            }
            .into()
        })
    }
}
