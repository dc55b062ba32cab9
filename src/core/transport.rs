//! HTTP Transport
//!
//! Form POST to a token endpoint, behind a trait so the refresh client can be
//! exercised without a network.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use std::collections::VecDeque;
use std::time::Duration;

use crate::error::{ConfigurationError, CredentialError, CredentialResult, NetworkError, ProtocolError};

/// Upper bound on a token endpoint response body.
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 64 * 1024;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Form-encoded POST to a token endpoint.
///
/// The body carries the client secret, so `Debug` omits it.
#[derive(Clone)]
pub struct FormPost {
    /// Token endpoint URL.
    pub url: String,
    /// `application/x-www-form-urlencoded` body.
    pub body: String,
    /// Deadline for the whole exchange.
    pub timeout: Duration,
}

impl std::fmt::Debug for FormPost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormPost")
            .field("url", &self.url)
            .field("body", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Token endpoint reply.
#[derive(Clone, Debug)]
pub struct EndpointResponse {
    pub status: u16,
    pub body: String,
}

impl EndpointResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport used by the HTTP refresh client.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform one POST; redirects are reported, not followed.
    async fn post_form(&self, request: FormPost) -> CredentialResult<EndpointResponse>;
}

/// reqwest-backed transport.
pub struct ReqwestHttpTransport {
    client: reqwest::Client,
    max_response_size: usize,
}

impl ReqwestHttpTransport {
    /// Create transport with a 30 second connect timeout.
    pub fn new() -> CredentialResult<Self> {
        Self::with_options(Duration::from_secs(30), DEFAULT_MAX_RESPONSE_SIZE)
    }

    /// Create transport with custom connect timeout and response cap.
    pub fn with_options(connect_timeout: Duration, max_response_size: usize) -> CredentialResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ConfigurationError::InvalidConfig {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            max_response_size,
        })
    }

    async fn read_capped(
        &self,
        mut response: reqwest::Response,
        timeout: Duration,
    ) -> CredentialResult<String> {
        if let Some(len) = response.content_length() {
            let len = usize::try_from(len).unwrap_or(usize::MAX);
            if len > self.max_response_size {
                return Err(ProtocolError::ResponseTooLarge { size: len }.into());
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| network_error(e, timeout))?
        {
            if body.len() + chunk.len() > self.max_response_size {
                return Err(ProtocolError::ResponseTooLarge {
                    size: body.len() + chunk.len(),
                }
                .into());
            }
            body.extend_from_slice(&chunk);
        }

        String::from_utf8(body).map_err(|e| {
            ProtocolError::InvalidResponse {
                message: format!("Response body is not UTF-8: {}", e),
            }
            .into()
        })
    }
}

fn network_error(e: reqwest::Error, timeout: Duration) -> CredentialError {
    if e.is_timeout() {
        NetworkError::Timeout { timeout }.into()
    } else if e.is_connect() {
        NetworkError::ConnectionFailed {
            message: e.to_string(),
        }
        .into()
    } else {
        ProtocolError::InvalidResponse {
            message: e.to_string(),
        }
        .into()
    }
}

#[async_trait]
impl HttpTransport for ReqwestHttpTransport {
    async fn post_form(&self, request: FormPost) -> CredentialResult<EndpointResponse> {
        let timeout = request.timeout;

        let response = self
            .client
            .post(&request.url)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .header(ACCEPT, "application/json")
            .body(request.body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| network_error(e, timeout))?;

        let status = response.status();
        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            return Err(ProtocolError::UnexpectedRedirect { location }.into());
        }

        let body = self.read_capped(response, timeout).await?;

        Ok(EndpointResponse {
            status: status.as_u16(),
            body,
        })
    }
}

/// Mock transport for testing.
///
/// Replies in queue order; an empty queue behaves like an unreachable host.
#[derive(Default)]
pub struct MockHttpTransport {
    responses: Mutex<VecDeque<EndpointResponse>>,
    request_history: Mutex<Vec<FormPost>>,
}

impl MockHttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a JSON reply.
    pub fn queue_json_response(&self, status: u16, body: &serde_json::Value) -> &Self {
        self.responses.lock().push_back(EndpointResponse {
            status,
            body: body.to_string(),
        });
        self
    }

    /// Queue a plain text reply.
    pub fn queue_text_response(&self, status: u16, body: impl Into<String>) -> &Self {
        self.responses.lock().push_back(EndpointResponse {
            status,
            body: body.into(),
        });
        self
    }

    pub fn get_requests(&self) -> Vec<FormPost> {
        self.request_history.lock().clone()
    }

    pub fn get_last_request(&self) -> Option<FormPost> {
        self.request_history.lock().last().cloned()
    }
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn post_form(&self, request: FormPost) -> CredentialResult<EndpointResponse> {
        self.request_history.lock().push(request);

        self.responses.lock().pop_front().ok_or_else(|| {
            NetworkError::ConnectionFailed {
                message: "No mock response available".to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(url: &str) -> FormPost {
        FormPost {
            url: url.to_string(),
            body: "grant_type=client_credentials&client_secret=hunter2".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_mock_transport_replays_in_order() {
        let transport = MockHttpTransport::new();
        transport
            .queue_json_response(200, &serde_json::json!({"key": "value"}))
            .queue_text_response(503, "busy");

        let first = transport.post_form(post("https://example.com/token")).await.unwrap();
        assert!(first.is_success());
        assert!(first.body.contains("value"));

        let second = transport.post_form(post("https://example.com/token")).await.unwrap();
        assert_eq!(second.status, 503);
        assert!(!second.is_success());

        let history = transport.get_requests();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].url, "https://example.com/token");
    }

    #[tokio::test]
    async fn test_mock_transport_empty_queue() {
        let transport = MockHttpTransport::new();
        let result = transport.post_form(post("https://example.com")).await;
        assert!(matches!(result, Err(CredentialError::Network(_))));
    }

    #[test]
    fn test_form_post_debug_redacts_body() {
        let rendered = format!("{:?}", post("https://example.com/token"));
        assert!(rendered.contains("example.com"));
        assert!(!rendered.contains("hunter2"));
    }
}
