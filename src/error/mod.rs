//! Credential Cache Error Types
//!
//! None of these escape the provider's `credential()` / `force_refresh()`
//! boundary; they are logged there and resolved to an absent credential.
//! They surface from the builder, the stores and the refresh clients.

use std::time::Duration;
use thiserror::Error;

/// Root error type for the credential cache.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("network: {0}")]
    Network(#[from] NetworkError),

    #[error("store: {0}")]
    Storage(#[from] StorageError),

    #[error("token response: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("token endpoint: {0}")]
    Endpoint(#[from] EndpointError),
}

impl CredentialError {
    /// Stable code used in log fields.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CREDENTIAL_CONFIG",
            Self::Network(_) => "CREDENTIAL_NETWORK",
            Self::Storage(_) => "CREDENTIAL_STORAGE",
            Self::Protocol(_) => "CREDENTIAL_PROTOCOL",
            Self::Endpoint(EndpointError::ClientRejected { .. }) => "CREDENTIAL_CLIENT_REJECTED",
            Self::Endpoint(_) => "CREDENTIAL_ENDPOINT",
        }
    }

    /// Whether a later attempt could succeed without a configuration change.
    ///
    /// The provider never retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Endpoint(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Whether the client identity itself was refused.
    pub fn is_invalid_client(&self) -> bool {
        matches!(self, Self::Endpoint(EndpointError::ClientRejected { .. }))
    }
}

/// Builder and configuration error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("{message}")]
    InvalidConfig { message: String },

    #[error("`{field}` is required")]
    MissingRequired { field: String },

    #[error("token endpoint `{url}` is not a valid URL")]
    InvalidEndpoint { url: String },
}

/// Failure to reach the token endpoint.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("no response within {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Persistent store failure.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("reading stored credential failed: {message}")]
    ReadFailed { message: String },

    #[error("writing credential failed: {message}")]
    WriteFailed { message: String },

    #[error("clearing stored credential failed: {message}")]
    DeleteFailed { message: String },

    #[error("stored credential is unreadable: {message}")]
    CorruptedData { message: String },
}

/// Token endpoint answered, but not with something usable.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("{message}")]
    InvalidResponse { message: String },

    #[error("`{field}` missing from token response")]
    MissingField { field: String },

    #[error("redirected to `{location}`")]
    UnexpectedRedirect { location: String },

    #[error("body of {size} bytes exceeds the response limit")]
    ResponseTooLarge { size: usize },

    #[error("malformed JSON: {message}")]
    InvalidJson { message: String },
}

/// Token endpoint refused the exchange.
#[derive(Error, Debug)]
pub enum EndpointError {
    /// `invalid_client`, `unauthorized_client`, or a bare 401/403.
    #[error("client rejected (HTTP {status}){}", describe(.description))]
    ClientRejected {
        status: u16,
        description: Option<String>,
    },

    /// Any other OAuth2 error code.
    #[error("`{code}` (HTTP {status}){}", describe(.description))]
    GrantRejected {
        status: u16,
        code: String,
        description: Option<String>,
    },

    /// 429 or `temporarily_unavailable`.
    #[error("rate limited")]
    RateLimited { status: u16 },

    /// 5xx or `server_error`.
    #[error("unavailable (HTTP {status}){}", describe(.description))]
    Unavailable {
        status: u16,
        description: Option<String>,
    },
}

impl EndpointError {
    pub fn status(&self) -> u16 {
        match self {
            Self::ClientRejected { status, .. }
            | Self::GrantRejected { status, .. }
            | Self::RateLimited { status }
            | Self::Unavailable { status, .. } => *status,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Unavailable { .. })
    }
}

fn describe(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(": {}", d))
        .unwrap_or_default()
}

/// Result type for credential cache operations.
pub type CredentialResult<T> = Result<T, CredentialError>;

/// Error body returned by a token endpoint (RFC 6749 Section 5.2).
#[derive(Debug, Clone, serde::Deserialize)]
pub struct TokenErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Classify an RFC 6749 error body.
pub fn map_token_error(status: u16, response: &TokenErrorResponse) -> EndpointError {
    let description = response.error_description.clone();
    match response.error.as_str() {
        "invalid_client" | "unauthorized_client" => {
            EndpointError::ClientRejected { status, description }
        }
        "temporarily_unavailable" => EndpointError::RateLimited { status },
        "server_error" => EndpointError::Unavailable { status, description },
        code => EndpointError::GrantRejected {
            status,
            code: code.to_string(),
            description,
        },
    }
}

/// Parse error body, if it is one.
pub fn parse_error_response(body: &str) -> Option<TokenErrorResponse> {
    serde_json::from_str(body).ok()
}

/// Error for a non-success token endpoint response.
///
/// The OAuth2 error code wins when the body carries one; otherwise the
/// status decides.
pub fn create_error_from_response(status: u16, body: &str) -> CredentialError {
    if let Some(response) = parse_error_response(body) {
        return map_token_error(status, &response).into();
    }

    let error = match status {
        401 | 403 => EndpointError::ClientRejected {
            status,
            description: None,
        },
        429 => EndpointError::RateLimited { status },
        500..=599 => EndpointError::Unavailable {
            status,
            description: None,
        },
        _ => EndpointError::GrantRejected {
            status,
            code: "unexpected_status".to_string(),
            description: None,
        },
    };

    error.into()
}
