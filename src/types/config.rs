//! Configuration Types
//!
//! Client identity and provider configuration.

use secrecy::SecretString;
use std::time::Duration;

/// Environment variable holding the client identifier.
pub const ENV_CLIENT_ID: &str = "CREDENTIAL_CACHE_CLIENT_ID";
/// Environment variable holding the client secret.
pub const ENV_CLIENT_SECRET: &str = "CREDENTIAL_CACHE_CLIENT_SECRET";
/// Environment variable holding the token endpoint URL.
pub const ENV_TOKEN_ENDPOINT: &str = "CREDENTIAL_CACHE_TOKEN_ENDPOINT";
/// Environment variable holding the refresh timeout in seconds.
pub const ENV_TIMEOUT_SECS: &str = "CREDENTIAL_CACHE_TIMEOUT_SECS";

/// Default storage key for the persisted credential.
pub const DEFAULT_STORAGE_KEY: &str = "access_token";

/// Client identity exchanged for a new credential.
#[derive(Clone)]
pub struct ClientIdentity {
    /// Client identifier.
    pub client_id: String,
    /// Client secret.
    pub client_secret: SecretString,
}

impl ClientIdentity {
    /// Create new client identity.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
        }
    }
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self::new(String::new(), String::new())
    }
}

impl std::fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Credential provider configuration.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    /// Client identity.
    pub identity: ClientIdentity,
    /// Token endpoint URL (used by the HTTP refresh client).
    pub token_endpoint: Option<String>,
    /// Timeout applied to each refresh call.
    pub timeout: Duration,
    /// Key the persisted credential is stored under.
    pub storage_key: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            identity: ClientIdentity::default(),
            token_endpoint: None,
            timeout: Duration::from_secs(30),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

impl ProviderConfig {
    /// Create configuration with defaults, then apply environment variable overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(client_id) = std::env::var(ENV_CLIENT_ID) {
            config.identity.client_id = client_id;
        }
        if let Ok(secret) = std::env::var(ENV_CLIENT_SECRET) {
            config.identity.client_secret = SecretString::new(secret);
        }
        if let Ok(endpoint) = std::env::var(ENV_TOKEN_ENDPOINT) {
            config.token_endpoint = Some(endpoint);
        }
        if let Some(secs) = std::env::var(ENV_TIMEOUT_SECS)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }

        config
    }
}
