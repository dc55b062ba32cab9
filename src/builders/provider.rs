//! Provider Builder
//!
//! Fluent builder for [`CredentialProvider`].

use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

use crate::core::{Clock, ReqwestHttpTransport, SystemClock, DEFAULT_MAX_RESPONSE_SIZE};
use crate::error::{ConfigurationError, CredentialResult};
use crate::token::{
    ClientCredentialsRefreshClient, CredentialProvider, CredentialStore, FileCredentialStore,
    NullCredentialStore, RefreshClient,
};
use crate::types::ProviderConfig;

enum StoreSelection {
    Custom(Arc<dyn CredentialStore>),
    FileIn(PathBuf),
    Disabled,
}

/// Credential provider builder.
///
/// A store must be chosen explicitly: either a store implementation,
/// [`file_store`](Self::file_store), or
/// [`without_persistence`](Self::without_persistence) for always-refresh mode.
pub struct CredentialProviderBuilder {
    config: ProviderConfig,
    store: Option<StoreSelection>,
    refresh_client: Option<Arc<dyn RefreshClient>>,
    clock: Option<Arc<dyn Clock>>,
    runtime: Option<Handle>,
}

impl CredentialProviderBuilder {
    /// Create new builder with default configuration.
    pub fn new() -> Self {
        Self::with_config(ProviderConfig::default())
    }

    /// Create builder seeded from the environment.
    pub fn from_env() -> Self {
        Self::with_config(ProviderConfig::from_env())
    }

    /// Create builder seeded from an existing configuration.
    pub fn with_config(config: ProviderConfig) -> Self {
        Self {
            config,
            store: None,
            refresh_client: None,
            clock: None,
            runtime: None,
        }
    }

    /// Set client ID.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.identity.client_id = client_id.into();
        self
    }

    /// Set client secret.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.config.identity.client_secret = SecretString::new(client_secret.into());
        self
    }

    /// Set token endpoint used by the built-in HTTP refresh client.
    pub fn token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.token_endpoint = Some(endpoint.into());
        self
    }

    /// Set refresh timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the key the credential is persisted under.
    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.config.storage_key = key.into();
        self
    }

    /// Use a custom credential store.
    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(StoreSelection::Custom(store));
        self
    }

    /// Persist the credential as a JSON file in `dir`, named after the storage key.
    pub fn file_store(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store = Some(StoreSelection::FileIn(dir.into()));
        self
    }

    /// Run without persistence; every request needing a credential refreshes.
    pub fn without_persistence(mut self) -> Self {
        self.store = Some(StoreSelection::Disabled);
        self
    }

    /// Use a custom refresh client instead of the HTTP one.
    pub fn refresh_client(mut self, client: Arc<dyn RefreshClient>) -> Self {
        self.refresh_client = Some(client);
        self
    }

    /// Set the clock (defaults to the system clock).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the runtime refreshes are spawned on (defaults to the current one).
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Build the provider.
    pub fn build(self) -> CredentialResult<CredentialProvider> {
        if self.config.identity.client_id.is_empty() {
            return Err(missing("client_id"));
        }

        if self.config.timeout.is_zero() {
            return Err(ConfigurationError::InvalidConfig {
                message: "Refresh timeout must be non-zero".to_string(),
            }
            .into());
        }

        let store: Arc<dyn CredentialStore> = match self.store {
            Some(StoreSelection::Custom(store)) => store,
            Some(StoreSelection::FileIn(dir)) => {
                if self.config.storage_key.is_empty() {
                    return Err(missing("storage_key"));
                }
                Arc::new(FileCredentialStore::new(dir, &self.config.storage_key))
            }
            Some(StoreSelection::Disabled) => Arc::new(NullCredentialStore),
            None => return Err(missing("store")),
        };

        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| missing("runtime"))?,
        };

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let refresher: Arc<dyn RefreshClient> = match self.refresh_client {
            Some(client) => client,
            None => {
                let endpoint = self
                    .config
                    .token_endpoint
                    .clone()
                    .ok_or_else(|| missing("token_endpoint"))?;
                url::Url::parse(&endpoint).map_err(|_| ConfigurationError::InvalidEndpoint {
                    url: endpoint.clone(),
                })?;

                let transport = Arc::new(ReqwestHttpTransport::with_options(
                    self.config.timeout,
                    DEFAULT_MAX_RESPONSE_SIZE,
                )?);
                Arc::new(ClientCredentialsRefreshClient::new(
                    endpoint,
                    self.config.timeout,
                    transport,
                    clock.clone(),
                ))
            }
        };

        Ok(CredentialProvider::from_parts(
            self.config.identity,
            store,
            refresher,
            clock,
            runtime,
        ))
    }
}

impl Default for CredentialProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(field: &str) -> crate::error::CredentialError {
    ConfigurationError::MissingRequired {
        field: field.to_string(),
    }
    .into()
}

/// Create a new credential provider builder.
pub fn credential_provider() -> CredentialProviderBuilder {
    CredentialProviderBuilder::new()
}
