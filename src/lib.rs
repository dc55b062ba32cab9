//! Credential Cache
//!
//! Cached, persisted and self-refreshing access credential for authenticating
//! outbound API calls.
//!
//! # Features
//!
//! - Serves the persisted credential while `now < expires_at`
//! - Clears an expired credential as soon as it is detected
//! - Refreshes through an OAuth2 client credentials exchange (RFC 6749 Section 4.4)
//! - Coalesces concurrent refreshes into one call (single-flight)
//! - Blocking entry points layered on the async core
//!
//! # Example
//!
//! ```rust,ignore
//! use credential_cache::credential_provider;
//! use secrecy::ExposeSecret;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = credential_provider()
//!         .client_id("my-client-id")
//!         .client_secret("my-client-secret")
//!         .token_endpoint("https://api.petfinder.com/v2/oauth2/token")
//!         .file_store("/var/lib/my-app")
//!         .build()?;
//!
//!     match provider.credential().await {
//!         Some(token) => println!("Authorization: Bearer {}", token.expose_secret()),
//!         None => println!("Unauthenticated"),
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: credential, persisted entry and configuration types
//! - `error`: error hierarchy and token endpoint error mapping
//! - `core`: clock and HTTP transport ports
//! - `token`: storage, refresh client, single-flight coordinator and provider
//! - `builders`: fluent provider builder

pub mod builders;
pub mod core;
pub mod error;
pub mod token;
pub mod types;

// Re-export builders
pub use builders::{credential_provider, CredentialProviderBuilder};

// Re-export errors
pub use error::{
    create_error_from_response, map_token_error, parse_error_response, ConfigurationError,
    CredentialError, CredentialResult, EndpointError, NetworkError, ProtocolError, StorageError,
    TokenErrorResponse,
};

// Re-export types
pub use types::{CacheEntry, ClientIdentity, Credential, ProviderConfig, RefreshOutcome};

// Re-export core components
pub use core::{
    Clock, EndpointResponse, FormPost, HttpTransport, ManualClock, MockHttpTransport,
    ReqwestHttpTransport, SystemClock,
};

// Re-export credential management
pub use token::{
    // Storage
    CredentialStore, FileCredentialStore, InMemoryCredentialStore, MockCredentialStore,
    NullCredentialStore, StoreOp,
    // Refresh
    ClientCredentialsRefreshClient, MockRefreshClient, RefreshClient, TokenResponse,
    // Coordination
    Flight, SingleFlight,
    // Provider
    CredentialProvider, ProviderStats,
};
