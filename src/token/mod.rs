//! Credential Management
//!
//! Credential caching, persistence, refresh and refresh coordination.
//!
//! This module provides:
//!
//! - **Storage**: Persistence port for the cached credential
//! - **Refresh**: Client credentials exchange for a new credential
//! - **Single-flight**: Coalescing of concurrent refreshes
//! - **Provider**: Cache lookup with transparent refresh

pub mod provider;
pub mod refresh;
pub mod single_flight;
pub mod storage;

// Storage
pub use storage::{
    CredentialStore, FileCredentialStore, InMemoryCredentialStore, MockCredentialStore,
    NullCredentialStore, StoreOp,
};

// Refresh
pub use refresh::{
    ClientCredentialsRefreshClient, MockRefreshClient, RefreshClient, TokenResponse,
};

// Coordination
pub use single_flight::{Flight, SharedOutcome, SingleFlight};

// Provider
pub use provider::{CredentialProvider, ProviderStats};
