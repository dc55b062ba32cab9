//! Builders
//!
//! Fluent builders for provider construction.

pub mod provider;

pub use provider::{credential_provider, CredentialProviderBuilder};
