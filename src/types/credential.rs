//! Credential Types
//!
//! The cached credential, its persisted form, and the outcome of a refresh.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::CredentialError;

/// Access credential bound to an absolute expiry instant.
#[derive(Clone)]
pub struct Credential {
    token: SecretString,
    /// Expiration time.
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Create new credential.
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: SecretString::new(token.into()),
            expires_at,
        }
    }

    /// Token value.
    pub fn token(&self) -> &SecretString {
        &self.token
    }

    /// Consume into the token value.
    pub fn into_token(self) -> SecretString {
        self.token
    }

    /// A credential is valid strictly before its expiry instant.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.token.expose_secret() == other.token.expose_secret()
            && self.expires_at == other.expires_at
    }
}

impl Eq for Credential {}

/// Persisted form of a credential.
///
/// Both fields are required on deserialisation, so an entry is either wholly
/// present or treated as unreadable.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Token value.
    pub token: String,
    /// Expiration time.
    pub expires_at: DateTime<Utc>,
}

impl From<&Credential> for CacheEntry {
    fn from(credential: &Credential) -> Self {
        Self {
            token: credential.token.expose_secret().clone(),
            expires_at: credential.expires_at,
        }
    }
}

impl From<CacheEntry> for Credential {
    fn from(entry: CacheEntry) -> Self {
        Self::new(entry.token, entry.expires_at)
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Result of a single refresh attempt.
pub type RefreshOutcome = Result<Credential, CredentialError>;
