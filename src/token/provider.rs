//! Credential Provider
//!
//! Serves a valid credential from the persistent store, refreshing it through
//! the refresh client when it is missing or expired. Concurrent demand for a
//! refresh is coalesced into a single refresh call.

use secrecy::{ExposeSecret, SecretString};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

use crate::builders::CredentialProviderBuilder;
use crate::core::Clock;
use crate::token::single_flight::SingleFlight;
use crate::token::{CredentialStore, RefreshClient};
use crate::types::{CacheEntry, ClientIdentity, Credential};

/// Provider statistics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderStats {
    /// Requests answered from the store.
    pub cache_hits: u64,
    /// Expired entries found and cleared.
    pub stale_evictions: u64,
    /// Calls made to the refresh client.
    pub refresh_attempts: u64,
    pub refresh_successes: u64,
    pub refresh_failures: u64,
    /// Requests that joined an outstanding refresh instead of starting one.
    pub joined_waiters: u64,
}

#[derive(Default)]
struct StatsCounters {
    cache_hits: AtomicU64,
    stale_evictions: AtomicU64,
    refresh_attempts: AtomicU64,
    refresh_successes: AtomicU64,
    refresh_failures: AtomicU64,
    joined_waiters: AtomicU64,
}

impl StatsCounters {
    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ProviderStats {
        ProviderStats {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            stale_evictions: self.stale_evictions.load(Ordering::Relaxed),
            refresh_attempts: self.refresh_attempts.load(Ordering::Relaxed),
            refresh_successes: self.refresh_successes.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
            joined_waiters: self.joined_waiters.load(Ordering::Relaxed),
        }
    }
}

/// Cached, self-refreshing access credential.
///
/// Every failure (store, transport, token endpoint) is logged and resolved to
/// `None`; callers treat `None` as "unauthenticated".
pub struct CredentialProvider {
    identity: ClientIdentity,
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn RefreshClient>,
    clock: Arc<dyn Clock>,
    runtime: Handle,
    in_flight: SingleFlight<Option<Credential>>,
    stats: Arc<StatsCounters>,
}

impl CredentialProvider {
    pub(crate) fn from_parts(
        identity: ClientIdentity,
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn RefreshClient>,
        clock: Arc<dyn Clock>,
        runtime: Handle,
    ) -> Self {
        Self {
            identity,
            store,
            refresher,
            clock,
            runtime,
            in_flight: SingleFlight::new(),
            stats: Arc::new(StatsCounters::default()),
        }
    }

    /// Create a provider builder.
    pub fn builder() -> CredentialProviderBuilder {
        CredentialProviderBuilder::new()
    }

    /// Get a valid token, refreshing if the stored one is missing or expired.
    pub async fn credential(&self) -> Option<SecretString> {
        self.valid_credential().await.map(Credential::into_token)
    }

    /// Like [`credential`](Self::credential), returning the expiry as well.
    pub async fn valid_credential(&self) -> Option<Credential> {
        if let Some(credential) = self.cached().await {
            return Some(credential);
        }
        self.refresh(true).await
    }

    /// Refresh regardless of the stored credential.
    ///
    /// For use when a downstream service rejected the current token. Joins an
    /// outstanding refresh if there is one. On failure the stored entry is
    /// left as it was.
    pub async fn force_refresh(&self) -> Option<SecretString> {
        self.refresh(false).await.map(Credential::into_token)
    }

    /// `Authorization` header value for the current token.
    pub async fn authorization_header(&self) -> Option<String> {
        self.credential()
            .await
            .map(|token| format!("Bearer {}", token.expose_secret()))
    }

    /// Drop the stored credential.
    pub async fn invalidate(&self) {
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Failed to clear stored credential");
        }
    }

    /// Blocking variant of [`credential`](Self::credential).
    ///
    /// Shares the refresh coordination of the async entry points. Must not be
    /// called from within an async task.
    pub fn blocking_credential(&self) -> Option<SecretString> {
        let _runtime = self.runtime.enter();
        futures::executor::block_on(self.credential())
    }

    /// Blocking variant of [`force_refresh`](Self::force_refresh).
    ///
    /// Must not be called from within an async task.
    pub fn blocking_force_refresh(&self) -> Option<SecretString> {
        let _runtime = self.runtime.enter();
        futures::executor::block_on(self.force_refresh())
    }

    /// Whether a refresh is outstanding.
    pub fn is_refreshing(&self) -> bool {
        self.in_flight.is_in_flight()
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> ProviderStats {
        self.stats.snapshot()
    }

    /// Client identifier used for refreshes.
    pub fn client_id(&self) -> &str {
        &self.identity.client_id
    }

    async fn cached(&self) -> Option<Credential> {
        let entry = match self.store.read().await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                trace!("No stored credential");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored credential, refreshing");
                return None;
            }
        };

        let credential = Credential::from(entry);
        if credential.is_valid_at(self.clock.now()) {
            StatsCounters::incr(&self.stats.cache_hits);
            trace!(expires_at = %credential.expires_at, "Using stored credential");
            return Some(credential);
        }

        debug!(expires_at = %credential.expires_at, "Stored credential expired");
        None
    }

    async fn refresh(&self, reuse_stored: bool) -> Option<Credential> {
        let flight = self
            .in_flight
            .join_or_start(&self.runtime, || self.refresh_attempt(reuse_stored));

        if flight.is_joined() {
            StatsCounters::incr(&self.stats.joined_waiters);
            trace!("Joining outstanding refresh");
        }

        flight
            .into_outcome()
            .await
            .filter(|credential| credential.is_valid_at(self.clock.now()))
    }

    /// One refresh attempt, run under the single-flight slot.
    ///
    /// With `reuse_stored`, the store is read again first: a valid entry
    /// written by an attempt that finished since the caller's lookup is
    /// returned as is, and an expired one is cleared. Writes and expiry
    /// clears only happen inside attempts, so the entry cleared here is the
    /// one read here.
    fn refresh_attempt(
        &self,
        reuse_stored: bool,
    ) -> impl Future<Output = Option<Credential>> + Send + 'static {
        let identity = self.identity.clone();
        let store = Arc::clone(&self.store);
        let refresher = Arc::clone(&self.refresher);
        let clock = Arc::clone(&self.clock);
        let stats = Arc::clone(&self.stats);

        async move {
            if reuse_stored {
                match store.read().await {
                    Ok(Some(entry)) => {
                        let stored = Credential::from(entry);
                        if stored.is_valid_at(clock.now()) {
                            StatsCounters::incr(&stats.cache_hits);
                            trace!(expires_at = %stored.expires_at, "Stored credential already refreshed");
                            return Some(stored);
                        }

                        StatsCounters::incr(&stats.stale_evictions);
                        if let Err(e) = store.clear().await {
                            warn!(error = %e, "Failed to clear expired credential");
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "Failed to read stored credential, refreshing"),
                }
            }

            StatsCounters::incr(&stats.refresh_attempts);
            debug!(client_id = %identity.client_id, "Refreshing credential");

            let credential = match refresher
                .refresh(&identity.client_id, &identity.client_secret)
                .await
            {
                Ok(credential) => credential,
                Err(e) => {
                    StatsCounters::incr(&stats.refresh_failures);
                    warn!(error = %e, code = e.error_code(), "Failed to refresh credential");
                    return None;
                }
            };

            if !credential.is_valid_at(clock.now()) {
                StatsCounters::incr(&stats.refresh_failures);
                warn!(
                    expires_at = %credential.expires_at,
                    "Refreshed credential is already expired"
                );
                return None;
            }

            StatsCounters::incr(&stats.refresh_successes);
            if let Err(e) = store.write(CacheEntry::from(&credential)).await {
                warn!(error = %e, "Failed to persist refreshed credential");
            }
            debug!(expires_at = %credential.expires_at, "Credential refreshed");

            Some(credential)
        }
    }
}

impl std::fmt::Debug for CredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialProvider")
            .field("identity", &self.identity)
            .field("refreshing", &self.is_refreshing())
            .field("stats", &self.stats())
            .finish()
    }
}
