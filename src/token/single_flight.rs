//! Single-flight coordination.
//!
//! At most one attempt runs per [`SingleFlight`]. Callers arriving while an
//! attempt is outstanding join it and observe its outcome; callers arriving
//! after it completed start a new one. Attempts run as spawned tasks, so
//! dropping any waiter (including the one that started the attempt) leaves
//! the attempt and the other waiters untouched.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::warn;

/// Completion signal shared by every waiter of one attempt.
pub type SharedOutcome<T> = Shared<BoxFuture<'static, T>>;

struct Attempt<T: Clone> {
    id: u64,
    outcome: SharedOutcome<T>,
}

/// Clears the slot when the attempt finishes, panics or is dropped, provided
/// the slot still holds that attempt.
struct SlotRelease<T: Clone> {
    slot: Arc<Mutex<Option<Attempt<T>>>>,
    id: u64,
}

impl<T: Clone> Drop for SlotRelease<T> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|current| current.id == self.id) {
            *slot = None;
        }
    }
}

/// How a caller got hold of an attempt's outcome.
pub enum Flight<T: Clone> {
    /// No attempt was outstanding; this caller started one.
    Started(SharedOutcome<T>),
    /// An attempt was already outstanding; this caller joined it.
    Joined(SharedOutcome<T>),
}

impl<T: Clone> Flight<T> {
    /// Whether this caller joined an existing attempt.
    pub fn is_joined(&self) -> bool {
        matches!(self, Self::Joined(_))
    }

    /// Outcome of the attempt.
    pub fn into_outcome(self) -> SharedOutcome<T> {
        match self {
            Self::Started(outcome) | Self::Joined(outcome) => outcome,
        }
    }
}

/// Guarded "current attempt" slot.
pub struct SingleFlight<T: Clone> {
    slot: Arc<Mutex<Option<Attempt<T>>>>,
    next_id: AtomicU64,
}

impl<T> SingleFlight<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    /// Create an idle coordinator.
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        }
    }

    /// Whether an attempt is currently outstanding.
    pub fn is_in_flight(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Join the outstanding attempt, or start one on `runtime`.
    ///
    /// Checking the slot, spawning the attempt and recording it happen under
    /// one lock, so two callers can never both start. `start` is only invoked
    /// when this caller becomes the starter. The slot is cleared by the
    /// attempt itself once `start`'s future resolves, before any waiter
    /// observes the outcome. A panicked or cancelled attempt resolves to
    /// `T::default()`.
    pub fn join_or_start<F, Fut>(&self, runtime: &Handle, start: F) -> Flight<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut slot = self.slot.lock();
        if let Some(attempt) = slot.as_ref() {
            return Flight::Joined(attempt.outcome.clone());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let attempt = start();
        let slot_ref = Arc::clone(&self.slot);

        let task = runtime.spawn(async move {
            let _release = SlotRelease { slot: slot_ref, id };
            attempt.await
        });

        let outcome = async move {
            task.await.unwrap_or_else(|e| {
                warn!(error = %e, "Single-flight attempt did not complete");
                T::default()
            })
        }
        .boxed()
        .shared();

        *slot = Some(Attempt {
            id,
            outcome: outcome.clone(),
        });

        Flight::Started(outcome)
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
