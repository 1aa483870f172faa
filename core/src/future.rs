//! Single-assignment result cell bridging a completion callback to blocking
//! waiters.
//!
//! # Design
//! A `ResultFuture` is a cloneable handle to shared state: a mutex-guarded
//! outcome slot and a condition variable. The producer (a transport thread)
//! records exactly one outcome and wakes every waiter with `notify_all`; any
//! number of consumer threads may block in `get` / `get_timeout`. Taking the
//! mutex on both sides orders the producer's write before every read that
//! observes it.
//!
//! Cancellation is advertised but not implemented: `cancel` always reports
//! success without touching the state or the in-flight exchange.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::FutureError;

enum Outcome<T, E> {
    Value(T),
    Failure(Arc<E>),
}

struct Shared<T, E> {
    outcome: Mutex<Option<Outcome<T, E>>>,
    ready: Condvar,
}

/// Handle to a value produced by an asynchronous operation.
///
/// Clones share the same slot, so the producer can keep one clone while the
/// caller holds another.
pub struct ResultFuture<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> ResultFuture<T, E> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                outcome: Mutex::new(None),
                ready: Condvar::new(),
            }),
        }
    }

    /// Record a successful result and release all waiters.
    ///
    /// Returns `false` and leaves the future untouched if an outcome was
    /// already recorded.
    pub fn set(&self, value: T) -> bool {
        self.complete(Outcome::Value(value))
    }

    /// Record a failure and release all waiters. Same single-write rule as
    /// `set`.
    pub fn set_failure(&self, error: E) -> bool {
        self.complete(Outcome::Failure(Arc::new(error)))
    }

    fn complete(&self, outcome: Outcome<T, E>) -> bool {
        let mut slot = self.lock();
        if slot.is_some() {
            warn!("ignoring second completion of an already completed future");
            return false;
        }
        *slot = Some(outcome);
        drop(slot);
        self.shared.ready.notify_all();
        true
    }

    /// Always reports success without doing anything: the exchange keeps
    /// running, waiters stay blocked, and `is_done` / `is_cancelled` are
    /// unaffected.
    pub fn cancel(&self, may_interrupt: bool) -> bool {
        debug!(may_interrupt, "cancel requested on a future that cannot be cancelled");
        true
    }

    /// True once either a value or a failure has been recorded. Never blocks
    /// on the outcome.
    pub fn is_done(&self) -> bool {
        self.lock().is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        false
    }

    fn lock(&self) -> MutexGuard<'_, Option<Outcome<T, E>>> {
        self.shared
            .outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T, E> ResultFuture<T, E>
where
    T: Clone,
    E: std::error::Error + 'static,
{
    /// Block until an outcome is recorded.
    pub fn get(&self) -> Result<T, FutureError<E>> {
        let mut slot = self.lock();
        loop {
            if let Some(result) = Self::read(&slot) {
                return result;
            }
            slot = self
                .shared
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block for at most `timeout`. Returns `FutureError::Timeout` if nothing
    /// was recorded in time; the operation itself is not affected.
    pub fn get_timeout(&self, timeout: Duration) -> Result<T, FutureError<E>> {
        let (slot, _) = self
            .shared
            .ready
            .wait_timeout_while(self.lock(), timeout, |slot| slot.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        Self::read(&slot).unwrap_or(Err(FutureError::Timeout(timeout)))
    }

    fn read(slot: &Option<Outcome<T, E>>) -> Option<Result<T, FutureError<E>>> {
        slot.as_ref().map(|outcome| match outcome {
            Outcome::Value(value) => Ok(value.clone()),
            Outcome::Failure(err) => Err(FutureError::Failed(Arc::clone(err))),
        })
    }
}

impl<T, E> Clone for ResultFuture<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> Default for ResultFuture<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for ResultFuture<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultFuture")
            .field("done", &self.is_done())
            .finish()
    }
}
