//! Single-assignment result cell shared by blocking and non-blocking callers.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use crate::error::Result;

type Listener<T> = Box<dyn FnOnce(&Result<T>) + Send + 'static>;

enum State<T> {
    Pending(Vec<Listener<T>>),
    Resolved(Arc<Result<T>>),
}

struct Inner<T> {
    state: Mutex<State<T>>,
    /// Wakes threads parked in `wait`.
    resolved: Condvar,
    /// Wakes tasks awaiting `outcome`.
    notify: Notify,
}

/// Completion handle for one dispatch.
///
/// Resolves exactly once. Listeners run in registration order, each exactly
/// once: those registered before resolution run on the resolving thread after
/// the state has flipped, those registered afterwards run immediately on the
/// registering thread. The state transition and the listener hand-off happen
/// under one lock, so a listener racing with resolution is either flushed by
/// the resolver or run by the registrant, never both and never neither.
///
/// Cloning yields another handle to the same cell.
pub struct CompletionHandle<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for CompletionHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for CompletionHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for CompletionHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionHandle")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl<T> CompletionHandle<T> {
    /// Create a pending handle.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Pending(Vec::new())),
                resolved: Condvar::new(),
                notify: Notify::new(),
            }),
        }
    }

    /// Create a handle that is already resolved.
    pub fn resolved(outcome: Result<T>) -> Self {
        let handle = Self::new();
        handle.resolve(outcome);
        handle
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // Listeners never run under the lock, so poisoning cannot leave the
        // state half-updated.
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Transition to resolved and flush registered listeners.
    ///
    /// Returns `false` without side effects if the handle was already
    /// resolved; the first outcome stands.
    pub fn resolve(&self, outcome: Result<T>) -> bool {
        let outcome = Arc::new(outcome);
        let listeners = {
            let mut state = self.lock();
            match &mut *state {
                State::Resolved(_) => {
                    tracing::debug!("Ignoring second resolution of a completion handle");
                    return false;
                }
                State::Pending(listeners) => {
                    let listeners = std::mem::take(listeners);
                    *state = State::Resolved(Arc::clone(&outcome));
                    listeners
                }
            }
        };

        self.inner.resolved.notify_all();
        self.inner.notify.notify_waiters();

        for listener in listeners {
            run_listener(listener, &outcome);
        }
        true
    }

    /// Register a callback for the outcome.
    ///
    /// Runs synchronously on this thread when the handle is already resolved.
    pub fn add_listener<F>(&self, listener: F)
    where
        F: FnOnce(&Result<T>) + Send + 'static,
    {
        let outcome = {
            let mut state = self.lock();
            match &mut *state {
                State::Pending(listeners) => {
                    listeners.push(Box::new(listener));
                    return;
                }
                State::Resolved(outcome) => Arc::clone(outcome),
            }
        };
        run_listener(Box::new(listener), &outcome);
    }

    pub fn is_resolved(&self) -> bool {
        matches!(&*self.lock(), State::Resolved(_))
    }

    fn stored(&self) -> Option<Arc<Result<T>>> {
        match &*self.lock() {
            State::Resolved(outcome) => Some(Arc::clone(outcome)),
            State::Pending(_) => None,
        }
    }
}

/// A panicking listener is logged and does not stop the ones after it.
fn run_listener<T>(listener: Listener<T>, outcome: &Result<T>) {
    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| listener(outcome))) {
        let message = panic
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("non-string panic payload");
        tracing::error!(panic = message, "Completion listener panicked");
    }
}

impl<T: Clone> CompletionHandle<T> {
    /// The outcome, if already resolved.
    pub fn try_outcome(&self) -> Option<Result<T>> {
        self.stored().map(|outcome| (*outcome).clone())
    }

    /// Park the calling thread until the handle resolves.
    ///
    /// Must not be called from a thread of the runtime that performs the
    /// dispatch, or the resolution it waits for may never be scheduled.
    pub fn wait(&self) -> Result<T> {
        let mut state = self.lock();
        loop {
            if let State::Resolved(outcome) = &*state {
                return (**outcome).clone();
            }
            state = self
                .inner
                .resolved
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`wait`](Self::wait), giving up after `timeout`.
    ///
    /// Returns `None` if the handle is still pending when the timeout expires.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let State::Resolved(outcome) = &*state {
                return Some((**outcome).clone());
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            if remaining.is_zero() {
                return None;
            }
            state = self
                .inner
                .resolved
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Wait for the outcome without blocking the thread.
    pub async fn outcome(&self) -> Result<T> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a resolution in between is not lost.
            notified.as_mut().enable();
            if let Some(outcome) = self.try_outcome() {
                return outcome;
            }
            notified.await;
        }
    }
}
