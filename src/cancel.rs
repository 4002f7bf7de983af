//! Cooperative cancellation tokens.
//!
//! A token is a monotonic "cancelled" flag shared between the party that
//! cancels and the tasks that should stop. Polling the flag is enough for a
//! task that is running, but a task parked on a condition variable or a futex
//! cannot poll. Such a task registers a [`Waker`] with the token before it
//! parks, and cancelling the token wakes every registered waker.

use alloc::collections::BTreeMap;
use core::fmt;
use core::task::Waker;
use core::time::Duration;
use std::sync::PoisonError;
use std::time::Instant;

use tracing::debug;

use crate::platform::*;

// -----------------------------------------------------------------------------
// Cancellation token

/// A cloneable handle to a shared cancellation flag.
///
/// Cancellation is a one-way transition. Once a token is cancelled it stays
/// cancelled, and every clone observes it.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

struct Inner {
    /// Set once, while holding the `wakers` lock. Read without the lock.
    cancelled: AtomicBool,
    /// Wakers to call on cancellation, keyed by registration.
    wakers: Mutex<Wakers>,
    /// Notified on cancellation, for threads in [`CancellationToken::wait_timeout`].
    cancelled_cond: Condvar,
}

struct Wakers {
    next_key: u64,
    registered: BTreeMap<u64, Waker>,
}

impl CancellationToken {
    /// Creates a new token that has not been cancelled.
    pub fn new() -> CancellationToken {
        CancellationToken {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                wakers: Mutex::new(Wakers {
                    next_key: 0,
                    registered: BTreeMap::new(),
                }),
                cancelled_cond: Condvar::new(),
            }),
        }
    }

    /// Returns true if the token has been cancelled. Never blocks.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Cancels the token and wakes everything registered on it.
    ///
    /// Returns true if this call performed the cancellation, and false if the
    /// token was already cancelled.
    pub fn cancel(&self) -> bool {
        let wakers = {
            let mut wakers = self
                .inner
                .wakers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if self.inner.cancelled.swap(true, Ordering::AcqRel) {
                return false;
            }
            self.inner.cancelled_cond.notify_all();
            core::mem::take(&mut wakers.registered)
        };

        debug!(wakers = wakers.len(), "cancelled token");

        // Wakers may take other locks, so they are called after ours is released.
        for waker in wakers.into_values() {
            waker.wake();
        }

        true
    }

    /// Registers a waker to be woken when the token is cancelled. The waker is
    /// removed again when the returned [`Registration`] is dropped.
    ///
    /// Returns `None` if the token is already cancelled. In that case the waker
    /// will never be called, and the caller must not park.
    pub fn register(&self, waker: &Waker) -> Option<Registration<'_>> {
        let mut wakers = self
            .inner
            .wakers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.inner.cancelled.load(Ordering::Acquire) {
            return None;
        }

        let key = wakers.next_key;
        wakers.next_key += 1;
        wakers.registered.insert(key, waker.clone());

        Some(Registration { token: self, key })
    }

    /// Blocks the calling thread until the token is cancelled or `timeout`
    /// elapses. Returns true if the token was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);

        let mut wakers = self
            .inner
            .wakers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        loop {
            if self.is_cancelled() {
                return true;
            }

            wakers = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return false;
                    }
                    condvar_wait_timeout(&self.inner.cancelled_cond, wakers, remaining)
                }
                // The deadline is beyond what `Instant` can represent.
                None => self
                    .inner
                    .cancelled_cond
                    .wait(wakers)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    /// Returns the number of wakers currently registered.
    pub fn registered(&self) -> usize {
        self.inner
            .wakers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .registered
            .len()
    }
}

impl Default for CancellationToken {
    fn default() -> CancellationToken {
        CancellationToken::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// Registration

/// Keeps a waker registered on a [`CancellationToken`]. Dropping the
/// registration unregisters the waker.
#[must_use = "the waker is unregistered as soon as the registration is dropped"]
pub struct Registration<'a> {
    token: &'a CancellationToken,
    key: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.token
            .inner
            .wakers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .registered
            .remove(&self.key);
    }
}

#[cfg(all(test, not(any(loom, feature = "shuttle"))))]
mod tests {
    use alloc::sync::Arc;
    use alloc::task::Wake;
    use core::sync::atomic::AtomicUsize;
    use core::sync::atomic::Ordering;
    use core::task::Waker;

    use super::CancellationToken;

    struct CountingWaker(AtomicUsize);

    impl Wake for CountingWaker {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn cancel_wakes_registered_wakers_once() {
        let token = CancellationToken::new();
        let counter = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let waker = Waker::from(counter.clone());

        let registration = token.register(&waker).unwrap();
        assert_eq!(token.registered(), 1);

        assert!(token.cancel());
        assert!(!token.cancel());
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        drop(registration);
        assert_eq!(token.registered(), 0);
    }

    #[test]
    fn dropped_registration_is_not_woken() {
        let token = CancellationToken::new();
        let counter = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let waker = Waker::from(counter.clone());

        drop(token.register(&waker).unwrap());
        token.cancel();

        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn register_after_cancel_is_refused() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(token.register(Waker::noop()).is_none());
    }
}
