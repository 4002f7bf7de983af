//! Async blocking utilities.

use alloc::sync::Arc;
use alloc::task::Wake;
use core::future::Future;
use core::pin::pin;
use core::task::Context;
use core::task::Poll;
use core::task::Waker;

use crate::cancel::CancellationToken;
use crate::platform::*;

// -----------------------------------------------------------------------------
// States

/// The blocker is not sleeping, and has not been woken.
const IDLE: u32 = 0;

/// The blocker is sleeping or is about to go to sleep.
const WAIT: u32 = 1;

/// The blocker has been woken at least once since the last time it slept.
const WAKE: u32 = 2;

// -----------------------------------------------------------------------------
// Blocker

/// A blocker lets you block a thread on the progress of a future. It is its
/// own waker: waking it releases the thread sleeping in [`Blocker::block`].
pub struct Blocker {
    /// The state of a blocker.
    state: AtomicU32,
}

impl Blocker {
    /// Creates a new blocker.
    pub fn new() -> Blocker {
        Blocker {
            state: AtomicU32::new(IDLE),
        }
    }

    /// Blocks the thread until the blocker is woken. Returns immediately if it
    /// was woken since the last call.
    #[inline]
    pub fn block(&self) {
        if self
            .state
            .compare_exchange(IDLE, WAIT, Ordering::Acquire, Ordering::Acquire)
            .is_ok()
        {
            // Loop to mitigate spurious wake-ups.
            while self.state.load(Ordering::Acquire) == WAIT {
                futex_wait(&self.state, WAIT);
            }
        }
        self.state.store(IDLE, Ordering::Release);
    }
}

impl Default for Blocker {
    fn default() -> Blocker {
        Blocker::new()
    }
}

impl Wake for Blocker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        if self.state.swap(WAKE, Ordering::Release) == WAIT {
            futex_wake_all(&self.state);
        }
    }
}

// -----------------------------------------------------------------------------
// Blocking on futures

/// Blocks the calling thread until the future completes, then returns the
/// output. The thread sleeps whenever the future is pending.
pub fn block_on<F>(future: F) -> F::Output
where
    F: Future,
{
    let blocker = Arc::new(Blocker::new());
    let waker = Waker::from(blocker.clone());
    let mut ctx = Context::from_waker(&waker);
    let mut future = pin!(future);

    loop {
        match future.as_mut().poll(&mut ctx) {
            Poll::Ready(res) => return res,
            Poll::Pending => blocker.block(),
        }
    }
}

/// Like [`block_on`], but gives up as soon as `token` is cancelled. Returns
/// `None` if the token was cancelled before the future completed.
///
/// The future is polled at least once, so an already-completed future yields
/// its output even if the token is cancelled.
pub fn block_on_until<F>(future: F, token: &CancellationToken) -> Option<F::Output>
where
    F: Future,
{
    let blocker = Arc::new(Blocker::new());
    let waker = Waker::from(blocker.clone());
    let mut ctx = Context::from_waker(&waker);
    let mut future = pin!(future);

    loop {
        if let Poll::Ready(res) = future.as_mut().poll(&mut ctx) {
            return Some(res);
        }

        // The same blocker is woken by the future or by cancellation,
        // whichever comes first.
        let _registration = token.register(&waker)?;
        blocker.block();
    }
}
