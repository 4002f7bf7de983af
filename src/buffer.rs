//! A bounded FIFO buffer for handing items from producers to consumers.
//!
//! All of the buffer's mutable state (the queued items, the running flag and
//! the statistics) is guarded by one mutex. Producers park on `not_full` and
//! consumers park on `not_empty`. A parked task can be released three ways:
//! the condition it waits for becomes true, the buffer stops running, or the
//! task's own [`CancellationToken`] is cancelled.

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::task::Wake;
use core::fmt;
use core::task::Waker;
use std::sync::PoisonError;

use tracing::debug;
use tracing::trace;

use crate::cancel::CancellationToken;
use crate::error::Error;
use crate::error::Halted;
use crate::platform::AtomicBool;
use crate::platform::Condvar;
use crate::platform::Mutex;
use crate::platform::MutexGuard;
use crate::platform::Ordering;

// -----------------------------------------------------------------------------
// Bounded buffer

/// A fixed-capacity FIFO queue shared between producer and consumer tasks.
///
/// The buffer starts out running. Once [`BoundedBuffer::stop_running`] has
/// been called it never runs again, and every blocking operation returns
/// [`Halted::Stopped`] instead of waiting.
///
/// ```
/// # #![cfg(not(any(loom, feature = "shuttle")))]
/// use baton::{BoundedBuffer, CancellationToken, Halted};
///
/// let buffer = BoundedBuffer::new(2);
/// let token = CancellationToken::new();
///
/// buffer.produce(1, &token).unwrap();
/// buffer.produce(2, &token).unwrap();
/// assert!(buffer.is_full());
/// assert_eq!(buffer.consume(&token), Ok(1));
///
/// buffer.stop_running();
/// assert_eq!(buffer.produce(3, &token), Err(Halted::Stopped));
/// ```
pub struct BoundedBuffer<T> {
    shared: Arc<Shared<T>>,
    /// Wakes every task parked on this buffer. Registered with a task's token
    /// while the task is parked.
    waker: Waker,
}

struct Shared<T> {
    capacity: usize,
    /// Only written while holding `state`, so it never disagrees with what a
    /// task holding the lock observes.
    running: AtomicBool,
    state: Mutex<State<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

struct State<T> {
    items: VecDeque<T>,
    stats: BufferStats,
}

/// Counters describing the traffic through a buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Items accepted by `produce`.
    pub produced: u64,
    /// Items returned by `consume`.
    pub consumed: u64,
    /// The largest number of items held at once.
    pub peak: usize,
}

impl<T: Send + 'static> BoundedBuffer<T> {
    /// Creates a running buffer holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. See [`BoundedBuffer::try_new`].
    pub fn new(capacity: usize) -> BoundedBuffer<T> {
        match BoundedBuffer::try_new(capacity) {
            Ok(buffer) => buffer,
            Err(err) => panic!("{err}"),
        }
    }

    /// Creates a running buffer holding at most `capacity` items, or returns
    /// [`Error::InvalidConfig`] if `capacity` is zero.
    pub fn try_new(capacity: usize) -> Result<BoundedBuffer<T>, Error> {
        if capacity == 0 {
            return Err(Error::InvalidConfig("buffer capacity must be at least one"));
        }

        let shared = Arc::new(Shared {
            capacity,
            running: AtomicBool::new(true),
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity),
                stats: BufferStats::default(),
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        });
        let waker = Waker::from(shared.clone());

        Ok(BoundedBuffer { shared, waker })
    }
}

impl<T> BoundedBuffer<T> {
    /// Inserts `item` at the back of the buffer.
    ///
    /// Blocks while the buffer is full. Returns [`Halted::Stopped`] if the
    /// buffer stops running and [`Halted::Cancelled`] if `token` is cancelled,
    /// either before the call or while waiting. On success one waiting
    /// consumer is woken.
    pub fn produce(&self, item: T, token: &CancellationToken) -> Result<(), Halted> {
        let mut state = self.lock();

        loop {
            if let Err(halted) = self.check(token) {
                // We may have absorbed a wake-up meant for another producer.
                if state.items.len() < self.shared.capacity {
                    self.shared.not_full.notify_one();
                }
                return Err(halted);
            }

            if state.items.len() < self.shared.capacity {
                break;
            }

            let Some(_registration) = token.register(&self.waker) else {
                return Err(Halted::Cancelled);
            };
            trace!("buffer full, producer waiting");
            state = self
                .shared
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        state.items.push_back(item);
        state.stats.produced += 1;
        state.stats.peak = state.stats.peak.max(state.items.len());
        self.shared.not_empty.notify_one();

        Ok(())
    }

    /// Removes and returns the item at the front of the buffer.
    ///
    /// Blocks while the buffer is empty. Returns [`Halted::Stopped`] if the
    /// buffer stops running and [`Halted::Cancelled`] if `token` is cancelled,
    /// either before the call or while waiting. On success one waiting
    /// producer is woken.
    pub fn consume(&self, token: &CancellationToken) -> Result<T, Halted> {
        let mut state = self.lock();

        loop {
            if let Err(halted) = self.check(token) {
                // We may have absorbed a wake-up meant for another consumer.
                if !state.items.is_empty() {
                    self.shared.not_empty.notify_one();
                }
                return Err(halted);
            }

            if let Some(item) = state.items.pop_front() {
                state.stats.consumed += 1;
                self.shared.not_full.notify_one();
                return Ok(item);
            }

            let Some(_registration) = token.register(&self.waker) else {
                return Err(Halted::Cancelled);
            };
            trace!("buffer empty, consumer waiting");
            state = self
                .shared
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Returns true until [`BoundedBuffer::stop_running`] is called. Never
    /// blocks.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Stops the buffer and releases every task parked on it.
    ///
    /// Only the first call has an effect; it returns true; later or concurrent
    /// calls return false.
    pub fn stop_running(&self) -> bool {
        let _state = self.lock();

        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return false;
        }

        self.shared.not_full.notify_all();
        self.shared.not_empty.notify_all();

        debug!("buffer stopped running");
        true
    }

    /// Returns the maximum number of items the buffer holds.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Returns the number of items currently held.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Returns true if the buffer holds no items.
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Returns true if the buffer holds `capacity` items.
    pub fn is_full(&self) -> bool {
        self.lock().items.len() == self.shared.capacity
    }

    /// Returns a snapshot of the buffer's counters.
    pub fn stats(&self) -> BufferStats {
        self.lock().stats
    }

    /// Checks the running flag and the token. Must be called with the lock
    /// held.
    #[inline]
    fn check(&self, token: &CancellationToken) -> Result<(), Halted> {
        if !self.is_running() {
            Err(Halted::Stopped)
        } else if token.is_cancelled() {
            Err(Halted::Cancelled)
        } else {
            Ok(())
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> fmt::Debug for BoundedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("BoundedBuffer")
            .field("capacity", &self.shared.capacity)
            .field("len", &state.items.len())
            .field("running", &self.is_running())
            .field("stats", &state.stats)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Cancellation wake-ups

impl<T: Send> Wake for Shared<T> {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        // Taking the lock orders this notification after any task that checked
        // its token under the lock has started waiting.
        let _state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }
}
