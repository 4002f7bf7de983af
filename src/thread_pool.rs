//! This module contains the api and worker logic for the fixed-size worker
//! pool used by the reducer.

use alloc::collections::VecDeque;
use alloc::format;
use alloc::vec::Vec;
use core::fmt;
use core::future::Future;
use core::ops::DerefMut;
use std::sync::PoisonError;
use std::thread::Result as ThreadResult;

use async_task::Runnable;
use async_task::Task;
use tracing::debug;
use tracing::trace;
use tracing::trace_span;
use tracing::warn;

use crate::error::Error;
use crate::error::Result;
use crate::platform::*;
use crate::unwind;

// -----------------------------------------------------------------------------
// Thread pool types

/// A fixed-size pool of worker threads.
///
/// Work is submitted with [`ThreadPool::spawn`] or [`ThreadPool::spawn_future`],
/// each of which returns a [`Task`] handle. A task is a future resolving to the
/// job's output; block on it with [`crate::block_on`] to collect the result.
///
/// ```
/// # #![cfg(not(any(loom, feature = "shuttle")))]
/// use baton::ThreadPool;
///
/// let pool = ThreadPool::new(2).unwrap();
/// let task = pool.spawn(|| 6 * 7);
/// assert_eq!(baton::block_on(task).unwrap(), 42);
/// pool.shutdown();
/// ```
///
/// # Shutting down
///
/// The pool stops its threads when it is shut down or dropped. Running jobs
/// are allowed to finish; jobs still waiting in the queue are discarded, which
/// cancels their tasks. Use [`Task::fallible`] to observe that as `None`
/// instead of a panic.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<ManagedWorker>,
}

/// State shared between the pool handle, its workers and its task schedules.
struct Shared {
    state: Mutex<ThreadPoolState>,
    job_is_ready: Condvar,
}

struct ThreadPoolState {
    /// Jobs waiting for a worker, oldest first.
    queue: VecDeque<Runnable>,
    /// Set at shutdown. Jobs scheduled after this are dropped.
    closed: bool,
}

/// Represents a worker thread that is managed by the pool.
struct ManagedWorker {
    /// The index of this worker within the pool.
    index: usize,
    /// Controls used to manage the lifecycle of the worker.
    control: ThreadControl,
}

/// Used to manage the lifecycle of a thread.
struct ThreadControl {
    /// Tells the thread to shut down when set to true.
    halt: Arc<AtomicBool>,
    /// The handle used to wait for the thread to complete.
    handle: JoinHandle<()>,
}

// -----------------------------------------------------------------------------
// Thread pool creation and shutdown

impl ThreadPool {
    /// Creates a pool and starts `size` worker threads.
    ///
    /// Returns [`Error::NoWorkers`] if `size` is zero, and [`Error::Spawn`] if
    /// a thread could not be started (any threads already started are halted
    /// again).
    pub fn new(size: usize) -> Result<ThreadPool> {
        if size == 0 {
            return Err(Error::NoWorkers);
        }

        debug!(size, "starting worker pool");

        let mut thread_pool = ThreadPool {
            shared: Arc::new(Shared {
                state: Mutex::new(ThreadPoolState {
                    queue: VecDeque::new(),
                    closed: false,
                }),
                job_is_ready: Condvar::new(),
            }),
            workers: Vec::with_capacity(size),
        };

        for index in 0..size {
            let halt = Arc::new(AtomicBool::new(false));
            let worker_halt = halt.clone();
            let worker_shared = thread_pool.shared.clone();
            trace!(index, "spawning managed worker");
            let handle = ThreadBuilder::new()
                .name(format!("worker {index}"))
                .spawn(move || managed_worker(index, &worker_shared, &worker_halt))
                .map_err(Error::Spawn)?;
            let control = ThreadControl { halt, handle };
            thread_pool.workers.push(ManagedWorker { index, control });
        }

        Ok(thread_pool)
    }

    /// Returns the number of worker threads.
    #[inline]
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Halts every worker and waits for them to exit. Equivalent to dropping
    /// the pool.
    pub fn shutdown(self) {
        drop(self);
    }

    fn halt(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        debug!(size = self.workers.len(), "shutting down worker pool");

        {
            let mut state = self.lock_state();
            state.closed = true;
            for worker in &self.workers {
                worker.control.halt.store(true, Ordering::Relaxed);
            }
            // Wake any sleeping workers to ensure they see the halt.
            self.shared.job_is_ready.notify_all();
        }

        for worker in self.workers.drain(..) {
            if worker.control.handle.join().is_err() {
                warn!(index = worker.index, "worker thread panicked");
            }
        }

        // Dropping a runnable cancels its task. That can run arbitrary drop
        // code, so it happens outside the lock.
        let abandoned = core::mem::take(&mut self.lock_state().queue);
        if !abandoned.is_empty() {
            debug!(abandoned = abandoned.len(), "discarding queued jobs");
        }
        drop(abandoned);

        debug!("worker pool halted");
    }

    fn lock_state(&self) -> impl DerefMut<Target = ThreadPoolState> + '_ {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.halt();
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// Thread pool scheduling api

impl ThreadPool {
    /// Spawns a future onto the pool and returns a task handle for its output.
    ///
    /// Dropping the task cancels the future. Call [`Task::detach`] to let it
    /// run to completion unobserved.
    pub fn spawn_future<F, T>(&self, future: F) -> Task<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let shared = self.shared.clone();

        // This function "schedules" the future, which here means pushing its
        // runnable onto the shared queue and waking one worker to run it.
        let schedule = move |runnable: Runnable| {
            let mut state = shared.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.closed {
                drop(state);
                trace!("dropping job scheduled after shutdown");
                drop(runnable);
                return;
            }
            state.queue.push_back(runnable);
            shared.job_is_ready.notify_one();
        };

        // Creates a task from the future and schedule.
        let (runnable, task) = async_task::spawn(future, schedule);

        // Calls the schedule function for the first time, queueing the future.
        runnable.schedule();

        task
    }

    /// Spawns a closure onto the pool. A panic inside the closure is captured
    /// and returned through the task as an `Err` holding the panic payload.
    pub fn spawn<F, T>(&self, f: F) -> Task<ThreadResult<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.spawn_future(async move { unwind::halt_unwinding(f) })
    }
}

// -----------------------------------------------------------------------------
// Main worker loop

/// This is the main loop for a worker thread. Workers take jobs from the
/// shared queue in the order they were scheduled, and sleep on the condition
/// variable while the queue is empty.
fn managed_worker(index: usize, shared: &Shared, halt: &AtomicBool) {
    let span = trace_span!("worker", index);
    let _enter = span.enter();

    trace!("starting managed worker");

    let mut state = shared.state.lock().unwrap_or_else(PoisonError::into_inner);

    while !halt.load(Ordering::Relaxed) {
        match state.queue.pop_front() {
            Some(runnable) => {
                drop(state);
                // Poll the task. This drops the future if it completes.
                runnable.run();
                state = shared.state.lock().unwrap_or_else(PoisonError::into_inner);
            }
            None => {
                state = shared
                    .job_is_ready
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }
    }

    trace!("exiting managed worker");
}
