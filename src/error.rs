//! Error types.

use alloc::string::String;

/// A specialized result type for baton operations.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors produced by the worker pool, the reducer and the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A worker pool was requested with zero threads.
    #[error("a worker pool needs at least one thread")]
    NoWorkers,
    /// A configuration value was out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// The job computing the block at index `block` panicked.
    #[error("worker panicked while reducing block {block}: {message}")]
    WorkerPanicked {
        /// Submission index of the failed block.
        block: usize,
        /// The panic payload, if it was a string.
        message: String,
    },
    /// The caller was cancelled while waiting for results.
    #[error("interrupted while waiting for worker results")]
    Interrupted,
    /// A job was discarded before it ran, because its pool shut down.
    #[error("the worker pool shut down before the job completed")]
    PoolShutdown,
    /// The operating system refused to start a thread.
    #[error("failed to spawn thread")]
    Spawn(#[source] std::io::Error),
}

/// Why a [`BoundedBuffer`](crate::BoundedBuffer) operation returned without
/// moving an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Halted {
    /// The buffer's running flag has been cleared.
    #[error("buffer is no longer running")]
    Stopped,
    /// The calling task's cancellation token was cancelled.
    #[error("task was cancelled")]
    Cancelled,
}
