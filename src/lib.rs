//! Two small parallel-programming patterns, built the way a thread pool is.
//!
//! Baton contains a fixed-size worker pool with a parallel max-of-max
//! reduction on top of it, and a bounded producer/consumer pipeline with a
//! two-phase cooperative shutdown. Both are small enough to read in one
//! sitting, but are written against the same primitives a production pool
//! would use: a mutex and condition variables for shared state, futex-backed
//! blockers for parking, wakers for cross-thread notification and an explicit
//! [`CancellationToken`] for cooperative cancellation.
//!
//! # Reduction
//!
//! ```
//! # #![cfg(not(any(loom, feature = "shuttle")))]
//! let blocks = vec![vec![3, 1, 4], vec![1, 5, 9], vec![2, 6]];
//! assert_eq!(baton::reduce_max(blocks, 2).unwrap(), 9);
//! ```
//!
//! # Pipeline
//!
//! ```
//! # #![cfg(not(any(loom, feature = "shuttle")))]
//! use core::time::Duration;
//! use baton::{CancellationToken, PipelineConfig};
//!
//! let config = PipelineConfig::default().with_run_for(Duration::from_millis(50));
//! let report = baton::pipeline::run(&config, &CancellationToken::new()).unwrap();
//! assert_eq!(report.failed_tasks, 0);
//! ```
//!
//! # Shutdown
//!
//! The pipeline stops in two phases. First the buffer's running flag is
//! cleared, which every task checks on every iteration and around every
//! blocking wait. Then each task's own token is cancelled, which wakes any task
//! parked inside the buffer. The flag alone is not enough (a task may have
//! parked just before it flipped) and the token is the backstop.

#![no_std]
#![cfg_attr(any(loom, feature = "shuttle"), allow(dead_code))]

// -----------------------------------------------------------------------------
// Boilerplate for building without the standard library

extern crate alloc;
extern crate std;

// -----------------------------------------------------------------------------
// Modules

mod blocker;
mod cancel;
mod compile_fail;
mod error;
mod source;
mod unwind;

pub mod buffer;
pub mod config;
pub mod pipeline;
pub mod reduce;
pub mod thread_pool;

// -----------------------------------------------------------------------------
// Top-level exports

pub use blocker::block_on;
pub use blocker::block_on_until;
pub use buffer::BoundedBuffer;
pub use buffer::BufferStats;
pub use cancel::CancellationToken;
pub use cancel::Registration;
pub use config::PipelineConfig;
pub use error::Error;
pub use error::Halted;
pub use error::Result;
pub use pipeline::Pipeline;
pub use pipeline::PipelineReport;
pub use reduce::max_of;
pub use reduce::reduce_max;
pub use reduce::reduce_max_on;
pub use reduce::reduce_max_until;
pub use source::ItemSource;
pub use thread_pool::ThreadPool;

/// The item type moved through the pipeline.
pub type Item = i32;

// -----------------------------------------------------------------------------
// Platform Support

// This crate is tested with `shuttle` and `loom`, which both require mocking
// the core threading primitives (`Mutex` and the like).
//
// To make things a bit simpler, we re-export all the important types in the
// `platform` module. Types that have to interoperate with `core::task::Waker`
// use `alloc::sync::Arc` directly, since wakers can only be built from it.

#[cfg(not(any(loom, feature = "shuttle")))]
mod platform {

    // Core exports

    pub use alloc::sync::Arc;
    pub use core::sync::atomic::AtomicBool;
    pub use core::sync::atomic::AtomicU32;
    pub use core::sync::atomic::Ordering;
    pub use std::sync::Condvar;
    pub use std::sync::Mutex;
    pub use std::sync::MutexGuard;
    pub use std::thread::Builder as ThreadBuilder;
    pub use std::thread::JoinHandle;

    // Timed waits

    pub fn condvar_wait_timeout<'a, T>(
        condvar: &Condvar,
        guard: MutexGuard<'a, T>,
        timeout: core::time::Duration,
    ) -> MutexGuard<'a, T> {
        condvar
            .wait_timeout(guard, timeout)
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .0
    }

    // Futex operations

    #[inline]
    pub fn futex_wait(atomic: &AtomicU32, expected: u32) {
        atomic_wait::wait(atomic, expected);
    }

    #[inline]
    pub fn futex_wake_all(atomic: &AtomicU32) {
        atomic_wait::wake_all(atomic);
    }
}

#[cfg(all(feature = "shuttle", not(loom)))]
mod platform {

    // Core exports

    pub use shuttle::sync::Arc;
    pub use shuttle::sync::Condvar;
    pub use shuttle::sync::Mutex;
    pub use shuttle::sync::MutexGuard;
    pub use shuttle::sync::atomic::AtomicBool;
    pub use shuttle::sync::atomic::AtomicU32;
    pub use shuttle::sync::atomic::Ordering;
    pub use shuttle::thread::Builder as ThreadBuilder;
    pub use shuttle::thread::JoinHandle;

    // Timed waits

    pub fn condvar_wait_timeout<'a, T>(
        condvar: &Condvar,
        guard: MutexGuard<'a, T>,
        timeout: core::time::Duration,
    ) -> MutexGuard<'a, T> {
        condvar
            .wait_timeout(guard, timeout)
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .0
    }

    // Futex operations
    //
    // Shuttle cannot see into the kernel, so waiting is modeled as yielding
    // until the value changes.

    pub fn futex_wait(atomic: &AtomicU32, expected: u32) {
        while atomic.load(Ordering::Acquire) == expected {
            shuttle::thread::yield_now();
        }
    }

    pub fn futex_wake_all(_atomic: &AtomicU32) {}
}

#[cfg(loom)]
mod platform {

    // Core exports

    pub use loom::sync::Arc;
    pub use loom::sync::Condvar;
    pub use loom::sync::Mutex;
    pub use loom::sync::MutexGuard;
    pub use loom::sync::atomic::AtomicBool;
    pub use loom::sync::atomic::AtomicU32;
    pub use loom::sync::atomic::Ordering;
    pub use loom::thread::Builder as ThreadBuilder;
    pub use loom::thread::JoinHandle;

    // Timed waits
    //
    // Loom has no clock, so a timed wait is modeled as a wait that only ends
    // with a notification (or spuriously).

    pub fn condvar_wait_timeout<'a, T>(
        condvar: &Condvar,
        guard: MutexGuard<'a, T>,
        _timeout: core::time::Duration,
    ) -> MutexGuard<'a, T> {
        condvar
            .wait(guard)
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    // Futex operations

    pub fn futex_wait(atomic: &AtomicU32, expected: u32) {
        while atomic.load(Ordering::Acquire) == expected {
            loom::thread::yield_now();
        }
    }

    pub fn futex_wake_all(_atomic: &AtomicU32) {}
}
