//! Parallel max-of-max reduction.
//!
//! The input is split into blocks by the caller. Each block is submitted to a
//! worker pool as its own job, the per-block maxima are collected in
//! submission order, and the maxima are reduced sequentially.

use alloc::vec::Vec;

use tracing::debug;
use tracing::trace;

use crate::blocker::block_on;
use crate::blocker::block_on_until;
use crate::cancel::CancellationToken;
use crate::error::Error;
use crate::error::Result;
use crate::thread_pool::ThreadPool;
use crate::unwind;

/// Returns the largest value in `block`, or `i32::MIN` if it is empty.
#[inline]
pub fn max_of(block: &[i32]) -> i32 {
    block.iter().copied().max().unwrap_or(i32::MIN)
}

/// Computes the maximum across all `blocks` on a new pool of `workers`
/// threads, which is shut down before returning.
///
/// Returns `i32::MIN` if there are no blocks; in that case no pool is created,
/// so `workers` is not checked. Otherwise fails with [`Error::NoWorkers`] if
/// `workers` is zero and with [`Error::WorkerPanicked`] if a job panics.
///
/// ```
/// # #![cfg(not(any(loom, feature = "shuttle")))]
/// let blocks = vec![vec![3, 1, 4], vec![1, 5, 9], vec![2, 6]];
/// assert_eq!(baton::reduce_max(blocks, 2).unwrap(), 9);
///
/// let none: Vec<Vec<i32>> = Vec::new();
/// assert_eq!(baton::reduce_max(none, 4).unwrap(), i32::MIN);
/// ```
pub fn reduce_max<I, B>(blocks: I, workers: usize) -> Result<i32>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[i32]> + Send + 'static,
{
    let mut blocks = blocks.into_iter().peekable();
    if blocks.peek().is_none() {
        return Ok(i32::MIN);
    }

    let pool = ThreadPool::new(workers)?;
    let max = reduce_max_on(&pool, blocks);
    pool.shutdown();
    max
}

/// Computes the maximum across all `blocks` on an existing pool.
pub fn reduce_max_on<I, B>(pool: &ThreadPool, blocks: I) -> Result<i32>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[i32]> + Send + 'static,
{
    collect_max(pool, blocks, None)
}

/// Like [`reduce_max_on`], but stops waiting with [`Error::Interrupted`] as
/// soon as `token` is cancelled. Blocks that were not collected yet are
/// cancelled.
pub fn reduce_max_until<I, B>(pool: &ThreadPool, blocks: I, token: &CancellationToken) -> Result<i32>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[i32]> + Send + 'static,
{
    collect_max(pool, blocks, Some(token))
}

fn collect_max<I, B>(pool: &ThreadPool, blocks: I, token: Option<&CancellationToken>) -> Result<i32>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[i32]> + Send + 'static,
{
    // Submit every block before waiting on any of them.
    let tasks: Vec<_> = blocks
        .into_iter()
        .map(|block| pool.spawn(move || max_of(block.as_ref())).fallible())
        .collect();

    debug!(blocks = tasks.len(), workers = pool.size(), "submitted blocks");

    // Dropping the remaining tasks on an early return cancels them.
    let mut maxima = Vec::with_capacity(tasks.len());
    for (index, task) in tasks.into_iter().enumerate() {
        let outcome = match token {
            Some(token) => block_on_until(task, token).ok_or(Error::Interrupted)?,
            None => block_on(task),
        };

        match outcome {
            Some(Ok(max)) => {
                trace!(block = index, max, "block reduced");
                maxima.push(max);
            }
            Some(Err(payload)) => {
                return Err(Error::WorkerPanicked {
                    block: index,
                    message: unwind::into_message(payload),
                });
            }
            None => return Err(Error::PoolShutdown),
        }
    }

    Ok(max_of(&maxima))
}
