//! Tests using the Shuttle testing framework.
//!
//! Run with `cargo test --test shuttle --features shuttle`. Shuttle reports a
//! deadlock if some schedule leaves a thread parked forever, so most of these
//! tests only need to stop the buffer and join everything.

#![cfg(feature = "shuttle")]

use baton::BoundedBuffer;
use baton::CancellationToken;
use baton::Halted;
use baton::ThreadPool;
use shuttle::sync::Arc;
use shuttle::thread;
use tracing::Level;
use tracing_subscriber::fmt::Subscriber;

// -----------------------------------------------------------------------------
// Infrastructure

#[allow(dead_code)]
fn trace<F>(f: F)
where
    F: Fn() + Send + Sync + 'static,
{
    let subscriber = Subscriber::builder()
        .compact()
        .with_max_level(Level::TRACE)
        .without_time()
        .with_thread_names(false)
        .finish();

    tracing::subscriber::with_default(subscriber, f);
}

// -----------------------------------------------------------------------------
// Bounded buffer

/// Items each task moves at most. Unbounded loops would let an unfair
/// schedule starve the thread that stops the buffer.
const ROUNDS: u32 = 3;

/// Two producers and a consumer race against a two-phase shutdown.
fn producers_and_consumer_then_shutdown() {
    let buffer = Arc::new(BoundedBuffer::new(1));
    let mut tasks = Vec::new();

    for producer in 0..2 {
        let buffer = buffer.clone();
        let token = CancellationToken::new();
        let task_token = token.clone();
        let handle = thread::spawn(move || {
            let mut produced = 0;
            while produced < ROUNDS && buffer.is_running() && !task_token.is_cancelled() {
                if buffer.produce(producer, &task_token).is_err() {
                    break;
                }
                produced += 1;
            }
            produced
        });
        tasks.push((token, handle));
    }

    {
        let buffer = buffer.clone();
        let token = CancellationToken::new();
        let task_token = token.clone();
        let handle = thread::spawn(move || {
            let mut consumed = 0;
            while consumed < ROUNDS && buffer.is_running() && !task_token.is_cancelled() {
                if buffer.consume(&task_token).is_err() {
                    break;
                }
                consumed += 1;
            }
            consumed
        });
        tasks.push((token, handle));
    }

    thread::yield_now();
    assert!(buffer.stop_running());
    for (token, _) in &tasks {
        token.cancel();
    }

    for (_, handle) in tasks {
        handle.join().unwrap();
    }

    let stats = buffer.stats();
    assert!(stats.peak <= 1);
    assert!(stats.consumed <= stats.produced);
    assert!(stats.produced - stats.consumed <= 1);
}

#[test]
pub fn shutdown_random() {
    shuttle::check_random(producers_and_consumer_then_shutdown, 1_000);
}

#[test]
pub fn shutdown_pct() {
    shuttle::check_pct(producers_and_consumer_then_shutdown, 1_000, 3);
}

/// Stopping the buffer alone must release a consumer parked on it.
#[test]
pub fn stop_releases_consumer() {
    shuttle::check_random(
        || {
            let buffer = Arc::new(BoundedBuffer::<i32>::new(1));
            let consumer = {
                let buffer = buffer.clone();
                thread::spawn(move || buffer.consume(&CancellationToken::new()))
            };

            buffer.stop_running();
            assert_eq!(consumer.join().unwrap(), Err(Halted::Stopped));
        },
        1_000,
    );
}

/// Cancelling a token alone must release a producer parked on a full buffer.
#[test]
pub fn cancel_releases_producer() {
    shuttle::check_pct(
        || {
            let buffer = Arc::new(BoundedBuffer::new(1));
            let token = CancellationToken::new();
            buffer.produce(0, &token).unwrap();

            let producer = {
                let buffer = buffer.clone();
                let token = token.clone();
                thread::spawn(move || buffer.produce(1, &token))
            };

            token.cancel();
            assert_eq!(producer.join().unwrap(), Err(Halted::Cancelled));
            assert!(buffer.is_running());
        },
        1_000,
        3,
    );
}

/// Concurrent stops agree on a single winner.
#[test]
pub fn stop_once() {
    shuttle::check_random(
        || {
            let buffer = Arc::new(BoundedBuffer::<i32>::new(1));
            let other = {
                let buffer = buffer.clone();
                thread::spawn(move || buffer.stop_running())
            };
            let ours = buffer.stop_running();
            let theirs = other.join().unwrap();
            assert!(ours ^ theirs);
        },
        1_000,
    );
}

// -----------------------------------------------------------------------------
// Thread pool

/// Spins up a pool, reduces a few blocks on it and shuts it down.
#[test]
pub fn reduce_on_pool() {
    shuttle::check_random(
        || {
            let pool = ThreadPool::new(2).unwrap();
            let max = baton::reduce_max_on(&pool, vec![vec![3, 1], vec![4], vec![1, 5]]).unwrap();
            assert_eq!(max, 5);
            pool.shutdown();
        },
        200,
    );
}

/// Shutting down a pool with jobs still queued must not hang.
#[test]
pub fn shutdown_with_queued_jobs() {
    shuttle::check_random(
        || {
            let pool = ThreadPool::new(1).unwrap();
            let tasks: Vec<_> = (0..3).map(|n| pool.spawn(move || n).fallible()).collect();
            pool.shutdown();
            for task in tasks {
                // Each job either ran or was cancelled.
                if let Some(result) = baton::block_on(task) {
                    assert!(result.is_ok());
                }
            }
        },
        200,
    );
}
