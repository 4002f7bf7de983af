//! Tests using the `loom` testing framework.
//!
//! Run with `RUSTFLAGS="--cfg loom" cargo test --test loom --profile loom`.

#![cfg(loom)]

use baton::BoundedBuffer;
use baton::CancellationToken;
use baton::Halted;
use baton::ThreadPool;
use loom::model::Builder;
use loom::sync::Arc;
use loom::thread;
use tracing::Level;
use tracing::info;
use tracing_subscriber::fmt::Subscriber;

fn model<F>(f: F)
where
    F: Fn() + Send + Sync + 'static,
{
    let subscriber = Subscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .without_time()
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let mut model = Builder::new();
        model.log = true;
        model.check(f);
    });
}

// -----------------------------------------------------------------------------
// Bounded buffer

// A producer hands one item to a consumer.
#[test]
pub fn hand_off() {
    model(|| {
        let buffer = Arc::new(BoundedBuffer::new(1));

        let producer = {
            let buffer = buffer.clone();
            thread::spawn(move || buffer.produce(7, &CancellationToken::new()))
        };

        assert_eq!(buffer.consume(&CancellationToken::new()), Ok(7));
        assert_eq!(producer.join().unwrap(), Ok(()));
        assert_eq!(buffer.stats().peak, 1);
    });
}

// Stopping races with a consumer that may or may not have parked yet. Either
// way the consumer must return.
#[test]
pub fn stop_releases_consumer() {
    model(|| {
        let buffer = Arc::new(BoundedBuffer::<i32>::new(1));

        let consumer = {
            let buffer = buffer.clone();
            thread::spawn(move || buffer.consume(&CancellationToken::new()))
        };

        assert!(buffer.stop_running());
        assert_eq!(consumer.join().unwrap(), Err(Halted::Stopped));
    });
}

// Cancellation races with a producer parking on a full buffer. The waker
// registered with the token must not be lost.
#[test]
pub fn cancel_releases_producer() {
    model(|| {
        let buffer = Arc::new(BoundedBuffer::new(1));
        let token = CancellationToken::new();
        buffer.produce(0, &token).unwrap();

        let producer = {
            let buffer = buffer.clone();
            let token = token.clone();
            thread::spawn(move || buffer.produce(1, &token))
        };

        assert!(token.cancel());
        assert_eq!(producer.join().unwrap(), Err(Halted::Cancelled));
        info!(len = buffer.len(), "producer released");
        assert_eq!(buffer.len(), 1);
    });
}

// The full two-phase shutdown against one producer and one consumer, each
// moving at most two items.
#[test]
pub fn two_phase_shutdown() {
    model(|| {
        let buffer = Arc::new(BoundedBuffer::new(1));
        let producer_token = CancellationToken::new();
        let consumer_token = CancellationToken::new();

        let producer = {
            let buffer = buffer.clone();
            let token = producer_token.clone();
            thread::spawn(move || {
                for item in 0..2 {
                    if buffer.produce(item, &token).is_err() {
                        break;
                    }
                }
            })
        };

        let consumer = {
            let buffer = buffer.clone();
            let token = consumer_token.clone();
            thread::spawn(move || {
                for _ in 0..2 {
                    if buffer.consume(&token).is_err() {
                        break;
                    }
                }
            })
        };

        buffer.stop_running();
        producer_token.cancel();
        consumer_token.cancel();

        producer.join().unwrap();
        consumer.join().unwrap();
    });
}

// -----------------------------------------------------------------------------
// Thread pool

// Spins a single-worker pool up, runs one job on it, and shuts it down.
#[test]
pub fn spawn_and_block() {
    model(|| {
        let pool = ThreadPool::new(1).unwrap();
        let task = pool.spawn(|| 3);
        assert_eq!(baton::block_on(task).unwrap(), 3);
        pool.shutdown();
    });
}
