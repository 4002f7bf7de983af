//! Tests specifically for miri

#![cfg(miri)]

use baton::BoundedBuffer;
use baton::CancellationToken;
use baton::ThreadPool;
use tracing::info;

#[test]
fn reduce_max() {
    let blocks = vec![vec![3, 1, 4], vec![1, 5, 9], vec![2, 6]];
    let max = baton::reduce_max(blocks, 2).unwrap();
    info!(max, "reduced");
    assert_eq!(max, 9);
}

#[test]
fn pool_panic_is_captured() {
    let pool = ThreadPool::new(1).unwrap();
    let task = pool.spawn(|| -> u8 { panic!("captured") });
    assert!(baton::block_on(task).is_err());
    pool.shutdown();
}

#[test]
fn buffer_hand_off() {
    let buffer = std::sync::Arc::new(BoundedBuffer::new(2));
    let token = CancellationToken::new();

    let producer = {
        let buffer = buffer.clone();
        std::thread::spawn(move || {
            let token = CancellationToken::new();
            for item in 0..8 {
                buffer.produce(item, &token).unwrap();
            }
        })
    };

    let drained: Vec<i32> = (0..8).map(|_| buffer.consume(&token).unwrap()).collect();
    producer.join().unwrap();

    assert_eq!(drained, (0..8).collect::<Vec<_>>());
    buffer.stop_running();
}
