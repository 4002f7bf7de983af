//! A benchmark for the max-of-max reduction.

use std::sync::Arc;

use baton::ItemSource;
use baton::ThreadPool;
use divan::Bencher;
use rayon::prelude::*;

// -----------------------------------------------------------------------------
// Workload

const BLOCK_LEN: usize = 4_096;

// Numbers of blocks to reduce. The total number of items is this times
// `BLOCK_LEN`.
const BLOCKS: &[usize] = &[4, 64, 1_024];

fn blocks(count: usize) -> Vec<Arc<[i32]>> {
    let mut source = ItemSource::from_seed(count as u64);
    (0..count)
        .map(|_| source.by_ref().take(BLOCK_LEN).collect())
        .collect()
}

fn expected(blocks: &[Arc<[i32]>]) -> i32 {
    blocks.iter().map(|block| baton::max_of(block)).max().unwrap_or(i32::MIN)
}

fn workers() -> usize {
    std::thread::available_parallelism().map_or(4, usize::from)
}

// -----------------------------------------------------------------------------
// Benchmark

#[divan::bench(args = BLOCKS)]
fn baseline(bencher: Bencher, count: usize) {
    let blocks = blocks(count);
    let max = expected(&blocks);

    bencher.bench_local(move || {
        let found = blocks.iter().map(|block| baton::max_of(block)).max();
        assert_eq!(found, Some(max));
    });
}

#[divan::bench(args = BLOCKS)]
fn baton(bencher: Bencher, count: usize) {
    let blocks = blocks(count);
    let max = expected(&blocks);
    let pool = ThreadPool::new(workers()).unwrap();

    bencher.bench_local(|| {
        let found = baton::reduce_max_on(&pool, blocks.iter().cloned()).unwrap();
        assert_eq!(found, max);
    });

    pool.shutdown();
}

#[divan::bench(args = BLOCKS)]
fn rayon(bencher: Bencher, count: usize) {
    let blocks = blocks(count);
    let max = expected(&blocks);

    bencher.bench_local(move || {
        let found = blocks.par_iter().map(|block| baton::max_of(block)).max();
        assert_eq!(found, Some(max));
    });
}

fn main() {
    divan::main();
}
