//! Item generation for producers.

use core::hash::Hasher;
use core::sync::atomic::AtomicUsize;
use core::sync::atomic::Ordering;
use std::hash::DefaultHasher;

use crate::Item;

/// Generates the items a producer pushes into the buffer.
///
/// This is an [xorshift*] generator, which is fast and tolerates weak
/// seeding as long as the seed is not zero. Items are non-negative.
///
/// [xorshift*]: https://en.wikipedia.org/wiki/Xorshift#xorshift*
#[derive(Debug, Clone)]
pub struct ItemSource {
    state: u64,
}

impl ItemSource {
    /// Creates a source with a fresh seed.
    pub fn new() -> ItemSource {
        // Any non-zero seed will do, so hash a global counter.
        let mut seed = 0;
        while seed == 0 {
            let mut hasher = DefaultHasher::new();
            static COUNTER: AtomicUsize = AtomicUsize::new(0);
            hasher.write_usize(COUNTER.fetch_add(1, Ordering::Relaxed));
            seed = hasher.finish();
        }

        ItemSource { state: seed }
    }

    /// Creates a source that yields a reproducible sequence. A zero seed is
    /// replaced with one.
    pub fn from_seed(seed: u64) -> ItemSource {
        ItemSource {
            state: seed.max(1),
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        debug_assert_ne!(x, 0);
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_f491_4f6c_dd1d)
    }

    /// Returns the next item.
    pub fn next_item(&mut self) -> Item {
        // The top 31 bits are the best mixed, and always fit a non-negative i32.
        (self.next_u64() >> 33) as Item
    }
}

impl Default for ItemSource {
    fn default() -> ItemSource {
        ItemSource::new()
    }
}

impl Iterator for ItemSource {
    type Item = Item;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_item())
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::ItemSource;

    #[test]
    fn seeded_sources_repeat() {
        let a: Vec<_> = ItemSource::from_seed(7).take(16).collect();
        let b: Vec<_> = ItemSource::from_seed(7).take(16).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn items_are_non_negative() {
        assert!(ItemSource::from_seed(0).take(1_000).all(|item| item >= 0));
    }

    #[test]
    fn fresh_sources_differ() {
        let a: Vec<_> = ItemSource::new().take(8).collect();
        let b: Vec<_> = ItemSource::new().take(8).collect();
        assert_ne!(a, b);
    }
}
