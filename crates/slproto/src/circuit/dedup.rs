// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bounded inbound-sequence dedup set. Oldest entries are evicted once the
//! cap is reached, per §3's "Inbound dedup set" invariant.

use std::num::NonZeroUsize;

use lru::LruCache;

pub const DEFAULT_CAPACITY: usize = 1024;

pub struct DedupSet {
    seen: LruCache<u32, ()>,
}

impl DedupSet {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            seen: LruCache::new(capacity),
        }
    }

    /// Returns `true` if `sequence` was already present (a duplicate);
    /// otherwise records it and returns `false`.
    pub fn check_and_insert(&mut self, sequence: u32) -> bool {
        if self.seen.get(&sequence).is_some() {
            true
        } else {
            self.seen.put(sequence, ());
            false
        }
    }
}

impl Default for DedupSet {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
