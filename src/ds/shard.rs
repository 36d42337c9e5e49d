//! Shard identity and deterministic partition-key routing.
//!
//! Every partition belongs to exactly one shard. The runtime uses
//! [`ShardSelector`] to route a write (or a single-partition read) to the
//! shard that owns the key; full scans visit every shard.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Partition Routing Flow                         │
//! │                                                                         │
//! │   PartitionKey bytes                                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │   ┌───────────────────────────────────────────────────────────────┐   │
//! │   │  ShardSelector { shards: 4, seed: 42 }                        │   │
//! │   │                                                               │   │
//! │   │  1. Create DefaultHasher                                      │   │
//! │   │  2. Hash seed, then key                                       │   │
//! │   │  3. ShardId(hasher.finish() % 4)                              │   │
//! │   └───────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │   ┌─────────┬─────────┬─────────┬─────────┐                           │
//! │   │ Shard 0 │ Shard 1 │ Shard 2 │ Shard 3 │  each owns its Database   │
//! │   └─────────┴─────────┴─────────┴─────────┘  and listener registry    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```
//! use toppartitions::ds::ShardSelector;
//!
//! let selector = ShardSelector::new(4, 0);
//! let shard = selector.shard_for_key(&b"user:123".as_slice());
//!
//! assert!(shard.index() < 4);
//! assert_eq!(selector.shard_for_key(&b"user:123".as_slice()), shard);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

/// Index of a shard in `[0, shard_count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ShardId(usize);

impl ShardId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic shard selector using a seeded hash.
///
/// Maps any `Hash`able key to a [`ShardId`]. The same `(key, seed, shards)`
/// tuple always produces the same result, so every write of a partition
/// lands on the shard that later serves its reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardSelector {
    shards: usize,
    seed: u64,
}

impl ShardSelector {
    /// Creates a selector for `shards` shards with the given `seed`.
    ///
    /// The shard count is clamped to at least 1.
    ///
    /// ```
    /// use toppartitions::ds::ShardSelector;
    ///
    /// assert_eq!(ShardSelector::new(16, 0).shard_count(), 16);
    /// assert_eq!(ShardSelector::new(0, 0).shard_count(), 1);
    /// ```
    pub fn new(shards: usize, seed: u64) -> Self {
        Self {
            shards: shards.max(1),
            seed,
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards
    }

    /// Maps a key to its owning shard.
    pub fn shard_for_key<K: Hash + ?Sized>(&self, key: &K) -> ShardId {
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        key.hash(&mut hasher);
        ShardId((hasher.finish() as usize) % self.shards)
    }

    /// Iterates every shard id in ascending order.
    pub fn shards(&self) -> impl Iterator<Item = ShardId> {
        (0..self.shards).map(ShardId)
    }
}

impl Default for ShardSelector {
    /// Creates a single-shard selector with seed 0.
    fn default() -> Self {
        Self::new(1, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_selector_is_deterministic() {
        let selector = ShardSelector::new(8, 123);

        let a = selector.shard_for_key(&b"key"[..]);
        let b = selector.shard_for_key(&b"key"[..]);
        assert_eq!(a, b);
        assert!(a.index() < selector.shard_count());
    }

    #[test]
    fn single_shard_owns_everything() {
        let selector = ShardSelector::default();
        for i in 0..32u32 {
            assert_eq!(selector.shard_for_key(&i), ShardId::new(0));
        }
    }

    #[test]
    fn shards_iterates_in_order() {
        let ids: Vec<_> = ShardSelector::new(3, 0).shards().collect();
        assert_eq!(ids, vec![ShardId::new(0), ShardId::new(1), ShardId::new(2)]);
    }

    #[test]
    fn keys_spread_over_all_shards() {
        let selector = ShardSelector::new(4, 7);
        let mut seen = [false; 4];
        for i in 0..256u32 {
            seen[selector.shard_for_key(&i.to_be_bytes()).index()] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
