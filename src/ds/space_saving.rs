//! Space-Saving top-K frequency estimation in bounded memory.
//!
//! [`FrequencyEstimator`] tracks at most `capacity` distinct keys. Each tracked
//! key carries an estimated count and an over-count bound; for every reported
//! entry `count - error <= true_count <= count`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                      FrequencyEstimator<K> Layout                           │
//! │                                                                             │
//! │   ┌─────────────────────────────┐   ┌─────────────────────────────────┐   │
//! │   │  index: HashMap<K, SlotId>  │   │  entries: SlotArena<Entry<K>>   │   │
//! │   │                             │   │                                 │   │
//! │   │   "p1" ──► id_0 ────────────┼───┼──► id_0 │ count:5 err:0       │   │
//! │   │   "p2" ──► id_1 ────────────┼───┼──► id_1 │ count:2 err:1       │   │
//! │   │   "p3" ──► id_2 ────────────┼───┼──► id_2 │ count:2 err:0       │   │
//! │   └─────────────────────────────┘   └─────────────────────────────────┘   │
//! │                                                                             │
//! │   ┌───────────────────────────────────────────────────────────────────┐   │
//! │   │  buckets: HashMap<u64, Bucket>   (count → doubly-linked list)     │   │
//! │   │                                                                   │   │
//! │   │  min_count = 2                         max_count = 5              │   │
//! │   │  count=2: head ──► [id_1] ◄──► [id_2] ◄── tail  (evict tail)     │   │
//! │   │  count=5: head ──► [id_0] ◄── tail                               │   │
//! │   │  Bucket links: 2 ──next──► 5,  5 ──prev──► 2                     │   │
//! │   └───────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────────┘
//!
//! append(key)
//! ───────────
//!   tracked         → unlink from bucket c, push front of bucket c+1
//!   untracked, room → push front of bucket 1 (error 0)
//!   untracked, full → pop tail of bucket min (count m), insert key with
//!                     count m+1 and error m
//! ```
//!
//! ## Ordering
//!
//! [`top`](FrequencyEstimator::top) walks buckets from `max_count` down and
//! each bucket from head to tail, so among equal counts the entry that reached
//! that count most recently ranks first. Eviction takes the tail of the
//! minimum bucket: the key that has sat at the minimum count the longest.
//!
//! ## Operations
//!
//! | Operation       | Time                 | Notes                            |
//! |-----------------|----------------------|----------------------------------|
//! | `append`        | O(1)                 | +1, may evict the minimum        |
//! | `append_n`      | O(buckets skipped)   | weighted append                  |
//! | `merge_counter` | O(buckets skipped)   | adds a `(count, error)` pair     |
//! | `top(k)`        | O(k)                 | non-mutating                     |
//! | `estimate`      | O(1)                 | `(count, error)` for a key       |
//!
//! ## Example Usage
//!
//! ```
//! use toppartitions::ds::FrequencyEstimator;
//!
//! let mut top = FrequencyEstimator::new(2);
//! top.append("a");
//! top.append("a");
//! top.append("b");
//!
//! // "c" evicts "b" (count 1) and inherits its count as error.
//! assert_eq!(top.append("c"), Some("b"));
//!
//! let ranked = top.top(2);
//! assert_eq!(ranked[0].item, "c");
//! assert_eq!((ranked[0].count, ranked[0].error), (2, 1));
//! assert_eq!(ranked[1].item, "a");
//! assert_eq!((ranked[1].count, ranked[1].error), (2, 0));
//! ```

use std::hash::Hash;

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::ds::slot_arena::{SlotArena, SlotId};
use crate::error::{ConfigError, InvariantError};

/// Capacity used by [`FrequencyEstimator::default`].
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug)]
#[repr(C)]
struct Entry<K> {
    // Hot fields - touched on every bucket move
    prev: Option<SlotId>,
    next: Option<SlotId>,
    count: u64,
    error: u64,
    // Cold field - only read on eviction and snapshot
    key: K,
}

#[derive(Debug, Default)]
struct Bucket {
    head: Option<SlotId>,
    tail: Option<SlotId>,
    prev: Option<u64>,
    next: Option<u64>,
}

/// One ranked entry: an item with its estimated count and over-count bound.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Counter<K> {
    pub item: K,
    pub count: u64,
    pub error: u64,
}

impl<K> Counter<K> {
    pub fn new(item: K, count: u64, error: u64) -> Self {
        Self { item, count, error }
    }

    /// Guaranteed minimum of the true count.
    pub fn lower_bound(&self) -> u64 {
        self.count.saturating_sub(self.error)
    }
}

/// Fixed-capacity Space-Saving top-K estimator.
///
/// # Type Parameters
///
/// - `K`: Key type, must be `Eq + Hash + Clone`
#[derive(Debug)]
pub struct FrequencyEstimator<K> {
    entries: SlotArena<Entry<K>>,
    index: FxHashMap<K, SlotId>,
    buckets: FxHashMap<u64, Bucket>,
    min_count: u64,
    max_count: u64,
    total: u64,
    capacity: usize,
}

impl<K> FrequencyEstimator<K>
where
    K: Eq + Hash + Clone,
{
    /// Creates an estimator tracking at most `capacity` keys.
    ///
    /// A capacity of zero is clamped to one; use [`try_new`](Self::try_new)
    /// to reject it instead.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: SlotArena::with_capacity(capacity),
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            buckets: FxHashMap::default(),
            min_count: 0,
            max_count: 0,
            total: 0,
            capacity,
        }
    }

    /// Fallible constructor for user-supplied capacities.
    ///
    /// ```
    /// use toppartitions::ds::FrequencyEstimator;
    ///
    /// assert!(FrequencyEstimator::<u32>::try_new(0).is_err());
    /// assert_eq!(FrequencyEstimator::<u32>::try_new(8).unwrap().capacity(), 8);
    /// ```
    pub fn try_new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::new("estimator capacity must be > 0"));
        }
        Ok(Self::new(capacity))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of distinct keys currently tracked; never exceeds `capacity()`.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Returns `(count, error)` for a tracked key.
    pub fn estimate(&self, key: &K) -> Option<(u64, u64)> {
        let id = *self.index.get(key)?;
        self.entries.get(id).map(|e| (e.count, e.error))
    }

    /// Sum of every weight recorded since construction or the last `clear`.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Lowest tracked count, the eviction threshold once full.
    pub fn min_count(&self) -> Option<u64> {
        (self.min_count != 0).then_some(self.min_count)
    }

    /// Records one occurrence of `key`.
    ///
    /// Returns the key evicted to make room, if any.
    #[inline]
    pub fn append(&mut self, key: K) -> Option<K> {
        self.add(key, 1, 0)
    }

    /// Records `n` occurrences of `key` at once.
    ///
    /// ```
    /// use toppartitions::ds::FrequencyEstimator;
    ///
    /// let mut top = FrequencyEstimator::new(4);
    /// top.append_n("hot", 40);
    /// top.append("cold");
    /// assert_eq!(top.estimate(&"hot"), Some((40, 0)));
    /// ```
    pub fn append_n(&mut self, key: K, n: u64) -> Option<K> {
        if n == 0 {
            return None;
        }
        self.add(key, n, 0)
    }

    /// Folds an already-estimated entry into this estimator.
    ///
    /// Tracked keys sum both count and error. Untracked keys enter as-is while
    /// there is room; once full the minimum `m` is evicted and the key enters
    /// with `count + m` and `error + m`, which keeps `count - error` a lower
    /// bound on the combined stream.
    pub fn merge_counter(&mut self, counter: Counter<K>) -> Option<K> {
        if counter.count == 0 {
            return None;
        }
        let error = counter.error.min(counter.count);
        self.add(counter.item, counter.count, error)
    }

    /// Folds a `top(k)` snapshot (or any list of counters) into this estimator.
    pub fn merge_top<I>(&mut self, counters: I)
    where
        I: IntoIterator<Item = Counter<K>>,
    {
        for counter in counters {
            self.merge_counter(counter);
        }
    }

    /// Folds every entry of `other` into this estimator, heaviest first.
    ///
    /// ```
    /// use toppartitions::ds::FrequencyEstimator;
    ///
    /// let mut left = FrequencyEstimator::new(8);
    /// let mut right = FrequencyEstimator::new(8);
    /// left.append_n("a", 3);
    /// right.append_n("a", 2);
    /// right.append("b");
    ///
    /// left.merge(&right);
    /// assert_eq!(left.estimate(&"a"), Some((5, 0)));
    /// assert_eq!(left.estimate(&"b"), Some((1, 0)));
    /// ```
    pub fn merge(&mut self, other: &Self) {
        self.merge_top(other.top(other.len()));
    }

    /// Returns the `k` highest-count entries, most frequent first.
    ///
    /// Does not mutate the estimator. Equal counts are ordered by how recently
    /// the entry reached that count, most recent first.
    pub fn top(&self, k: usize) -> Vec<Counter<K>> {
        let mut out = Vec::with_capacity(k.min(self.len()));
        let mut cursor = (self.max_count != 0).then_some(self.max_count);
        while let Some(count) = cursor {
            let Some(bucket) = self.buckets.get(&count) else {
                break;
            };
            let mut id = bucket.head;
            while let Some(current) = id {
                if out.len() == k {
                    return out;
                }
                let Some(entry) = self.entries.get(current) else {
                    break;
                };
                out.push(Counter::new(entry.key.clone(), entry.count, entry.error));
                id = entry.next;
            }
            cursor = bucket.prev;
        }
        out
    }

    /// Iterates tracked entries in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = Counter<&K>> {
        self.entries
            .iter()
            .map(|(_, e)| Counter::new(&e.key, e.count, e.error))
    }

    /// Forgets every tracked key; capacity is unchanged.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.buckets.clear();
        self.min_count = 0;
        self.max_count = 0;
        self.total = 0;
    }

    /// Verifies the bucket/index/arena structure.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let fail = |msg: String| Err(InvariantError::new(msg));

        if self.len() != self.index.len() {
            return fail(format!(
                "arena holds {} entries, index {}",
                self.len(),
                self.index.len()
            ));
        }
        if self.len() > self.capacity {
            return fail(format!("{} keys exceed capacity {}", self.len(), self.capacity));
        }
        if self.is_empty() {
            if !self.buckets.is_empty() || self.min_count != 0 || self.max_count != 0 {
                return fail("empty estimator still has buckets".into());
            }
            return Ok(());
        }

        let mut walked = 0usize;
        let mut buckets_walked = 0usize;
        let mut expected_prev = None;
        let mut cursor = Some(self.min_count);
        while let Some(count) = cursor {
            let Some(bucket) = self.buckets.get(&count) else {
                return fail(format!("bucket {count} is linked but missing"));
            };
            if bucket.prev != expected_prev {
                return fail(format!("bucket {count} has a stale prev link"));
            }
            if bucket.head.is_none() {
                return fail(format!("bucket {count} is empty"));
            }

            let mut last = None;
            let mut id = bucket.head;
            while let Some(current) = id {
                let Some(entry) = self.entries.get(current) else {
                    return fail(format!("bucket {count} links a vacant slot"));
                };
                if entry.count != count || entry.prev != last {
                    return fail(format!("entry misplaced in bucket {count}"));
                }
                if entry.error > entry.count {
                    return fail(format!("error {} above count {count}", entry.error));
                }
                if self.index.get(&entry.key) != Some(&current) {
                    return fail("index disagrees with bucket entry".into());
                }
                last = Some(current);
                id = entry.next;
                walked += 1;
            }
            if bucket.tail != last {
                return fail(format!("bucket {count} tail mismatch"));
            }
            if let Some(next) = bucket.next {
                if next <= count {
                    return fail(format!("bucket {next} follows {count}"));
                }
            } else if self.max_count != count {
                return fail(format!("max_count {} but last bucket {count}", self.max_count));
            }
            expected_prev = Some(count);
            buckets_walked += 1;
            cursor = bucket.next;
        }

        if walked != self.len() || buckets_walked != self.buckets.len() {
            return fail(format!("walked {walked} entries of {}", self.len()));
        }
        Ok(())
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        if let Err(err) = self.check_invariants() {
            panic!("estimator invariant violated: {err}");
        }
    }

    fn add(&mut self, key: K, count: u64, error: u64) -> Option<K> {
        self.total = self.total.saturating_add(count);
        if let Some(&id) = self.index.get(&key) {
            self.bump(id, count, error);
            return None;
        }

        if self.len() < self.capacity {
            self.insert_new(key, count, error);
            return None;
        }

        let (evicted, floor) = self.evict_min()?;
        self.insert_new(key, floor.saturating_add(count), floor.saturating_add(error));
        Some(evicted)
    }

    fn insert_new(&mut self, key: K, count: u64, error: u64) {
        let id = self.entries.insert(Entry {
            prev: None,
            next: None,
            count,
            error,
            key: key.clone(),
        });
        self.index.insert(key, id);
        self.link(id, count, None);
    }

    fn bump(&mut self, id: SlotId, by: u64, error: u64) {
        let Some(entry) = self.entries.get_mut(id) else {
            return;
        };
        let current = entry.count;
        let target = current.saturating_add(by);
        entry.error = entry.error.saturating_add(error).min(target);

        let start = self.unlink(id, current);
        if let Some(entry) = self.entries.get_mut(id) {
            entry.count = target;
        }
        self.link(id, target, start);
    }

    fn evict_min(&mut self) -> Option<(K, u64)> {
        let count = self.min_count()?;
        let id = self.buckets.get(&count)?.tail?;
        self.unlink(id, count);
        let entry = self.entries.remove(id)?;
        self.index.remove(&entry.key);
        Some((entry.key, entry.count))
    }

    /// Detaches `id` from bucket `count`, dropping the bucket if it empties.
    ///
    /// Returns the highest surviving bucket below the new position, which is
    /// where a forward search for the entry's next bucket can start.
    fn unlink(&mut self, id: SlotId, count: u64) -> Option<u64> {
        self.list_remove(count, id);
        let (prev, next, empty) = match self.buckets.get(&count) {
            Some(bucket) => (bucket.prev, bucket.next, bucket.head.is_none()),
            None => return None,
        };
        if empty {
            self.remove_bucket(count, prev, next);
            prev
        } else {
            Some(count)
        }
    }

    fn link(&mut self, id: SlotId, count: u64, start: Option<u64>) {
        if !self.buckets.contains_key(&count) {
            let (prev, next) = self.neighbors(count, start);
            self.insert_bucket(count, prev, next);
        }
        self.list_push_front(count, id);
    }

    /// Finds the buckets that surround a new bucket `count`, walking forward
    /// from `start` (or from the minimum when `start` is `None`).
    fn neighbors(&self, count: u64, start: Option<u64>) -> (Option<u64>, Option<u64>) {
        let mut prev = start;
        let mut next = match start {
            Some(s) => self.buckets.get(&s).and_then(|b| b.next),
            None => self.min_count(),
        };
        while let Some(candidate) = next {
            if candidate >= count {
                break;
            }
            prev = Some(candidate);
            next = self.buckets.get(&candidate).and_then(|b| b.next);
        }
        (prev, next)
    }

    fn insert_bucket(&mut self, count: u64, prev: Option<u64>, next: Option<u64>) {
        self.buckets.insert(
            count,
            Bucket {
                head: None,
                tail: None,
                prev,
                next,
            },
        );

        match prev.and_then(|p| self.buckets.get_mut(&p)) {
            Some(prev_bucket) => prev_bucket.next = Some(count),
            None => self.min_count = count,
        }
        match next.and_then(|n| self.buckets.get_mut(&n)) {
            Some(next_bucket) => next_bucket.prev = Some(count),
            None => self.max_count = count,
        }
    }

    fn remove_bucket(&mut self, count: u64, prev: Option<u64>, next: Option<u64>) {
        match prev.and_then(|p| self.buckets.get_mut(&p)) {
            Some(prev_bucket) => prev_bucket.next = next,
            None => self.min_count = next.unwrap_or(0),
        }
        match next.and_then(|n| self.buckets.get_mut(&n)) {
            Some(next_bucket) => next_bucket.prev = prev,
            None => self.max_count = prev.unwrap_or(0),
        }
        self.buckets.remove(&count);
    }

    fn list_push_front(&mut self, count: u64, id: SlotId) {
        let Some(bucket) = self.buckets.get_mut(&count) else {
            return;
        };
        let old_head = bucket.head;
        bucket.head = Some(id);
        if old_head.is_none() {
            bucket.tail = Some(id);
        }

        if let Some(entry) = self.entries.get_mut(id) {
            entry.prev = None;
            entry.next = old_head;
        }
        if let Some(old_head) = old_head {
            if let Some(entry) = self.entries.get_mut(old_head) {
                entry.prev = Some(id);
            }
        }
    }

    fn list_remove(&mut self, count: u64, id: SlotId) {
        let Some((prev, next)) = self.entries.get(id).map(|e| (e.prev, e.next)) else {
            return;
        };

        if let Some(bucket) = self.buckets.get_mut(&count) {
            if prev.is_none() {
                bucket.head = next;
            }
            if next.is_none() {
                bucket.tail = prev;
            }
        }
        if let Some(prev) = prev {
            if let Some(entry) = self.entries.get_mut(prev) {
                entry.next = next;
            }
        }
        if let Some(next) = next {
            if let Some(entry) = self.entries.get_mut(next) {
                entry.prev = prev;
            }
        }
        if let Some(entry) = self.entries.get_mut(id) {
            entry.prev = None;
            entry.next = None;
        }
    }
}

impl<K> Default for FrequencyEstimator<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A permutation of 1..=17; key `i` is appended FREQ[i] times.
    const FREQ: [u64; 17] = [13, 8, 12, 4, 11, 2, 15, 1, 5, 3, 16, 7, 6, 9, 14, 10, 17];

    fn expected_counts(k: usize) -> Vec<u64> {
        let mut v = FREQ.to_vec();
        v.sort_unstable_by(|a, b| b.cmp(a));
        v.truncate(k);
        v
    }

    fn counts(res: &[Counter<usize>]) -> Vec<u64> {
        res.iter().map(|c| c.count).collect()
    }

    #[test]
    fn straight_insertion_ranks_by_count() {
        let mut top = FrequencyEstimator::new(32);
        for (key, &n) in FREQ.iter().enumerate() {
            for _ in 0..n {
                top.append(key);
            }
        }
        top.debug_validate_invariants();
        assert_eq!(counts(&top.top(10)), expected_counts(10));
    }

    #[test]
    fn interleaved_insertion_ranks_by_count() {
        let mut top = FrequencyEstimator::new(32);
        let mut remaining = FREQ;
        loop {
            let mut appended = false;
            for (key, left) in remaining.iter_mut().enumerate() {
                if *left > 0 {
                    *left -= 1;
                    top.append(key);
                    appended = true;
                }
            }
            if !appended {
                break;
            }
        }
        top.debug_validate_invariants();
        assert_eq!(counts(&top.top(10)), expected_counts(10));
    }

    #[test]
    fn bulk_insertion_ranks_by_count() {
        let mut top = FrequencyEstimator::new(32);
        for (key, &n) in FREQ.iter().enumerate() {
            top.append_n(key, n);
        }
        top.debug_validate_invariants();
        assert_eq!(counts(&top.top(10)), expected_counts(10));
    }

    #[test]
    fn single_value_collapses_to_one_entry() {
        let mut top = FrequencyEstimator::new(32);
        for _ in 0..100 {
            top.append(1u32);
        }
        let res = top.top(10);
        assert_eq!(res, vec![Counter::new(1, 100, 0)]);
    }

    #[test]
    fn eviction_carries_min_count_as_error() {
        let mut top = FrequencyEstimator::new(2);
        assert_eq!(top.append("a"), None);
        assert_eq!(top.append("a"), None);
        assert_eq!(top.append("b"), None);
        assert_eq!(top.append("c"), Some("b"));

        assert!(!top.contains(&"b"));
        assert_eq!(top.estimate(&"c"), Some((2, 1)));
        assert_eq!(top.estimate(&"a"), Some((2, 0)));
        assert_eq!(top.len(), 2);
        top.debug_validate_invariants();
    }

    #[test]
    fn eviction_takes_oldest_at_min_count() {
        let mut top = FrequencyEstimator::new(3);
        top.append("a");
        top.append("b");
        top.append("c");
        assert_eq!(top.append("d"), Some("a"));
        assert_eq!(top.append("e"), Some("b"));
    }

    #[test]
    fn ties_rank_most_recent_arrival_first() {
        let mut top = FrequencyEstimator::new(8);
        top.append("a");
        top.append("b");
        top.append("c");
        let order: Vec<_> = top.top(3).into_iter().map(|c| c.item).collect();
        assert_eq!(order, vec!["c", "b", "a"]);

        top.append("a");
        top.append("b");
        let order: Vec<_> = top.top(3).into_iter().map(|c| c.item).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn top_is_stable_and_non_mutating() {
        let mut top = FrequencyEstimator::new(4);
        for key in ["x", "y", "x", "z", "y", "x"] {
            top.append(key);
        }
        let first = top.top(4);
        let second = top.top(4);
        assert_eq!(first, second);
        assert_eq!(top.len(), 3);
        assert_eq!(top.top(0), Vec::new());
        assert_eq!(top.top(100).len(), 3);
    }

    #[test]
    fn weighted_append_skips_gaps_between_buckets() {
        let mut top = FrequencyEstimator::new(8);
        top.append_n("a", 1);
        top.append_n("b", 10);
        top.append_n("c", 5);
        top.append_n("a", 6);
        top.debug_validate_invariants();

        assert_eq!(counts_of(&top), vec![("b", 10), ("a", 7), ("c", 5)]);
        assert_eq!(top.min_count(), Some(5));
        assert_eq!(top.append_n("z", 0), None);
        assert!(!top.contains(&"z"));
    }

    fn counts_of(top: &FrequencyEstimator<&'static str>) -> Vec<(&'static str, u64)> {
        top.top(top.len()).into_iter().map(|c| (c.item, c.count)).collect()
    }

    #[test]
    fn merge_sums_shared_keys_and_keeps_disjoint_ones() {
        let mut left = FrequencyEstimator::new(8);
        left.append_n("a", 4);
        left.append_n("b", 2);
        let mut right = FrequencyEstimator::new(8);
        right.append_n("a", 3);
        right.append_n("c", 5);

        left.merge(&right);
        left.debug_validate_invariants();
        assert_eq!(left.estimate(&"a"), Some((7, 0)));
        assert_eq!(left.estimate(&"b"), Some((2, 0)));
        assert_eq!(left.estimate(&"c"), Some((5, 0)));
    }

    #[test]
    fn merge_into_full_estimator_accounts_error() {
        let mut merged = FrequencyEstimator::new(1);
        merged.merge_counter(Counter::new("a", 3, 1));
        merged.merge_counter(Counter::new("b", 2, 0));

        assert!(!merged.contains(&"a"));
        assert_eq!(merged.estimate(&"b"), Some((5, 3)));
        merged.debug_validate_invariants();
    }

    #[test]
    fn merge_counter_clamps_error_to_count() {
        let mut merged = FrequencyEstimator::new(4);
        merged.merge_counter(Counter::new("a", 2, 9));
        assert_eq!(merged.estimate(&"a"), Some((2, 2)));
        assert_eq!(merged.merge_counter(Counter::new("b", 0, 0)), None);
        assert!(!merged.contains(&"b"));
    }

    #[test]
    fn clear_resets_everything_but_capacity() {
        let mut top = FrequencyEstimator::new(3);
        top.append("a");
        top.append_n("b", 4);
        assert_eq!(top.total(), 5);
        top.clear();
        assert!(top.is_empty());
        assert_eq!(top.total(), 0);
        assert_eq!(top.min_count(), None);
        assert_eq!(top.capacity(), 3);
        assert!(top.top(3).is_empty());
        top.debug_validate_invariants();

        top.append("c");
        assert_eq!(top.estimate(&"c"), Some((1, 0)));
    }

    #[test]
    fn zero_capacity_is_clamped_or_rejected() {
        assert_eq!(FrequencyEstimator::<u8>::new(0).capacity(), 1);
        let err = FrequencyEstimator::<u8>::try_new(0).unwrap_err();
        assert!(err.message().contains("capacity"));
    }

    #[test]
    fn default_capacity_matches_constant() {
        let top: FrequencyEstimator<String> = FrequencyEstimator::default();
        assert_eq!(top.capacity(), DEFAULT_CAPACITY);
    }

    #[test]
    fn counter_lower_bound_saturates() {
        assert_eq!(Counter::new("k", 5, 2).lower_bound(), 3);
        assert_eq!(Counter::new("k", 1, 4).lower_bound(), 0);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn exact(stream: &[u8]) -> HashMap<u8, u64> {
        let mut counts = HashMap::new();
        for &k in stream {
            *counts.entry(k).or_insert(0) += 1;
        }
        counts
    }

    proptest! {
        /// Property: every reported entry brackets the true count
        #[cfg_attr(miri, ignore)]
        #[test]
        fn prop_count_brackets_true_count(
            stream in prop::collection::vec(0u8..32, 0..400),
            capacity in 1usize..12,
        ) {
            let mut top = FrequencyEstimator::new(capacity);
            for &k in &stream {
                top.append(k);
            }
            prop_assert_eq!(top.total(), stream.len() as u64);
            let truth = exact(&stream);
            for c in top.top(capacity) {
                let t = truth.get(&c.item).copied().unwrap_or(0);
                prop_assert!(c.count - c.error <= t, "{:?} vs true {}", c, t);
                prop_assert!(t <= c.count, "{:?} vs true {}", c, t);
            }
        }

        /// Property: len() never exceeds capacity and structure stays valid
        #[cfg_attr(miri, ignore)]
        #[test]
        fn prop_capacity_and_structure_hold(
            ops in prop::collection::vec((any::<u8>(), 1u64..4), 0..300),
            capacity in 1usize..16,
        ) {
            let mut top = FrequencyEstimator::new(capacity);
            for (key, weight) in ops {
                top.append_n(key, weight);
                prop_assert!(top.len() <= capacity);
                prop_assert!(top.check_invariants().is_ok());
            }
        }

        /// Property: top(k) is sorted by count, descending
        #[cfg_attr(miri, ignore)]
        #[test]
        fn prop_top_is_descending(
            stream in prop::collection::vec(0u8..20, 0..200),
            k in 0usize..25,
        ) {
            let mut top = FrequencyEstimator::new(10);
            for k in &stream {
                top.append(*k);
            }
            let ranked = top.top(k);
            prop_assert!(ranked.len() <= k.min(top.len()));
            prop_assert!(ranked.windows(2).all(|w| w[0].count >= w[1].count));
        }

        /// Property: merged estimates dominate inputs and keep the lower bound
        #[cfg_attr(miri, ignore)]
        #[test]
        fn prop_merge_is_sound(
            left in prop::collection::vec(0u8..16, 0..200),
            right in prop::collection::vec(0u8..16, 0..200),
            capacity in 1usize..10,
        ) {
            let mut a = FrequencyEstimator::new(capacity);
            let mut b = FrequencyEstimator::new(capacity);
            left.iter().for_each(|k| { a.append(*k); });
            right.iter().for_each(|k| { b.append(*k); });

            let mut merged = FrequencyEstimator::new(capacity);
            merged.merge(&a);
            merged.merge(&b);
            prop_assert!(merged.check_invariants().is_ok());

            let mut combined = left.clone();
            combined.extend_from_slice(&right);
            let truth = exact(&combined);

            for c in merged.top(capacity) {
                let t = truth.get(&c.item).copied().unwrap_or(0);
                prop_assert!(c.count - c.error <= t, "{:?} vs true {}", c, t);

                let from_a = a.estimate(&c.item).map_or(0, |(n, _)| n);
                let from_b = b.estimate(&c.item).map_or(0, |(n, _)| n);
                prop_assert!(c.count >= from_a.max(from_b));
            }
        }

        /// Property: without overflow, merging is exact
        #[cfg_attr(miri, ignore)]
        #[test]
        fn prop_merge_without_overflow_is_exact(
            left in prop::collection::vec(0u8..8, 0..100),
            right in prop::collection::vec(0u8..8, 0..100),
        ) {
            let mut a = FrequencyEstimator::new(8);
            let mut b = FrequencyEstimator::new(8);
            left.iter().for_each(|k| { a.append(*k); });
            right.iter().for_each(|k| { b.append(*k); });
            a.merge(&b);

            let mut combined = left.clone();
            combined.extend_from_slice(&right);
            for (key, n) in exact(&combined) {
                prop_assert_eq!(a.estimate(&key), Some((n, 0)));
            }
        }
    }
}
