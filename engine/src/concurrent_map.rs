//! Key-partitioned map with per-shard mutual exclusion.
//!
//! The parallel ranking path aggregates per-document relevance from many
//! worker threads at once; a single mutex around one map would serialize
//! them. Instead the key space is split across a fixed number of shards,
//! each an ordered map behind its own `parking_lot::Mutex`, so writers of
//! distinct shards make progress in parallel.

use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Maps a key to the shard owning it, using the unsigned interpretation of
/// the key modulo the shard count.
pub trait ShardKey: Ord + Copy + Send {
    fn shard_index(self, shard_count: usize) -> usize;
}

macro_rules! impl_shard_key {
    ($($int:ty),*) => {$(
        impl ShardKey for $int {
            fn shard_index(self, shard_count: usize) -> usize {
                (self as u64 % shard_count as u64) as usize
            }
        }
    )*};
}

impl_shard_key!(i32, i64, u32, u64);

pub struct ConcurrentMap<K, V> {
    shards: Vec<Mutex<BTreeMap<K, V>>>,
}

impl<K: ShardKey, V: Default> ConcurrentMap<K, V> {
    /// Creates a map partitioned into `shard_count` shards.
    ///
    /// # Panics
    ///
    /// Panics if `shard_count` is zero.
    pub fn new(shard_count: usize) -> Self {
        assert!(shard_count > 0, "shard count must be positive");
        Self {
            shards: (0..shard_count).map(|_| Mutex::new(BTreeMap::new())).collect(),
        }
    }

    /// Locks the shard owning `key` and passes a mutable reference to its
    /// value (default-constructed on first touch) to `f`. The lock is held
    /// exactly for the duration of the closure, so at most one access per
    /// shard is live at any instant.
    pub fn with<R>(&self, key: K, f: impl FnOnce(&mut V) -> R) -> R {
        let mut shard = self.shards[key.shard_index(self.shards.len())].lock();
        f(shard.entry(key).or_default())
    }

    /// Drains every shard into a single ordered map. Taking the map by value
    /// makes this the terminal operation: no access can overlap the drain.
    pub fn build_ordinary(self) -> BTreeMap<K, V> {
        let mut result = BTreeMap::new();
        for shard in self.shards {
            result.append(&mut shard.into_inner());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn accumulates_across_shards() {
        let map: ConcurrentMap<i32, f64> = ConcurrentMap::new(4);
        for key in 0..8 {
            map.with(key, |value| *value += key as f64);
        }
        let ordinary = map.build_ordinary();
        assert_eq!(ordinary.len(), 8);
        assert_eq!(ordinary[&5], 5.0);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let map: ConcurrentMap<i32, u64> = ConcurrentMap::new(3);
        (0..1000).into_par_iter().for_each(|i| {
            map.with(i % 10, |value| *value += 1);
        });
        let ordinary = map.build_ordinary();
        assert_eq!(ordinary.values().sum::<u64>(), 1000);
        assert!(ordinary.values().all(|&count| count == 100));
    }

    #[test]
    fn negative_keys_land_in_a_shard() {
        let map: ConcurrentMap<i32, u64> = ConcurrentMap::new(7);
        map.with(-3, |value| *value = 42);
        assert_eq!(map.build_ordinary()[&-3], 42);
    }

    #[test]
    fn build_ordinary_is_sorted() {
        let map: ConcurrentMap<i32, u64> = ConcurrentMap::new(2);
        for key in [9, 3, 7, 1] {
            map.with(key, |value| *value = key as u64);
        }
        let keys: Vec<i32> = map.build_ordinary().into_keys().collect();
        assert_eq!(keys, [1, 3, 7, 9]);
    }
}
