// Copyright 2026 strata Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    hash::Hash,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use equivalent::Equivalent;
use itertools::Itertools;
use parking_lot::RwLock;
use strata_common::{
    code::{DefaultHasher, HashBuilder, Key},
    scope::Scope,
    strict_assert_eq,
};

use crate::record::Record;

const INITIAL_BUCKETS: usize = 16;

struct Table<K, V> {
    buckets: Vec<Vec<Arc<Record<K, V>>>>,
    len: usize,
}

impl<K, V> Table<K, V>
where
    K: Key,
{
    fn new() -> Self {
        Self {
            buckets: (0..INITIAL_BUCKETS).map(|_| vec![]).collect_vec(),
            len: 0,
        }
    }

    fn bucket(&self, hash: u64, shift: u32) -> usize {
        (hash >> shift) as usize & (self.buckets.len() - 1)
    }

    fn get<'a, Q>(&'a self, hash: u64, key: &Q, shift: u32) -> Option<&'a Arc<Record<K, V>>>
    where
        Q: Equivalent<K> + ?Sized,
    {
        self.buckets[self.bucket(hash, shift)]
            .iter()
            .find(|record| record.hash() == hash && key.equivalent(record.key()))
    }

    fn insert(&mut self, record: Arc<Record<K, V>>, shift: u32) -> Option<Arc<Record<K, V>>> {
        let index = self.bucket(record.hash(), shift);
        let bucket = &mut self.buckets[index];
        if let Some(slot) = bucket
            .iter_mut()
            .find(|r| r.hash() == record.hash() && r.key() == record.key())
        {
            return Some(std::mem::replace(slot, record));
        }
        bucket.push(record);
        self.len += 1;
        if self.len > self.buckets.len() / 4 * 3 {
            self.grow(shift);
        }
        None
    }

    fn remove_at(&mut self, index: usize, position: usize) -> Arc<Record<K, V>> {
        self.len -= 1;
        self.buckets[index].swap_remove(position)
    }

    fn grow(&mut self, shift: u32) {
        let len = self.buckets.len() * 2;
        let mut buckets = (0..len).map(|_| vec![]).collect_vec();
        for record in self.buckets.drain(..).flatten() {
            buckets[(record.hash() >> shift) as usize & (len - 1)].push(record);
        }
        self.buckets = buckets;
    }
}

struct Shard<K, V> {
    table: RwLock<Table<K, V>>,
    /// Mirrors the table length for lock-free reads.
    len: AtomicUsize,
}

/// Sharded table of records that supports cheap random sampling.
///
/// The low bits of a hash select the shard, the bits above them select the bucket. Sampling starts at a random bucket
/// of a shard chosen by a hint or at random, walks the buckets of that shard, then wraps into the following shards
/// until enough records are gathered. The cost is proportional to the sample size, not the population.
///
/// Sampling holds one shard read lock at a time, so a sample is not a consistent snapshot of the whole table.
pub struct Sampler<K, V, S = DefaultHasher> {
    shards: Vec<Shard<K, V>>,
    shift: u32,
    hash_builder: S,
}

impl<K, V, S> Sampler<K, V, S>
where
    K: Key,
    S: HashBuilder,
{
    /// Create a sampler with `shards` shards, rounded up to a power of two.
    pub fn new(shards: usize, hash_builder: S) -> Self {
        assert!(shards > 0, "shards must be positive");
        let shards = shards.next_power_of_two();
        Self {
            shards: (0..shards)
                .map(|_| Shard {
                    table: RwLock::new(Table::new()),
                    len: AtomicUsize::new(0),
                })
                .collect_vec(),
            shift: shards.trailing_zeros(),
            hash_builder,
        }
    }

    /// Hash a key.
    pub fn hash<Q>(&self, key: &Q) -> u64
    where
        Q: Hash + ?Sized,
    {
        self.hash_builder.hash_one(key)
    }

    fn shard(&self, hash: u64) -> &Shard<K, V> {
        &self.shards[hash as usize & (self.shards.len() - 1)]
    }

    /// Get the record of a key.
    pub fn get<Q>(&self, hash: u64, key: &Q) -> Option<Arc<Record<K, V>>>
    where
        Q: Equivalent<K> + ?Sized,
    {
        self.shard(hash).table.read().get(hash, key, self.shift).cloned()
    }

    /// Insert a record, returning the record it replaces.
    ///
    /// `f` runs under the shard write lock before the record becomes visible.
    pub fn insert_with<F>(&self, record: Arc<Record<K, V>>, f: F) -> Option<Arc<Record<K, V>>>
    where
        F: FnOnce(&Record<K, V>),
    {
        let shard = self.shard(record.hash());
        let old = shard.table.write().with(|mut table| {
            f(&record);
            table.insert(record, self.shift)
        });
        if old.is_none() {
            shard.len.fetch_add(1, Ordering::Relaxed);
        }
        old
    }

    /// Look up a key and hand it over to `f` together with its record, under the shard read lock.
    ///
    /// Inserts into the same shard wait for `f` to return.
    pub fn inspect<F, R>(&self, hash: u64, key: K, f: F) -> R
    where
        F: FnOnce(K, Option<&Arc<Record<K, V>>>) -> R,
    {
        let table = self.shard(hash).table.read();
        let record = table.get(hash, &key, self.shift);
        f(key, record)
    }

    /// Remove the record of a key if `predicate` holds for it, checked under the shard write lock.
    pub fn remove_if<Q, P>(&self, hash: u64, key: &Q, predicate: P) -> Option<Arc<Record<K, V>>>
    where
        Q: Equivalent<K> + ?Sized,
        P: FnOnce(&Record<K, V>) -> bool,
    {
        let shard = self.shard(hash);
        let removed = shard.table.write().with(|mut table| {
            let index = table.bucket(hash, self.shift);
            let position = table.buckets[index]
                .iter()
                .position(|record| record.hash() == hash && key.equivalent(record.key()))?;
            if !predicate(&table.buckets[index][position]) {
                return None;
            }
            Some(table.remove_at(index, position))
        });
        if removed.is_some() {
            shard.len.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    /// Remove the record of a key.
    pub fn remove<Q>(&self, hash: u64, key: &Q) -> Option<Arc<Record<K, V>>>
    where
        Q: Equivalent<K> + ?Sized,
    {
        self.remove_if(hash, key, |_| true)
    }

    /// Remove exactly `record`. Returns `false` if it has been removed or replaced meanwhile.
    pub fn remove_record(&self, record: &Arc<Record<K, V>>) -> bool {
        self.remove_record_if(record, |_| true)
    }

    /// Remove exactly `record` if `predicate` holds for it, checked under the shard write lock.
    pub fn remove_record_if<P>(&self, record: &Arc<Record<K, V>>, predicate: P) -> bool
    where
        P: FnOnce(&Record<K, V>) -> bool,
    {
        let shard = self.shard(record.hash());
        let removed = shard.table.write().with(|mut table| {
            let index = table.bucket(record.hash(), self.shift);
            let Some(position) = table.buckets[index].iter().position(|r| Arc::ptr_eq(r, record)) else {
                return false;
            };
            if !predicate(record) {
                return false;
            }
            table.remove_at(index, position);
            true
        });
        if removed {
            shard.len.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    /// Draw up to `size` records, starting at the shard of `hint` if given.
    pub fn sample(&self, size: usize, hint: Option<u64>) -> Vec<Arc<Record<K, V>>> {
        self.sample_with(size, hint, rand::random())
    }

    /// Draw up to `size` records with the given random value.
    ///
    /// The starting shard is taken from `hint`, or from the low bits of `random` without a hint. The starting bucket
    /// of every visited shard is taken from the bits of `random` above the shard bits.
    pub fn sample_with(&self, size: usize, hint: Option<u64>, random: u64) -> Vec<Arc<Record<K, V>>> {
        let mut sample = Vec::with_capacity(size);
        if size == 0 {
            return sample;
        }

        let mask = self.shards.len() - 1;
        let start = hint.unwrap_or(random) as usize & mask;

        for i in 0..self.shards.len() {
            let shard = &self.shards[(start + i) & mask];
            if shard.len.load(Ordering::Relaxed) == 0 {
                continue;
            }
            let table = shard.table.read();
            let buckets = table.buckets.len();
            let first = table.bucket(random, self.shift);
            for j in 0..buckets {
                for record in table.buckets[(first + j) & (buckets - 1)].iter() {
                    sample.push(record.clone());
                    if sample.len() == size {
                        return sample;
                    }
                }
            }
        }

        sample
    }

    /// Best-effort count summed from per-shard counters without locking.
    pub fn quick_size(&self) -> usize {
        self.shards.iter().map(|shard| shard.len.load(Ordering::Relaxed)).sum()
    }

    /// Exact count, taking every shard read lock in turn.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.table.read().len).sum()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all records.
    pub fn records(&self) -> Vec<Arc<Record<K, V>>> {
        self.shards
            .iter()
            .flat_map(|shard| shard.table.read().buckets.iter().flatten().cloned().collect_vec())
            .collect_vec()
    }

    /// Remove and return all records.
    pub fn drain(&self) -> Vec<Arc<Record<K, V>>> {
        let mut records = vec![];
        for shard in self.shards.iter() {
            let mut table = shard.table.write();
            let drained = std::mem::replace(&mut *table, Table::new());
            strict_assert_eq!(drained.len, drained.buckets.iter().map(|bucket| bucket.len()).sum::<usize>());
            shard.len.store(0, Ordering::Relaxed);
            drop(table);
            records.extend(drained.buckets.into_iter().flatten());
        }
        records
    }

    /// Number of shards.
    pub fn shards(&self) -> usize {
        self.shards.len()
    }
}
