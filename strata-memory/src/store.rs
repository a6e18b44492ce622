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
    borrow::Cow,
    cell::Cell,
    fmt::Debug,
    hash::Hash,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use equivalent::Equivalent;
use hashbrown::HashSet;
use itertools::Itertools;
use parking_lot::RwLock;
use strata_common::{
    code::{DefaultHasher, HashBuilder, Key, Value},
    error::{Error, Result},
    event::{Event, EventListener},
    metrics::Metrics,
};
use strata_pool::{Accessor, Participant, PoolUnit};
use strata_sizeof::SizeOfEngine;

use crate::{
    eviction::{sample_size, select, EvictionPolicy},
    record::{Data, Record},
    sampler::Sampler,
};

/// Consecutive samples without a victim after which an eviction request gives up.
const MAX_EVICT_MISSES: usize = 8;

thread_local! {
    static JUST_ADDED: Cell<usize> = const { Cell::new(0) };
}

/// Marks the record the current thread is charging, so evictions driven by that charge leave it alone.
struct JustAdded {
    prev: usize,
}

impl JustAdded {
    fn enter<K, V>(record: &Arc<Record<K, V>>) -> Self {
        let prev = JUST_ADDED.with(|cell| cell.replace(Arc::as_ptr(record) as usize));
        Self { prev }
    }

    fn current() -> usize {
        JUST_ADDED.with(|cell| cell.get())
    }
}

impl Drop for JustAdded {
    fn drop(&mut self) {
        JUST_ADDED.with(|cell| cell.set(self.prev));
    }
}

/// Bookkeeping bytes of a record besides its key and value, including the reference counts.
pub fn container_size<K, V>() -> usize {
    std::mem::size_of::<Record<K, V>>() - std::mem::size_of::<K>() - std::mem::size_of::<V>()
        + 2 * std::mem::size_of::<usize>()
}

pub(crate) struct StoreInner<K, V, S>
where
    K: Key,
    V: Value,
    S: HashBuilder,
{
    pub(crate) name: Cow<'static, str>,
    pub(crate) sampler: Sampler<K, V, S>,
    pub(crate) pins: RwLock<HashSet<K>>,
    pub(crate) tier_pinned: bool,
    pub(crate) policy: Arc<dyn EvictionPolicy>,
    pub(crate) sample_size: usize,
    pub(crate) size_of: Arc<dyn SizeOfEngine<K, V>>,
    pub(crate) accessor: Accessor,
    pub(crate) clock: AtomicU64,
    pub(crate) aborted_size_of: AtomicBool,
    pub(crate) event_listener: Option<Arc<dyn EventListener<Key = K, Value = V>>>,
    pub(crate) metrics: Arc<Metrics>,
}

impl<K, V, S> Debug for StoreInner<K, V, S>
where
    K: Key,
    V: Value,
    S: HashBuilder,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("entries", &self.sampler.quick_size())
            .field("usage", &self.accessor.size())
            .field("policy", &self.policy)
            .field("sample_size", &self.sample_size)
            .field("tier_pinned", &self.tier_pinned)
            .finish()
    }
}

impl<K, V, S> StoreInner<K, V, S>
where
    K: Key,
    V: Value,
    S: HashBuilder,
{
    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn notify(&self, reason: Event, records: &[Arc<Record<K, V>>]) {
        if let Some(listener) = self.event_listener.as_ref() {
            for record in records {
                listener.on_leave(reason, record.key(), record.value());
            }
        }
    }

    /// Credit the charge of a record taken out of the sampler, if the record has been charged.
    fn settle_removed(&self, record: &Record<K, V>) -> usize {
        if record.mark_removed() {
            self.accessor.release(record.charge());
            record.charge()
        } else {
            0
        }
    }
}

impl<K, V, S> Participant for StoreInner<K, V, S>
where
    K: Key,
    V: Value,
    S: HashBuilder,
{
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "strata::memory::store::evict"))]
    fn evict(&self, count: usize, bytes_hint: usize) -> bool {
        if self.tier_pinned {
            return false;
        }

        let mut victims = vec![];
        let mut freed = 0;
        let mut misses = 0;

        while victims.len() < count || freed < bytes_hint {
            let population = self.sampler.quick_size();
            if population == 0 {
                break;
            }

            let sample = self.sampler.sample(sample_size(population, self.sample_size), None);
            let current = JustAdded::current();
            let just_added = sample.iter().find(|record| Arc::as_ptr(*record) as usize == current);

            let evicted = match select(self.policy.as_ref(), population, &sample, just_added) {
                Some(victim) if just_added.is_some_and(|record| Arc::ptr_eq(record, victim)) => None,
                Some(victim) if self.sampler.remove_record_if(victim, |record| !record.is_pinned()) => {
                    Some(victim.clone())
                }
                _ => None,
            };

            match evicted {
                Some(victim) => {
                    freed += self.settle_removed(&victim);
                    self.metrics.store_evict.increase(1);
                    victims.push(victim);
                }
                None => {
                    self.metrics.store_evict_miss.increase(1);
                    misses += 1;
                    if misses == MAX_EVICT_MISSES {
                        break;
                    }
                }
            }
        }

        tracing::trace!(
            "[store]: {} evicts {} entries, freed: {freed}, count: {count}, bytes hint: {bytes_hint}, misses: {misses}",
            self.name,
            victims.len()
        );
        self.metrics.store_usage.absolute(self.accessor.size() as _);
        self.notify(Event::Evict, &victims);

        !victims.is_empty()
    }

    fn size(&self) -> usize {
        self.accessor.size()
    }
}

/// A store tier charging its entries to a shared [`strata_pool::Pool`].
///
/// Entries live in a sharded [`Sampler`]. When the pool runs over its capacity, the store is asked to evict and picks
/// victims from small random samples with its [`EvictionPolicy`]. Pinned entries are never evicted.
pub struct Store<K, V, S = DefaultHasher>
where
    K: Key,
    V: Value,
    S: HashBuilder,
{
    pub(crate) inner: Arc<StoreInner<K, V, S>>,
}

impl<K, V, S> Debug for Store<K, V, S>
where
    K: Key,
    V: Value,
    S: HashBuilder,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

impl<K, V, S> Clone for Store<K, V, S>
where
    K: Key,
    V: Value,
    S: HashBuilder,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V, S> Store<K, V, S>
where
    K: Key,
    V: Value,
    S: HashBuilder,
{
    /// Insert an entry, replacing the entry with the same key.
    ///
    /// The entry is measured first, then published, then charged to the pool. Charging may evict on the calling
    /// thread, but never the entry being inserted. A measurement failure falls back to the shallow size.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "strata::memory::store::insert"))]
    pub fn insert(&self, key: K, value: V) -> Arc<Record<K, V>> {
        let inner = &self.inner;

        let hash = inner.sampler.hash(&key);
        let container = container_size::<K, V>();
        let weight = match inner.size_of.size_of(&key, &value, container) {
            Ok(size) => size.total(),
            Err(e) => {
                inner.aborted_size_of.store(true, Ordering::Release);
                inner.metrics.store_size_of_fallback.increase(1);
                let shallow = std::mem::size_of::<K>() + std::mem::size_of::<V>() + container;
                tracing::warn!(
                    "[store]: {} falls back to the shallow size {shallow} for key {key:?}, error: {e}",
                    inner.name
                );
                shallow
            }
        };
        let charge = match inner.accessor.unit() {
            PoolUnit::Bytes => weight,
            PoolUnit::Entries => 1,
        };

        let record = Arc::new(Record::new(
            Data {
                key,
                value,
                hash,
                weight,
                charge,
            },
            inner.tick(),
        ));

        let old = inner.sampler.insert_with(record.clone(), |record| {
            record.mark_published();
            if inner.pins.read().contains(record.key()) {
                record.set_pinned(true);
            }
        });
        inner.metrics.store_insert.increase(1);

        if let Some(old) = old {
            inner.settle_removed(&old);
            inner.metrics.store_replace.increase(1);
            inner.notify(Event::Replace, &[old]);
        }

        let reserved = {
            let _guard = JustAdded::enter(&record);
            inner.accessor.reserve(charge)
        };
        if reserved && !record.mark_charged() {
            // Removed before it was charged, nobody else credits it.
            inner.accessor.release(charge);
        }

        inner.metrics.store_usage.absolute(inner.accessor.size() as _);
        record
    }

    /// Get the entry of a key, counting a hit.
    pub fn get<Q>(&self, key: &Q) -> Option<Arc<Record<K, V>>>
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        let hash = self.inner.sampler.hash(key);
        match self.inner.sampler.get(hash, key) {
            Some(record) => {
                record.hit(self.inner.tick());
                self.inner.metrics.store_hit.increase(1);
                Some(record)
            }
            None => {
                self.inner.metrics.store_miss.increase(1);
                None
            }
        }
    }

    /// Get the entry of a key without counting a hit.
    pub fn peek<Q>(&self, key: &Q) -> Option<Arc<Record<K, V>>>
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        let hash = self.inner.sampler.hash(key);
        self.inner.sampler.get(hash, key)
    }

    /// Whether the store holds an entry of a key.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        self.peek(key).is_some()
    }

    /// Remove the entry of a key.
    pub fn remove<Q>(&self, key: &Q) -> Option<Arc<Record<K, V>>>
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        let hash = self.inner.sampler.hash(key);
        let record = self.inner.sampler.remove(hash, key)?;
        self.on_removed(record)
    }

    /// Remove the entry of a key unless it is pinned.
    pub fn remove_if_not_pinned<Q>(&self, key: &Q) -> Option<Arc<Record<K, V>>>
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        let hash = self.inner.sampler.hash(key);
        let record = self
            .inner
            .sampler
            .remove_if(hash, key, |record| !record.is_pinned())?;
        self.on_removed(record)
    }

    fn on_removed(&self, record: Arc<Record<K, V>>) -> Option<Arc<Record<K, V>>> {
        self.inner.settle_removed(&record);
        self.inner.metrics.store_remove.increase(1);
        self.inner.metrics.store_usage.absolute(self.inner.accessor.size() as _);
        self.inner.notify(Event::Remove, std::slice::from_ref(&record));
        Some(record)
    }

    /// Remove all entries. Pinned keys stay pinned and apply to later inserts.
    pub fn clear(&self) {
        let records = self.inner.sampler.drain();
        for record in records.iter() {
            self.inner.settle_removed(record);
        }
        self.inner.metrics.store_usage.absolute(self.inner.accessor.size() as _);
        tracing::debug!("[store]: {} cleared {} entries", self.inner.name, records.len());
        self.inner.notify(Event::Clear, &records);
    }

    /// Pin or unpin a key.
    ///
    /// A key can be pinned before it is written, the pin applies when it is inserted. Unpinning a key that is
    /// neither pinned nor present fails with [`strata_common::error::ErrorKind::InvalidPinTransition`].
    pub fn set_pinned(&self, key: K, pinned: bool) -> Result<()> {
        let hash = self.inner.sampler.hash(&key);
        // The shard lock is held while the pin set changes, so a concurrent insert of the key sees either both or
        // neither.
        self.inner.sampler.inspect(hash, key, |key, record| {
            let mut pins = self.inner.pins.write();
            if pinned {
                if let Some(record) = record {
                    record.set_pinned(true);
                }
                pins.insert(key);
                return Ok(());
            }
            let tracked = pins.remove(&key);
            match record {
                Some(record) => {
                    record.set_pinned(false);
                    Ok(())
                }
                None if tracked => Ok(()),
                None => Err(Error::invalid_pin_transition(&key)),
            }
        })
    }

    /// Whether a key is pinned, either by itself or by pinning the whole store.
    pub fn is_pinned(&self, key: &K) -> bool {
        self.inner.tier_pinned || self.inner.pins.read().contains(key)
    }

    /// Keys pinned individually.
    pub fn pinned_keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.inner.pins.read().iter().cloned().collect_vec()
    }

    /// Unpin every individually pinned key.
    pub fn unpin_all(&self) {
        let keys = std::mem::take(&mut *self.inner.pins.write());
        for key in keys {
            let hash = self.inner.sampler.hash(&key);
            self.inner.sampler.inspect(hash, key, |key, record| {
                if let Some(record) = record {
                    // Pinned again meanwhile.
                    if !self.inner.pins.read().contains(&key) {
                        record.set_pinned(false);
                    }
                }
            });
        }
    }

    /// Whether the whole store is excluded from eviction.
    pub fn is_tier_pinned(&self) -> bool {
        self.inner.tier_pinned
    }

    /// Exact number of entries.
    pub fn len(&self) -> usize {
        self.inner.sampler.len()
    }

    /// Whether the store holds no entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Advisory number of entries, read without locking.
    pub fn quick_size(&self) -> usize {
        self.inner.sampler.quick_size()
    }

    /// Units the store has charged to its pool.
    pub fn usage(&self) -> usize {
        self.inner.accessor.size()
    }

    /// Snapshot of all entries.
    pub fn records(&self) -> Vec<Arc<Record<K, V>>> {
        self.inner.sampler.records()
    }

    /// Whether any measurement fell back to the shallow size.
    pub fn has_aborted_size_of(&self) -> bool {
        self.inner.aborted_size_of.load(Ordering::Acquire)
    }

    /// Name of the store.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Eviction policy of the store.
    pub fn policy(&self) -> &Arc<dyn EvictionPolicy> {
        &self.inner.policy
    }

    /// Metrics of the store.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }
}

impl<K, V, S> Participant for Store<K, V, S>
where
    K: Key,
    V: Value,
    S: HashBuilder,
{
    fn evict(&self, count: usize, bytes_hint: usize) -> bool {
        self.inner.evict(count, bytes_hint)
    }

    fn size(&self) -> usize {
        self.inner.size()
    }
}
