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
    fmt::Debug,
    sync::atomic::{AtomicU64, Ordering},
};

use bitflags::bitflags;

use crate::eviction::Stats;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub(crate) struct Flags: u64 {
        const IN_SAMPLER = 0b00000001;
        const CHARGED = 0b00000010;
        const PINNED = 0b00000100;
    }
}

/// The data a [`Record`] is created with.
pub struct Data<K, V> {
    /// Entry key.
    pub key: K,
    /// Entry value.
    pub value: V,
    /// Hash of the key.
    pub hash: u64,
    /// Measured bytes of the entry.
    pub weight: usize,
    /// Units charged to the pool for the entry.
    pub charge: usize,
}

/// [`Record`] holds a stored entry and its eviction statistics.
///
/// A record is charged to the pool only after it is published. Whoever observes the record both charged and removed
/// from the sampler first is responsible for crediting its charge back, see [`Record::mark_charged`] and
/// [`Record::mark_removed`].
pub struct Record<K, V> {
    data: Data<K, V>,
    created_at: u64,
    last_accessed_at: AtomicU64,
    hits: AtomicU64,
    flags: AtomicU64,
}

impl<K, V> Debug for Record<K, V>
where
    K: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("key", &self.data.key)
            .field("hash", &self.data.hash)
            .field("charge", &self.data.charge)
            .field("hits", &self.hits())
            .field("flags", &Flags::from_bits_truncate(self.flags.load(Ordering::Relaxed)))
            .finish()
    }
}

impl<K, V> Record<K, V> {
    /// Create a record created at logical time `tick`.
    pub fn new(data: Data<K, V>, tick: u64) -> Self {
        Self {
            data,
            created_at: tick,
            last_accessed_at: AtomicU64::new(tick),
            hits: AtomicU64::new(0),
            flags: AtomicU64::new(0),
        }
    }

    /// Get the immutable reference of the record key.
    pub fn key(&self) -> &K {
        &self.data.key
    }

    /// Get the immutable reference of the record value.
    pub fn value(&self) -> &V {
        &self.data.value
    }

    /// Get the record hash.
    pub fn hash(&self) -> u64 {
        self.data.hash
    }

    /// Get the measured bytes of the record.
    pub fn weight(&self) -> usize {
        self.data.weight
    }

    /// Get the units charged to the pool for the record.
    pub fn charge(&self) -> usize {
        self.data.charge
    }

    /// Get the hit count.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Logical time of creation. A replacement creates a new record.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Logical time of the last hit, or of creation if never hit.
    pub fn last_accessed_at(&self) -> u64 {
        self.last_accessed_at.load(Ordering::Relaxed)
    }

    /// Count a hit at logical time `tick`.
    pub fn hit(&self, tick: u64) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.last_accessed_at.fetch_max(tick, Ordering::Relaxed);
    }

    /// Reset the hit count. Hits are otherwise monotonic.
    pub fn reset_hits(&self) {
        self.hits.store(0, Ordering::Relaxed);
    }

    /// Snapshot of the statistics eviction policies score on.
    pub fn stats(&self) -> Stats {
        Stats {
            hits: self.hits(),
            created_at: self.created_at,
            last_accessed_at: self.last_accessed_at(),
            weight: self.data.weight,
        }
    }

    /// Whether the record is excluded from eviction.
    pub fn is_pinned(&self) -> bool {
        self.get_flags(Flags::PINNED, Ordering::Acquire)
    }

    /// Set the pinned flag.
    pub fn set_pinned(&self, val: bool) {
        self.set_flags(Flags::PINNED, val, Ordering::Release);
    }

    /// Whether the record is published in the sampler.
    pub fn is_in_sampler(&self) -> bool {
        self.get_flags(Flags::IN_SAMPLER, Ordering::Acquire)
    }

    /// Whether the charge of the record has been reserved from the pool.
    pub fn is_charged(&self) -> bool {
        self.get_flags(Flags::CHARGED, Ordering::Acquire)
    }

    /// Whether the record can be chosen as a victim.
    pub fn is_evictable(&self) -> bool {
        let flags = Flags::from_bits_truncate(self.flags.load(Ordering::Acquire));
        flags.contains(Flags::IN_SAMPLER | Flags::CHARGED) && !flags.contains(Flags::PINNED)
    }

    /// Mark the record as published in the sampler.
    pub(crate) fn mark_published(&self) {
        self.set_flags(Flags::IN_SAMPLER, true, Ordering::Release);
    }

    /// Mark the record as charged.
    ///
    /// Returns `false` if the record has already been removed, in which case the caller must credit the charge back.
    pub(crate) fn mark_charged(&self) -> bool {
        let prev = Flags::from_bits_truncate(self.flags.fetch_or(Flags::CHARGED.bits(), Ordering::AcqRel));
        prev.contains(Flags::IN_SAMPLER)
    }

    /// Mark the record as removed from the sampler.
    ///
    /// Returns `true` if the record was charged, in which case the caller must credit the charge back.
    pub(crate) fn mark_removed(&self) -> bool {
        let prev = Flags::from_bits_truncate(self.flags.fetch_and(!Flags::IN_SAMPLER.bits(), Ordering::AcqRel));
        prev.contains(Flags::IN_SAMPLER) && prev.contains(Flags::CHARGED)
    }

    /// Set flags with given memory order.
    #[inline(always)]
    fn set_flags(&self, flags: Flags, val: bool, order: Ordering) {
        if val {
            self.flags.fetch_or(flags.bits(), order);
        } else {
            self.flags.fetch_and(!flags.bits(), order);
        }
    }

    /// Get flags with given memory order.
    #[inline(always)]
    fn get_flags(&self, flags: Flags, order: Ordering) -> bool {
        self.flags.load(order) & flags.bits() == flags.bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: u64) -> Record<u64, u64> {
        Record::new(
            Data {
                key,
                value: key,
                hash: key,
                weight: 8,
                charge: 8,
            },
            7,
        )
    }

    #[test]
    fn test_hits_and_ticks() {
        let r = record(1);
        assert_eq!(r.created_at(), 7);
        assert_eq!(r.last_accessed_at(), 7);

        r.hit(9);
        r.hit(8);
        assert_eq!(r.hits(), 2);
        assert_eq!(r.last_accessed_at(), 9);

        r.reset_hits();
        assert_eq!(r.stats().hits, 0);
        assert_eq!(r.stats().last_accessed_at, 9);
    }

    #[test]
    fn test_charge_settled_once_when_removed_first() {
        let r = record(1);
        r.mark_published();
        // Removed before the writer charges it: nothing to credit on removal, the writer credits.
        assert!(!r.mark_removed());
        assert!(!r.mark_charged());
    }

    #[test]
    fn test_charge_settled_once_when_charged_first() {
        let r = record(1);
        r.mark_published();
        assert!(r.mark_charged());
        assert!(r.is_evictable());
        assert!(r.mark_removed());
        assert!(!r.mark_removed());
        assert!(!r.is_evictable());
    }

    #[test]
    fn test_pinned_is_not_evictable() {
        let r = record(1);
        r.mark_published();
        r.mark_charged();
        r.set_pinned(true);
        assert!(!r.is_evictable());
        r.set_pinned(false);
        assert!(r.is_evictable());
    }
}
