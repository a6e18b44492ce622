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
    fmt::Debug,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc, Weak,
    },
    time::Instant,
};

use arc_swap::ArcSwap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strata_common::{
    metrics::{registry::noop::NoopMetricsRegistry, Metrics, RegistryOps},
    strict_assert,
};

use crate::{
    evictor::{Evictor, FromLargestEvictor},
    participant::Participant,
};

/// Max rounds of eviction a single reservation runs before tolerating the overshoot.
const MAX_EVICTION_ROUNDS: usize = 4;

/// The unit a pool counts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolUnit {
    /// Measured bytes of the stored entries.
    #[default]
    Bytes,
    /// Number of stored entries.
    Entries,
}

#[derive(Debug, Clone)]
struct Registration {
    id: u64,
    participant: Weak<dyn Participant>,
}

struct PoolInner {
    name: Cow<'static, str>,
    unit: PoolUnit,
    bounded: bool,

    capacity: AtomicUsize,
    used: AtomicUsize,

    evictor: Arc<dyn Evictor>,
    registrations: ArcSwap<Vec<Registration>>,
    next_id: AtomicU64,

    metrics: Arc<Metrics>,
}

impl Debug for PoolInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.name)
            .field("unit", &self.unit)
            .field("bounded", &self.bounded)
            .field("capacity", &self.capacity.load(Ordering::Relaxed))
            .field("used", &self.used.load(Ordering::Relaxed))
            .field("evictor", &self.evictor)
            .field("participants", &self.registrations.load().len())
            .finish()
    }
}

impl PoolInner {
    fn participants(&self) -> Vec<Arc<dyn Participant>> {
        self.registrations
            .load()
            .iter()
            .filter_map(|registration| registration.participant.upgrade())
            .collect_vec()
    }

    fn add_used(&self, delta: usize) -> usize {
        let used = self.used.fetch_add(delta, Ordering::AcqRel) + delta;
        self.metrics.pool_used.absolute(used as _);
        used
    }

    fn sub_used(&self, delta: usize) {
        let old = self
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| Some(used.saturating_sub(delta)))
            .unwrap_or_else(|used| used);
        strict_assert!(old >= delta, "pool {} releases {delta} while only {old} is used", self.name);
        self.metrics.pool_used.absolute(old.saturating_sub(delta) as _);
    }

    /// Bring usage back under capacity by freeing space on the calling thread.
    ///
    /// Returns `false` if the pool stays over its capacity.
    fn enforce(&self, mut used: usize) -> bool {
        if !self.bounded {
            return true;
        }

        let mut rounds = 0;
        loop {
            let capacity = self.capacity.load(Ordering::Acquire);
            if used <= capacity {
                return true;
            }
            if rounds == MAX_EVICTION_ROUNDS {
                break;
            }
            rounds += 1;

            let amount = used - capacity;
            let participants = self.participants();
            let start = Instant::now();
            let freed = self.evictor.free_space(&participants, amount);
            self.metrics.pool_free_space.increase(1);
            self.metrics
                .pool_free_space_duration
                .record(start.elapsed().as_secs_f64());

            if !freed {
                self.metrics.pool_exhausted.increase(1);
                tracing::debug!(
                    "[pool]: {} exhausted eviction, amount: {amount}, participants: {}",
                    self.name,
                    participants.len()
                );
                break;
            }
            used = self.used.load(Ordering::Acquire);
        }

        self.metrics.pool_overshoot.increase(1);
        tracing::debug!(
            "[pool]: {} tolerates overshoot, used: {}, capacity: {}",
            self.name,
            self.used.load(Ordering::Relaxed),
            self.capacity.load(Ordering::Relaxed)
        );
        false
    }

    fn unregister(&self, id: u64) {
        self.registrations.rcu(|registrations| {
            registrations
                .iter()
                .filter(|registration| registration.id != id)
                .cloned()
                .collect_vec()
        });
    }
}

/// Builder of a bounded [`Pool`].
pub struct PoolBuilder {
    name: Cow<'static, str>,
    capacity: usize,
    unit: PoolUnit,
    evictor: Arc<dyn Evictor>,
    registry: Arc<dyn RegistryOps>,
}

impl PoolBuilder {
    /// Create a pool builder with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            name: "strata".into(),
            capacity,
            unit: PoolUnit::default(),
            evictor: Arc::new(FromLargestEvictor),
            registry: Arc::new(NoopMetricsRegistry),
        }
    }

    /// Set the name of the pool, used as the metrics label.
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the unit the capacity is counted in.
    pub fn with_unit(mut self, unit: PoolUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Set the evictor that frees space when the pool is over its capacity.
    ///
    /// Default: [`FromLargestEvictor`].
    pub fn with_evictor(mut self, evictor: impl Evictor) -> Self {
        self.evictor = Arc::new(evictor);
        self
    }

    /// Set the metrics registry.
    pub fn with_metrics_registry(mut self, registry: Arc<dyn RegistryOps>) -> Self {
        self.registry = registry;
        self
    }

    /// Build the pool.
    pub fn build(self) -> Pool {
        let metrics = Arc::new(Metrics::new(self.name.clone(), self.registry.as_ref()));
        Pool::new(self.name, self.unit, true, self.capacity, self.evictor, metrics)
    }
}

/// A capacity shared by many participants.
///
/// Reservations never fail for a linked accessor. A reservation that pushes usage over the capacity frees space
/// through the evictor on the calling thread first, and the pool tolerates whatever remains.
#[derive(Debug, Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    fn new(
        name: Cow<'static, str>,
        unit: PoolUnit,
        bounded: bool,
        capacity: usize,
        evictor: Arc<dyn Evictor>,
        metrics: Arc<Metrics>,
    ) -> Self {
        tracing::debug!("[pool]: create pool {name}, unit: {unit:?}, bounded: {bounded}, capacity: {capacity}");
        Self {
            inner: Arc::new(PoolInner {
                name,
                unit,
                bounded,
                capacity: AtomicUsize::new(capacity),
                used: AtomicUsize::new(0),
                evictor,
                registrations: ArcSwap::from_pointee(vec![]),
                next_id: AtomicU64::new(0),
                metrics,
            }),
        }
    }

    /// Create a builder of a bounded pool with the given capacity.
    pub fn builder(capacity: usize) -> PoolBuilder {
        PoolBuilder::new(capacity)
    }

    /// Create a pool that tracks usage and never evicts.
    pub fn unbounded() -> Self {
        Self::new(
            "unbounded".into(),
            PoolUnit::Bytes,
            false,
            usize::MAX,
            Arc::new(FromLargestEvictor),
            Arc::new(Metrics::noop()),
        )
    }

    /// Register a participant and return the accessor it charges the pool through.
    ///
    /// The pool only keeps a weak reference, the participant is skipped by the evictor once dropped.
    pub fn register(&self, participant: Weak<dyn Participant>) -> Accessor {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let registration = Registration { id, participant };
        self.inner.registrations.rcu(|registrations| {
            let mut registrations = Vec::clone(registrations);
            registrations.push(registration.clone());
            registrations
        });
        tracing::debug!("[pool]: {} registers participant {id}", self.inner.name);
        Accessor {
            id,
            pool: self.inner.clone(),
            size: AtomicUsize::new(0),
            linked: AtomicBool::new(true),
        }
    }

    /// Change the capacity. Space is freed on the calling thread if usage exceeds the new capacity.
    pub fn set_capacity(&self, capacity: usize) {
        if !self.inner.bounded {
            return;
        }
        self.inner.capacity.store(capacity, Ordering::Release);
        tracing::debug!("[pool]: {} resizes to {capacity}", self.inner.name);
        self.inner.enforce(self.used());
    }

    /// Name of the pool.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Unit of the pool.
    pub fn unit(&self) -> PoolUnit {
        self.inner.unit
    }

    /// Whether the pool evicts at all.
    pub fn is_bounded(&self) -> bool {
        self.inner.bounded
    }

    /// Capacity of the pool.
    pub fn capacity(&self) -> usize {
        self.inner.capacity.load(Ordering::Acquire)
    }

    /// Units charged by all participants.
    pub fn used(&self) -> usize {
        self.inner.used.load(Ordering::Acquire)
    }

    /// Units left before the pool has to evict.
    pub fn available(&self) -> usize {
        self.capacity().saturating_sub(self.used())
    }

    /// Number of live participants.
    pub fn participants(&self) -> usize {
        self.inner.participants().len()
    }

    /// Metrics of the pool.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }
}

/// The handle a participant charges and credits a pool through.
///
/// Dropping the accessor unlinks it.
#[derive(Debug)]
pub struct Accessor {
    id: u64,
    pool: Arc<PoolInner>,
    size: AtomicUsize,
    linked: AtomicBool,
}

impl Accessor {
    /// Charge `delta` units.
    ///
    /// Frees space through the pool's evictor before returning if the pool goes over its capacity. Returns `false`
    /// only if the accessor has been unlinked, in which case nothing is charged.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "strata::pool::accessor::reserve"))]
    pub fn reserve(&self, delta: usize) -> bool {
        if !self.linked.load(Ordering::Acquire) {
            tracing::warn!("[pool]: reserve {delta} through unlinked accessor {}", self.id);
            return false;
        }
        if delta == 0 {
            return true;
        }

        // Charge the pool before the accessor so pool usage never drops below the sum of accessor sizes.
        let used = self.pool.add_used(delta);
        self.size.fetch_add(delta, Ordering::AcqRel);
        self.pool.metrics.pool_reserve.increase(1);

        if used > self.pool.capacity.load(Ordering::Acquire) {
            tracing::trace!(
                "[pool]: accessor {} reserves {delta}, pool {} over capacity, used: {used}",
                self.id,
                self.pool.name
            );
            self.pool.enforce(used);
        }
        true
    }

    /// Credit `delta` units back. Releasing more than the accessor holds releases what it holds.
    pub fn release(&self, delta: usize) {
        if delta == 0 {
            return;
        }
        let old = self
            .size
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |size| Some(size.saturating_sub(delta)))
            .unwrap_or_else(|size| size);
        let released = old.min(delta);
        if released < delta && self.linked.load(Ordering::Acquire) {
            tracing::warn!(
                "[pool]: accessor {} releases {delta} while holding {old}, accounting drifted",
                self.id
            );
        }
        self.pool.sub_used(released);
        self.pool.metrics.pool_release.increase(1);
    }

    /// Whether `delta` more units fit without eviction.
    pub fn can_reserve_without_evicting(&self, delta: usize) -> bool {
        !self.pool.bounded
            || self
                .pool
                .used
                .load(Ordering::Acquire)
                .checked_add(delta)
                .is_some_and(|used| used <= self.pool.capacity.load(Ordering::Acquire))
    }

    /// Units held by the accessor.
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    /// Release everything the accessor holds.
    pub fn clear(&self) {
        let size = self.size.swap(0, Ordering::AcqRel);
        self.pool.sub_used(size);
    }

    /// Whether the accessor is still linked to its pool.
    pub fn is_linked(&self) -> bool {
        self.linked.load(Ordering::Acquire)
    }

    /// Unit of the pool.
    pub fn unit(&self) -> PoolUnit {
        self.pool.unit
    }

    /// Detach from the pool: unregister the participant and release everything the accessor holds.
    ///
    /// Idempotent.
    pub fn unlink(&self) {
        if !self.linked.swap(false, Ordering::AcqRel) {
            return;
        }
        self.pool.unregister(self.id);
        let size = self.size.swap(0, Ordering::AcqRel);
        self.pool.sub_used(size);
        tracing::debug!("[pool]: {} unlinks participant {}, released: {size}", self.pool.name, self.id);
    }
}

impl Drop for Accessor {
    fn drop(&mut self) {
        self.unlink();
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    use super::*;
    use crate::test_utils::MockParticipant;

    fn is_send_sync_static<T: Send + Sync + 'static>() {}

    #[test]
    fn test_send_sync_static() {
        is_send_sync_static::<Pool>();
        is_send_sync_static::<Accessor>();
    }

    #[test_log::test]
    fn test_reserve_under_capacity() {
        let pool = Pool::builder(100).build();
        let p = MockParticipant::new(&pool);

        for _ in 0..10 {
            assert!(p.push(10));
        }
        assert_eq!(pool.used(), 100);
        assert_eq!(pool.available(), 0);
        assert_eq!(p.evict_calls(), 0);
        assert_eq!(p.len(), 10);
    }

    #[test_log::test]
    fn test_reserve_evicts_from_largest() {
        let pool = Pool::builder(100).build();
        let large = MockParticipant::new(&pool);
        let small = MockParticipant::new(&pool);

        for _ in 0..6 {
            large.push(10);
        }
        for _ in 0..4 {
            small.push(10);
        }
        assert_eq!(pool.used(), 100);

        assert!(small.push(10));
        assert_eq!(large.evict_calls(), 1);
        assert_eq!(small.evict_calls(), 0);
        assert_eq!(large.len(), 5);
        assert_eq!(small.len(), 5);
        assert_eq!(pool.used(), 100);
    }

    #[test_log::test]
    fn test_overshoot_when_exhausted() {
        let pool = Pool::builder(20).build();
        let a = MockParticipant::new(&pool);
        let b = MockParticipant::new(&pool);
        a.set_evictable(false);
        b.set_evictable(false);

        a.push(10);
        b.push(10);
        assert!(a.push(10));

        // Each participant is asked once, then the overshoot is tolerated.
        assert_eq!(a.evict_calls(), 1);
        assert_eq!(b.evict_calls(), 1);
        assert_eq!(pool.used(), 30);
    }

    #[test_log::test]
    fn test_release_saturates() {
        let pool = Pool::builder(100).build();
        let p = MockParticipant::new(&pool);
        let q = MockParticipant::new(&pool);
        p.push(10);
        q.push(10);

        p.accessor().release(25);
        assert_eq!(p.accessor().size(), 0);
        assert_eq!(pool.used(), 10);
    }

    #[test_log::test]
    fn test_unlink() {
        let pool = Pool::builder(100).build();
        let p = MockParticipant::new(&pool);
        let q = MockParticipant::new(&pool);
        p.push(30);
        q.push(20);
        assert_eq!(pool.participants(), 2);

        p.accessor().unlink();
        p.accessor().unlink();
        assert!(!p.accessor().is_linked());
        assert!(!p.accessor().reserve(10));
        assert_eq!(pool.used(), 20);
        assert_eq!(pool.participants(), 1);

        drop(q);
        assert_eq!(pool.used(), 0);
        assert_eq!(pool.participants(), 0);
    }

    #[test_log::test]
    fn test_set_capacity() {
        let pool = Pool::builder(100).build();
        let p = MockParticipant::new(&pool);
        for _ in 0..10 {
            p.push(10);
        }

        pool.set_capacity(55);
        assert_eq!(pool.capacity(), 55);
        assert!(pool.used() <= 55);
        assert_eq!(p.len(), 5);
    }

    #[test_log::test]
    fn test_unbounded() {
        let pool = Pool::unbounded();
        let p = MockParticipant::new(&pool);
        for _ in 0..1000 {
            assert!(p.push(1 << 20));
        }
        assert_eq!(p.evict_calls(), 0);
        assert_eq!(pool.used(), 1000 << 20);
        assert!(p.accessor().can_reserve_without_evicting(usize::MAX));
    }

    #[test_log::test]
    fn test_can_reserve_without_evicting() {
        let pool = Pool::builder(100).with_unit(PoolUnit::Entries).build();
        let p = MockParticipant::new(&pool);
        p.push(60);
        assert!(p.accessor().can_reserve_without_evicting(40));
        assert!(!p.accessor().can_reserve_without_evicting(41));
        assert!(!p.accessor().can_reserve_without_evicting(usize::MAX));
        assert_eq!(p.accessor().unit(), PoolUnit::Entries);
    }

    #[test_log::test]
    fn test_concurrent_reserve() {
        const CAPACITY: usize = 1 << 16;

        let pool = Pool::builder(CAPACITY).build();
        let participants = (0..4).map(|_| MockParticipant::new(&pool)).collect_vec();

        std::thread::scope(|s| {
            for (i, p) in participants.iter().enumerate() {
                s.spawn(move || {
                    let mut rng = SmallRng::seed_from_u64(i as u64);
                    for _ in 0..1000 {
                        assert!(p.push(rng.random_range(1..=256)));
                    }
                });
            }
        });

        let held: usize = participants.iter().map(|p| p.accessor().size()).sum();
        assert_eq!(pool.used(), held);
        assert!(pool.used() <= CAPACITY);
    }

    #[test]
    fn test_unit_serde() {
        assert_eq!(serde_json::to_string(&PoolUnit::Entries).unwrap(), r#""entries""#);
        assert_eq!(serde_json::from_str::<PoolUnit>(r#""bytes""#).unwrap(), PoolUnit::Bytes);
    }
}
