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

//! Pinned entries survive any eviction pressure.

use rand::{rngs::SmallRng, Rng, SeedableRng};
use strata::{ErrorKind, EvictionConfig, Pool, PoolUnit, Store, StoreBuilder};

fn run(eviction: EvictionConfig, seed: u64) {
    let pool = Pool::builder(100).with_unit(PoolUnit::Entries).build();
    let store: Store<u64, u64> = StoreBuilder::new("pinning")
        .with_sample_size(8)
        .with_eviction_config(eviction)
        .build(&pool);
    let mut rng = SmallRng::seed_from_u64(seed);

    // Some keys are pinned before they are written, some after.
    for key in 0..10u64 {
        store.set_pinned(key, true).unwrap();
        store.insert(key, key);
    }
    for key in 10..20u64 {
        store.insert(key, key);
        store.set_pinned(key, true).unwrap();
    }

    for _ in 0..10_000 {
        let key: u64 = rng.random_range(20..1000);
        store.insert(key, key);
        let key: u64 = rng.random_range(20..1000);
        store.get(&key);
    }

    for key in 0..20u64 {
        assert!(store.contains(&key), "pinned key {key} evicted with {eviction:?}");
        assert!(store.peek(&key).unwrap().is_pinned());
    }
    assert!(store.len() <= 100);
    assert_eq!(pool.used(), store.len());

    // Unpinned entries become eligible on the next pass.
    store.unpin_all();
    assert!(store.pinned_keys().is_empty());
    for key in 1000..1100u64 {
        store.insert(key, key);
    }
    assert!((0..20u64).any(|key| !store.contains(&key)));
}

#[test_log::test]
fn test_pinning_lfu() {
    run(EvictionConfig::Lfu, 1);
}

#[test_log::test]
fn test_pinning_lru() {
    run(EvictionConfig::Lru, 2);
}

#[test_log::test]
fn test_pinning_fifo() {
    run(EvictionConfig::Fifo, 3);
}

#[test]
fn test_hits_do_not_protect_from_eviction_but_pins_do() {
    let pool = Pool::builder(10).with_unit(PoolUnit::Entries).build();
    let store: Store<u64, u64> = StoreBuilder::new("hits").build(&pool);
    for key in 0..10u64 {
        store.insert(key, key);
    }
    // The hottest entries are candidates once everything else is pinned.
    for key in 0..5u64 {
        for _ in 0..100 {
            store.get(&key);
        }
    }
    for key in 5..10u64 {
        store.set_pinned(key, true).unwrap();
    }
    store.insert(10, 10);
    assert_eq!(store.len(), 10);
    assert_eq!((0..5u64).filter(|key| store.contains(key)).count(), 4);
    assert!((5..11u64).all(|key| store.contains(&key)));
}

#[test]
fn test_invalid_pin_transition() {
    let store: Store<u64, u64> = StoreBuilder::new("invalid").build(&Pool::unbounded());
    let e = store.set_pinned(7, false).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::InvalidPinTransition);
    assert_eq!(e.context(), &[("key", "7".to_string())]);
}
