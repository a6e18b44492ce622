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
    sync::{
        atomic::{AtomicBool, AtomicU64},
        Arc, Weak,
    },
};

use hashbrown::HashSet;
use parking_lot::RwLock;
use strata_common::{
    code::{DefaultHasher, HashBuilder, Key, Value},
    event::EventListener,
    metrics::{registry::noop::NoopMetricsRegistry, Metrics, RegistryOps},
};
use strata_pool::{Participant, Pool};
use strata_sizeof::{ConstantSizeOfEngine, SizeOfEngine};

use crate::{
    eviction::{EvictionConfig, EvictionPolicy, DEFAULT_SAMPLE_SIZE},
    sampler::Sampler,
    store::{container_size, Store, StoreInner},
};

/// Builder of a [`Store`].
pub struct StoreBuilder<K, V, S = DefaultHasher>
where
    K: Key,
    V: Value,
    S: HashBuilder,
{
    name: Cow<'static, str>,
    shards: usize,
    sample_size: usize,
    policy: Arc<dyn EvictionPolicy>,
    pinned: bool,
    hash_builder: S,
    size_of: Option<Arc<dyn SizeOfEngine<K, V>>>,
    event_listener: Option<Arc<dyn EventListener<Key = K, Value = V>>>,
    registry: Arc<dyn RegistryOps>,
}

impl<K, V> StoreBuilder<K, V>
where
    K: Key,
    V: Value,
{
    /// Create a store builder with the given name.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            shards: 16,
            sample_size: DEFAULT_SAMPLE_SIZE,
            policy: EvictionConfig::default().build(),
            pinned: false,
            hash_builder: DefaultHasher::default(),
            size_of: None,
            event_listener: None,
            registry: Arc::new(NoopMetricsRegistry),
        }
    }
}

impl<K, V, S> StoreBuilder<K, V, S>
where
    K: Key,
    V: Value,
    S: HashBuilder,
{
    /// Set the shard count of the sampler, rounded up to a power of two.
    ///
    /// Default: `16`.
    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Set the number of entries drawn per eviction.
    ///
    /// Default: `30`.
    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    /// Use one of the built-in eviction policies.
    pub fn with_eviction_config(mut self, config: EvictionConfig) -> Self {
        self.policy = config.build();
        self
    }

    /// Use a customized eviction policy.
    pub fn with_eviction_policy(mut self, policy: impl EvictionPolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Exclude the whole store from eviction.
    pub fn with_pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }

    /// Set the hash builder.
    pub fn with_hash_builder<OS>(self, hash_builder: OS) -> StoreBuilder<K, V, OS>
    where
        OS: HashBuilder,
    {
        StoreBuilder {
            name: self.name,
            shards: self.shards,
            sample_size: self.sample_size,
            policy: self.policy,
            pinned: self.pinned,
            hash_builder,
            size_of: self.size_of,
            event_listener: self.event_listener,
            registry: self.registry,
        }
    }

    /// Set the engine entries are measured with.
    ///
    /// Default: a constant engine charging the shallow size of key and value.
    pub fn with_size_of_engine(mut self, engine: impl SizeOfEngine<K, V>) -> Self {
        self.size_of = Some(Arc::new(engine));
        self
    }

    /// Set the listener notified when entries leave the store.
    pub fn with_event_listener(mut self, listener: Arc<dyn EventListener<Key = K, Value = V>>) -> Self {
        self.event_listener = Some(listener);
        self
    }

    /// Set the metrics registry.
    pub fn with_metrics_registry(mut self, registry: Arc<dyn RegistryOps>) -> Self {
        self.registry = registry;
        self
    }

    /// Build the store and register it with `pool`.
    pub fn build(self, pool: &Pool) -> Store<K, V, S> {
        assert!(self.sample_size > 0, "sample size must be positive");

        let size_of = self.size_of.unwrap_or_else(|| {
            Arc::new(ConstantSizeOfEngine::new(
                std::mem::size_of::<K>(),
                std::mem::size_of::<V>(),
                container_size::<K, V>(),
            ))
        });
        let metrics = Arc::new(Metrics::new(self.name.clone(), self.registry.as_ref()));

        tracing::debug!(
            "[store]: build {}, pool: {}, shards: {}, sample size: {}, policy: {}, pinned: {}",
            self.name,
            pool.name(),
            self.shards,
            self.sample_size,
            self.policy.name(),
            self.pinned
        );

        let inner = Arc::new_cyclic(|this: &Weak<StoreInner<K, V, S>>| {
            let participant: Weak<dyn Participant> = this.clone();
            StoreInner {
                name: self.name,
                sampler: Sampler::new(self.shards, self.hash_builder),
                pins: RwLock::new(HashSet::new()),
                tier_pinned: self.pinned,
                policy: self.policy,
                sample_size: self.sample_size,
                size_of,
                accessor: pool.register(participant),
                clock: AtomicU64::new(0),
                aborted_size_of: AtomicBool::new(false),
                event_listener: self.event_listener,
                metrics,
            }
        });

        Store { inner }
    }
}
