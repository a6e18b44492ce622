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

use std::{borrow::Cow, sync::Arc};

use strata_common::{
    code::{Key, Value},
    error::Result,
    metrics::{registry::noop::NoopMetricsRegistry, RegistryOps},
};
use strata_memory::{Store, StoreBuilder};
use strata_pool::{Evictor, FromLargestEvictor, Pool};
use strata_sizeof::{DefaultSizeOfEngine, SizeOf};

use crate::config::Config;

/// Builder of a [`CacheManager`].
#[derive(Debug)]
pub struct CacheManagerBuilder {
    name: Cow<'static, str>,
    config: Config,
    evictor: Arc<dyn Evictor>,
    registry: Arc<dyn RegistryOps>,
}

impl Default for CacheManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheManagerBuilder {
    /// Create a cache manager builder with the default config.
    pub fn new() -> Self {
        Self {
            name: "strata".into(),
            config: Config::default(),
            evictor: Arc::new(FromLargestEvictor),
            registry: Arc::new(NoopMetricsRegistry),
        }
    }

    /// Set the name of the shared pool.
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the config.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the evictor of the shared pool.
    ///
    /// Default: [`FromLargestEvictor`].
    pub fn with_evictor(mut self, evictor: impl Evictor) -> Self {
        self.evictor = Arc::new(evictor);
        self
    }

    /// Set the metrics registry shared by the pool and every store.
    pub fn with_metrics_registry(mut self, registry: Arc<dyn RegistryOps>) -> Self {
        self.registry = registry;
        self
    }

    /// Build the cache manager. Loads the size-of filter resource if one is configured.
    pub fn build(self) -> Result<CacheManager> {
        let filter = Arc::new(self.config.size_of_filter()?);
        let engine = DefaultSizeOfEngine::new(self.config.size_of_config(), filter);

        let pool = match self.config.pool_builder()? {
            Some(builder) => builder
                .with_name(self.name)
                .with_evictor(self.evictor)
                .with_metrics_registry(self.registry.clone())
                .build(),
            None => Pool::unbounded(),
        };

        tracing::info!(
            "[manager]: build cache manager, pool: {}, bounded: {}, capacity: {}, unit: {:?}",
            pool.name(),
            pool.is_bounded(),
            pool.capacity(),
            pool.unit()
        );

        Ok(CacheManager {
            config: self.config,
            pool,
            engine,
            registry: self.registry,
        })
    }
}

/// Owner of one shared pool and factory of the stores charging it.
#[derive(Debug)]
pub struct CacheManager {
    config: Config,
    pool: Pool,
    engine: DefaultSizeOfEngine,
    registry: Arc<dyn RegistryOps>,
}

impl CacheManager {
    /// Create a cache manager builder.
    pub fn builder() -> CacheManagerBuilder {
        CacheManagerBuilder::new()
    }

    /// Create a store measured with the deep size-of engine and configured by the manager config.
    pub fn cache<K, V>(&self, name: impl Into<Cow<'static, str>>) -> Store<K, V>
    where
        K: Key + SizeOf,
        V: Value + SizeOf,
    {
        self.store_builder(name)
            .with_size_of_engine(self.engine.clone())
            .build(&self.pool)
    }

    /// Create a store builder configured by the manager config, to customize before building against
    /// [`CacheManager::pool`].
    ///
    /// Without a size-of engine set, the store charges the shallow size of its entries.
    pub fn store_builder<K, V>(&self, name: impl Into<Cow<'static, str>>) -> StoreBuilder<K, V>
    where
        K: Key,
        V: Value,
    {
        StoreBuilder::new(name)
            .with_shards(self.config.shards)
            .with_sample_size(self.config.sample_size)
            .with_eviction_config(self.config.eviction)
            .with_metrics_registry(self.registry.clone())
    }

    /// The shared pool.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// The config the manager was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The deep size-of engine of the manager.
    pub fn size_of_engine(&self) -> &DefaultSizeOfEngine {
        &self.engine
    }
}
