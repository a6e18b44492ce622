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

//! Commonly used types of strata.

pub use strata_common::{
    code::{DefaultHasher, HashBuilder, Key, Value},
    error::{Error, ErrorKind, Result},
    event::{Event, EventListener},
    metrics::{registry::noop::NoopMetricsRegistry, Metrics, RegistryOps},
};
#[cfg(feature = "prometheus")]
pub use strata_common::metrics::registry::prometheus::PrometheusMetricsRegistry;
pub use strata_memory::{
    container_size, EvictionConfig, EvictionPolicy, Fifo, Lfu, Lru, Record, Sampler, Stats, Store, StoreBuilder,
    DEFAULT_SAMPLE_SIZE,
};
pub use strata_pool::{Accessor, Evictor, FromLargestEvictor, Participant, Pool, PoolBuilder, PoolUnit};
pub use strata_sizeof::{
    ConstantSizeOfEngine, DefaultSizeOfEngine, Measurement, Size, SizeOf, SizeOfConfig, SizeOfEngine, SizeOfFilter,
    Walker,
};

pub use crate::{
    config::Config,
    manager::{CacheManager, CacheManagerBuilder},
};
