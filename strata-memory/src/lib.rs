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

//! Pooled in-memory store tiers.
//!
//! A [`Store`] keeps its entries in a sharded [`Sampler`] and charges their measured size to a shared
//! [`strata_pool::Pool`]. When the pool runs over its capacity, stores are asked to evict and pick victims from
//! small random samples with a local [`EvictionPolicy`].

mod builder;
pub mod eviction;
mod record;
mod sampler;
mod store;

pub use builder::StoreBuilder;
pub use eviction::{EvictionConfig, EvictionPolicy, Fifo, Lfu, Lru, Stats, DEFAULT_SAMPLE_SIZE};
pub use record::{Data, Record};
pub use sampler::Sampler;
pub use store::{container_size, Store};
