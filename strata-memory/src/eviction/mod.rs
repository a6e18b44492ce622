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

use std::{fmt::Debug, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::record::Record;

pub mod fifo;
pub mod lfu;
pub mod lru;

pub use fifo::Fifo;
pub use lfu::Lfu;
pub use lru::Lru;

/// Default number of records drawn per eviction.
pub const DEFAULT_SAMPLE_SIZE: usize = 30;

/// Statistics of a record that eviction policies score on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    /// Hit count.
    pub hits: u64,
    /// Logical time of creation.
    pub created_at: u64,
    /// Logical time of the last hit.
    pub last_accessed_at: u64,
    /// Measured bytes.
    pub weight: usize,
}

/// A local eviction policy scores records, the sampled record with the lowest score is the victim.
///
/// Policies only see a small random sample, they never keep global order.
pub trait EvictionPolicy: Send + Sync + 'static + Debug {
    /// Name of the policy.
    fn name(&self) -> &'static str;

    /// Score a record. Lower is evicted first.
    fn score(&self, stats: &Stats) -> u64;
}

/// Number of records to draw from a population.
pub fn sample_size(population: usize, configured: usize) -> usize {
    population.min(configured)
}

/// Choose the victim among `sample`.
///
/// Records that are pinned, not yet charged, or already removed are skipped, and so is `just_added` unless it is
/// the whole population. Ties go to the record sampled first.
pub fn select<'a, K, V>(
    policy: &dyn EvictionPolicy,
    population: usize,
    sample: &'a [Arc<Record<K, V>>],
    just_added: Option<&'a Arc<Record<K, V>>>,
) -> Option<&'a Arc<Record<K, V>>> {
    if population == 1 {
        if let Some(record) = just_added {
            return Some(record);
        }
    }
    sample
        .iter()
        .filter(|record| record.is_evictable() && !just_added.is_some_and(|j| Arc::ptr_eq(j, *record)))
        .min_by_key(|record| policy.score(&record.stats()))
}

/// Eviction policy config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionConfig {
    /// Evict the least frequently hit.
    #[default]
    Lfu,
    /// Evict the least recently hit.
    Lru,
    /// Evict the oldest.
    Fifo,
}

impl EvictionConfig {
    /// Build the policy.
    pub fn build(&self) -> Arc<dyn EvictionPolicy> {
        match self {
            EvictionConfig::Lfu => Arc::new(Lfu),
            EvictionConfig::Lru => Arc::new(Lru),
            EvictionConfig::Fifo => Arc::new(Fifo),
        }
    }
}
