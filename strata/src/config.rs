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

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strata_common::error::{Error, ErrorKind, Result};
use strata_memory::{EvictionConfig, DEFAULT_SAMPLE_SIZE};
use strata_pool::{Pool, PoolBuilder, PoolUnit};
use strata_sizeof::{SizeOfConfig, SizeOfFilter};

/// Options of a [`crate::CacheManager`].
///
/// Every field is optional when decoded, missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capacity of the shared pool in bytes. Exclusive with `capacity_entries`.
    pub capacity_bytes: Option<usize>,
    /// Capacity of the shared pool in entries. Exclusive with `capacity_bytes`.
    pub capacity_entries: Option<usize>,
    /// Entries drawn per eviction.
    pub sample_size: usize,
    /// Fail a measurement that hits a limit instead of charging a partial size.
    pub abort_on_size_overflow: bool,
    /// Max objects visited per measurement, counting allocations and buffer elements.
    pub max_objects_visited: usize,
    /// Max nesting followed per measurement.
    pub max_depth: usize,
    /// Path of a size-of filter resource, see [`SizeOfFilter::parse`].
    pub size_filter: Option<PathBuf>,
    /// Shards of each store.
    pub shards: usize,
    /// Local eviction policy of each store.
    pub eviction: EvictionConfig,
}

impl Default for Config {
    fn default() -> Self {
        let size_of = SizeOfConfig::default();
        Self {
            capacity_bytes: None,
            capacity_entries: None,
            sample_size: DEFAULT_SAMPLE_SIZE,
            abort_on_size_overflow: size_of.abort_on_overflow,
            max_objects_visited: size_of.max_objects_visited,
            max_depth: size_of.max_depth,
            size_filter: None,
            shards: 16,
            eviction: EvictionConfig::default(),
        }
    }
}

impl Config {
    /// Check the options.
    pub fn validate(&self) -> Result<()> {
        if self.capacity_bytes.is_some() && self.capacity_entries.is_some() {
            return Err(Error::new(
                ErrorKind::Config,
                "capacity_bytes and capacity_entries are mutually exclusive",
            ));
        }
        for (name, value) in [
            ("sample_size", self.sample_size),
            ("shards", self.shards),
            ("max_objects_visited", self.max_objects_visited),
        ] {
            if value == 0 {
                return Err(Error::new(ErrorKind::Config, "option must be positive").with_context("option", name));
            }
        }
        Ok(())
    }

    /// Limits of the size-of engine.
    pub fn size_of_config(&self) -> SizeOfConfig {
        SizeOfConfig {
            max_objects_visited: self.max_objects_visited,
            max_depth: self.max_depth,
            abort_on_overflow: self.abort_on_size_overflow,
        }
    }

    /// Load the size-of filter, or an empty one if no resource is configured.
    pub fn size_of_filter(&self) -> Result<SizeOfFilter> {
        match self.size_filter.as_ref() {
            Some(path) => SizeOfFilter::from_file(path),
            None => Ok(SizeOfFilter::new()),
        }
    }

    /// Builder of the shared pool, `None` if the pool is unbounded.
    pub fn pool_builder(&self) -> Result<Option<PoolBuilder>> {
        self.validate()?;
        let builder = match (self.capacity_bytes, self.capacity_entries) {
            (Some(capacity), None) => Some(PoolBuilder::new(capacity).with_unit(PoolUnit::Bytes)),
            (None, Some(capacity)) => Some(PoolBuilder::new(capacity).with_unit(PoolUnit::Entries)),
            _ => None,
        };
        Ok(builder)
    }

    /// Build the shared pool with the default evictor and no metrics.
    pub fn pool(&self) -> Result<Pool> {
        Ok(self
            .pool_builder()?
            .map(|builder| builder.build())
            .unwrap_or_else(Pool::unbounded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.sample_size, 30);
        assert_eq!(config.max_objects_visited, 1000);
        assert_eq!(config.max_depth, 128);
        assert_eq!(config.shards, 16);
        assert!(!config.abort_on_size_overflow);
        assert_eq!(config.eviction, EvictionConfig::Lfu);
        assert!(!config.pool().unwrap().is_bounded());
    }

    #[test]
    fn test_decode() {
        let config: Config = serde_json::from_str(
            r#"{
                "capacity_entries": 100,
                "sample_size": 8,
                "abort_on_size_overflow": true,
                "eviction": "fifo",
                "size_filter": "/etc/strata/filter"
            }"#,
        )
        .unwrap();
        assert_eq!(config.eviction, EvictionConfig::Fifo);
        assert!(config.size_of_config().abort_on_overflow);

        let pool = config.pool().unwrap();
        assert!(pool.is_bounded());
        assert_eq!(pool.capacity(), 100);
        assert_eq!(pool.unit(), PoolUnit::Entries);
    }

    #[test]
    fn test_invalid() {
        let config = Config {
            capacity_bytes: Some(1),
            capacity_entries: Some(1),
            ..Default::default()
        };
        assert_eq!(config.pool().unwrap_err().kind(), ErrorKind::Config);

        let config = Config {
            sample_size: 0,
            ..Default::default()
        };
        let e = config.validate().unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Config);
        assert_eq!(e.context(), &[("option", "sample_size".to_string())]);
    }

    #[test]
    fn test_missing_filter_file() {
        let config = Config {
            size_filter: Some("/nonexistent/strata/filter".into()),
            ..Default::default()
        };
        assert_eq!(config.size_of_filter().unwrap_err().kind(), ErrorKind::Io);
    }
}
