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

use strata_common::error::Result;

use crate::{
    filter::SizeOfFilter,
    walker::{Measurement, SizeOf, SizeOfConfig, Walker},
};

/// Measured footprint of one stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    /// Bytes of the key.
    pub key: usize,
    /// Bytes of the value.
    pub value: usize,
    /// Bookkeeping bytes of the store entry holding them.
    pub container: usize,
    /// Whether the measurement stopped early at a limit.
    pub partial: bool,
}

impl Size {
    /// Total bytes.
    pub fn total(&self) -> usize {
        self.key + self.value + self.container
    }
}

/// Measures entries before they are charged to a pool.
pub trait SizeOfEngine<K, V>: Send + Sync + 'static + Debug {
    /// Measure an entry. `container` is the bookkeeping overhead of the entry in the calling store.
    ///
    /// Fails only with [`strata_common::error::ErrorKind::SizeOfOverflow`] when aborting on overflow is enabled.
    fn size_of(&self, key: &K, value: &V, container: usize) -> Result<Size>;
}

/// Deep size-of engine that walks keys and values.
///
/// Key and value are measured in one walk, a subgraph shared between them is counted once.
#[derive(Debug, Clone, Default)]
pub struct DefaultSizeOfEngine {
    config: SizeOfConfig,
    filter: Arc<SizeOfFilter>,
}

impl DefaultSizeOfEngine {
    /// Create a deep size-of engine.
    pub fn new(config: SizeOfConfig, filter: Arc<SizeOfFilter>) -> Self {
        Self { config, filter }
    }

    /// Limits of the engine.
    pub fn config(&self) -> &SizeOfConfig {
        &self.config
    }

    /// Measure a single value with the limits and the filter of the engine.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "strata::sizeof::engine::deep_size_of"))]
    pub fn deep_size_of<T: SizeOf>(&self, value: &T) -> Result<Measurement> {
        let mut walker = Walker::new(&self.filter, self.config);
        walker.root(value)?;
        let measurement = walker.finish();
        if measurement.partial {
            tracing::warn!(
                "[sizeof]: measurement of {} is partial, bytes: {}, objects: {}",
                std::any::type_name::<T>(),
                measurement.bytes,
                measurement.objects
            );
        }
        Ok(measurement)
    }
}

impl<K, V> SizeOfEngine<K, V> for DefaultSizeOfEngine
where
    K: SizeOf,
    V: SizeOf,
{
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "strata::sizeof::engine::size_of"))]
    fn size_of(&self, key: &K, value: &V, container: usize) -> Result<Size> {
        let mut walker = Walker::new(&self.filter, self.config);
        walker.root(key)?;
        let key_bytes = walker.bytes();
        walker.root(value)?;
        let value_bytes = walker.bytes() - key_bytes;
        let measurement = walker.finish();
        if measurement.partial {
            tracing::warn!(
                "[sizeof]: entry measurement is partial, key: {key_bytes}, value: {value_bytes}, objects: {}",
                measurement.objects
            );
        }
        Ok(Size {
            key: key_bytes,
            value: value_bytes,
            container,
            partial: measurement.partial,
        })
    }
}

/// Size-of engine that charges every entry the same sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConstantSizeOfEngine {
    key: usize,
    value: usize,
    container: usize,
}

impl ConstantSizeOfEngine {
    /// Create a constant size-of engine.
    pub fn new(key: usize, value: usize, container: usize) -> Self {
        Self { key, value, container }
    }
}

impl<K, V> SizeOfEngine<K, V> for ConstantSizeOfEngine
where
    K: 'static,
    V: 'static,
{
    fn size_of(&self, _: &K, _: &V, _: usize) -> Result<Size> {
        Ok(Size {
            key: self.key,
            value: self.value,
            container: self.container,
            partial: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::mem::size_of;

    use strata_common::error::ErrorKind;

    use super::*;

    fn is_send_sync_static<T: Send + Sync + 'static>() {}

    #[test]
    fn test_send_sync_static() {
        is_send_sync_static::<DefaultSizeOfEngine>();
        is_send_sync_static::<ConstantSizeOfEngine>();
    }

    struct Blob {
        bytes: Vec<u8>,
    }

    impl SizeOf for Blob {
        fn visit(&self, walker: &mut Walker<'_>) -> Result<()> {
            walker.field("bytes", &self.bytes)
        }
    }

    struct Holder {
        id: u64,
        blob: Option<Arc<Blob>>,
        label: String,
    }

    impl SizeOf for Holder {
        fn visit(&self, walker: &mut Walker<'_>) -> Result<()> {
            walker.field("id", &self.id)?;
            walker.field("blob", &self.blob)?;
            walker.field("label", &self.label)
        }
    }

    fn holder(blob: Option<Arc<Blob>>) -> Holder {
        Holder {
            id: 1,
            blob,
            label: String::with_capacity(12),
        }
    }

    fn blob() -> Arc<Blob> {
        Arc::new(Blob {
            bytes: Vec::with_capacity(4096),
        })
    }

    #[test]
    fn test_excluded_type_measures_as_absent() {
        let engine = DefaultSizeOfEngine::new(
            SizeOfConfig::default(),
            Arc::new(SizeOfFilter::new().with_excluded::<Blob>()),
        );
        let with = engine.deep_size_of(&holder(Some(blob()))).unwrap();
        let without = engine.deep_size_of(&holder(None)).unwrap();
        assert_eq!(with.bytes, without.bytes);

        let unfiltered = DefaultSizeOfEngine::default().deep_size_of(&holder(Some(blob()))).unwrap();
        assert!(unfiltered.bytes > with.bytes + 4096);
    }

    #[test]
    fn test_excluded_field() {
        let owner = std::any::type_name::<Holder>();
        let engine = DefaultSizeOfEngine::new(
            SizeOfConfig::default(),
            Arc::new(SizeOfFilter::new().with_excluded_field(owner, "blob")),
        );
        let with = engine.deep_size_of(&holder(Some(blob()))).unwrap();
        assert_eq!(with.bytes, size_of::<Holder>() + 12);
    }

    #[test]
    fn test_key_value_share_subgraph() {
        let engine = DefaultSizeOfEngine::default();
        let shared = blob();
        let size = engine.size_of(&shared.clone(), &holder(Some(shared)), 64).unwrap();
        let arc = 2 * size_of::<usize>() + size_of::<Blob>() + 4096;
        assert_eq!(size.key, size_of::<Arc<Blob>>() + arc);
        assert_eq!(size.value, size_of::<Holder>() + 12);
        assert_eq!(size.container, 64);
        assert_eq!(size.total(), size.key + size.value + 64);
        assert!(!size.partial);
    }

    #[test]
    fn test_engine_idempotent() {
        let engine = DefaultSizeOfEngine::default();
        let h = holder(Some(blob()));
        let a = SizeOfEngine::<u64, Holder>::size_of(&engine, &1, &h, 0).unwrap();
        let b = SizeOfEngine::<u64, Holder>::size_of(&engine, &1, &h, 0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_engine_abort() {
        let engine = DefaultSizeOfEngine::new(
            SizeOfConfig {
                max_objects_visited: 2,
                abort_on_overflow: true,
                ..Default::default()
            },
            Arc::default(),
        );
        let e = SizeOfEngine::<u64, Holder>::size_of(&engine, &1, &holder(Some(blob())), 0).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::SizeOfOverflow);
    }

    #[test]
    fn test_constant_engine() {
        let engine = ConstantSizeOfEngine::new(8, 1024, 32);
        let size = SizeOfEngine::<u64, String>::size_of(&engine, &1, &"ignored".to_string(), 999).unwrap();
        assert_eq!(size.total(), 8 + 1024 + 32);
    }
}
