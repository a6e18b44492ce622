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

use std::{any::type_name, mem::size_of};

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use strata_common::error::{Error, Result};

use crate::filter::SizeOfFilter;

/// Types whose deep size can be measured by a [`Walker`].
///
/// The inline bytes of a value are accounted by whoever owns it. An implementation only reports what the value
/// reaches: heap buffers, boxed children, shared allocations and the fields that may own any of those.
///
/// ```rust
/// # use strata_common::error::Result;
/// # use strata_sizeof::{SizeOf, Walker};
/// struct Session {
///     user: String,
///     tokens: Vec<String>,
///     retries: u32,
/// }
///
/// impl SizeOf for Session {
///     fn visit(&self, walker: &mut Walker<'_>) -> Result<()> {
///         walker.field("user", &self.user)?;
///         walker.field("tokens", &self.tokens)
///     }
/// }
/// ```
pub trait SizeOf: 'static {
    /// `false` if no value of this type can reach anything beyond its own inline bytes.
    ///
    /// Walkers skip leaf values without recursion, which matters for large buffers of primitives.
    const HAS_CHILDREN: bool = true;

    /// Report everything reachable from `self` to the walker.
    #[expect(unused_variables)]
    fn visit(&self, walker: &mut Walker<'_>) -> Result<()> {
        Ok(())
    }

    /// Shared flyweight instances (interned or static values) contribute zero bytes wherever they are reached.
    fn is_flyweight(&self) -> bool {
        false
    }
}

/// Hard limits of a single measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeOfConfig {
    /// Max objects visited in one measurement.
    ///
    /// Every accounted allocation and every element walked in a buffer counts, whether or not it owns anything.
    pub max_objects_visited: usize,
    /// Max nesting of visited values.
    pub max_depth: usize,
    /// Fail the measurement instead of returning a partial size when a limit is hit.
    pub abort_on_overflow: bool,
}

impl Default for SizeOfConfig {
    fn default() -> Self {
        Self {
            max_objects_visited: 1000,
            max_depth: 128,
            abort_on_overflow: false,
        }
    }
}

/// Result of a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Measurement {
    /// Accounted bytes.
    pub bytes: usize,
    /// Accounted allocations.
    pub objects: usize,
    /// Whether the traversal stopped early at a limit.
    pub partial: bool,
}

/// Depth-first traversal state of a measurement.
///
/// Shared allocations are identified by address and counted once per walker, so one walker measuring several roots
/// counts a subgraph shared between them once.
#[derive(Debug)]
pub struct Walker<'a> {
    filter: &'a SizeOfFilter,
    config: SizeOfConfig,

    bytes: usize,
    objects: usize,
    visited: usize,
    depth: usize,
    truncated: bool,

    owners: Vec<&'static str>,
    seen: HashSet<usize>,
}

impl<'a> Walker<'a> {
    /// Create a walker with the given filter and limits.
    pub fn new(filter: &'a SizeOfFilter, config: SizeOfConfig) -> Self {
        Self {
            filter,
            config,
            bytes: 0,
            objects: 0,
            visited: 0,
            depth: 0,
            truncated: false,
            owners: vec![],
            seen: HashSet::new(),
        }
    }

    /// Measure a root value: its own inline bytes and everything it reaches.
    pub fn root<T: SizeOf>(&mut self, value: &T) -> Result<()> {
        if self.skipped(value) {
            return Ok(());
        }
        self.allocation(size_of::<T>())?;
        self.descend(value)
    }

    /// Visit a named field of the value being visited.
    ///
    /// The inline bytes of the field are part of its owner. Excluded fields are not followed.
    pub fn field<T: SizeOf>(&mut self, name: &'static str, value: &T) -> Result<()> {
        if let Some(owner) = self.owners.last() {
            if self.filter.excludes_field(owner, name) {
                return Ok(());
            }
        }
        self.inline(value)
    }

    /// Visit a value stored inline in the value being visited, e.g. an enum payload or a buffer element.
    pub fn inline<T: SizeOf>(&mut self, value: &T) -> Result<()> {
        if !T::HAS_CHILDREN || self.skipped(value) {
            return Ok(());
        }
        self.descend(value)
    }

    /// Visit a value living in its own uniquely owned allocation.
    pub fn boxed<T: SizeOf>(&mut self, value: &T) -> Result<()> {
        if self.skipped(value) {
            return Ok(());
        }
        self.allocation(size_of::<T>())?;
        self.descend(value)
    }

    /// Visit a value living in a shared allocation with `header` bytes of bookkeeping in front of it.
    pub fn shared<T: SizeOf>(&mut self, value: &T, header: usize) -> Result<()> {
        if self.skipped(value) {
            return Ok(());
        }
        let addr = value as *const T as *const () as usize;
        if !self.seen.insert(addr) {
            return Ok(());
        }
        self.allocation(header + size_of::<T>())?;
        self.descend(value)
    }

    /// Account a heap buffer of `bytes` bytes. Elements stored in it are visited with [`Walker::elements`].
    pub fn buffer(&mut self, bytes: usize) -> Result<()> {
        if bytes == 0 {
            return Ok(());
        }
        self.allocation(bytes)
    }

    /// Visit elements stored inline in a buffer.
    pub fn elements<'b, T: SizeOf>(&mut self, iter: impl IntoIterator<Item = &'b T>) -> Result<()> {
        if !T::HAS_CHILDREN {
            return Ok(());
        }
        for value in iter {
            self.count()?;
            if self.truncated {
                break;
            }
            self.inline(value)?;
        }
        Ok(())
    }

    /// Bytes accounted so far.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Whether the traversal has stopped at a limit.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Finish the walk.
    pub fn finish(self) -> Measurement {
        Measurement {
            bytes: self.bytes,
            objects: self.objects,
            partial: self.truncated,
        }
    }

    fn skipped<T: SizeOf>(&self, value: &T) -> bool {
        self.truncated || value.is_flyweight() || self.filter.excludes_type::<T>()
    }

    fn allocation(&mut self, bytes: usize) -> Result<()> {
        self.count()?;
        if self.truncated {
            return Ok(());
        }
        self.objects += 1;
        self.bytes += bytes;
        Ok(())
    }

    fn count(&mut self) -> Result<()> {
        if self.truncated {
            return Ok(());
        }
        if self.visited >= self.config.max_objects_visited {
            return self.overflow();
        }
        self.visited += 1;
        Ok(())
    }

    fn descend<T: SizeOf>(&mut self, value: &T) -> Result<()> {
        if self.truncated || !T::HAS_CHILDREN {
            return Ok(());
        }
        if self.depth >= self.config.max_depth {
            return self.overflow();
        }
        self.depth += 1;
        self.owners.push(type_name::<T>());
        let res = value.visit(self);
        self.owners.pop();
        self.depth -= 1;
        res
    }

    fn overflow(&mut self) -> Result<()> {
        if self.config.abort_on_overflow {
            return Err(Error::size_of_overflow(
                self.config.max_objects_visited,
                self.visited + 1,
                self.depth,
            ));
        }
        tracing::trace!(
            "[sizeof]: stop walking at limit, visited: {}, depth: {}, bytes: {}",
            self.visited,
            self.depth,
            self.bytes
        );
        self.truncated = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, sync::Arc};

    use strata_common::error::ErrorKind;

    use super::*;

    struct Pair {
        left: Arc<String>,
        right: Arc<String>,
    }

    impl SizeOf for Pair {
        fn visit(&self, walker: &mut Walker<'_>) -> Result<()> {
            walker.field("left", &self.left)?;
            walker.field("right", &self.right)
        }
    }

    struct Node {
        next: Option<Box<Node>>,
    }

    impl SizeOf for Node {
        fn visit(&self, walker: &mut Walker<'_>) -> Result<()> {
            walker.field("next", &self.next)
        }
    }

    thread_local! {
        static SLOT_VISITS: Cell<usize> = const { Cell::new(0) };
    }

    /// Owns nothing beyond its inline bytes but keeps the default `HAS_CHILDREN`.
    struct Slot {
        #[expect(dead_code)]
        id: u64,
    }

    impl SizeOf for Slot {
        fn visit(&self, _: &mut Walker<'_>) -> Result<()> {
            SLOT_VISITS.with(|visits| visits.set(visits.get() + 1));
            Ok(())
        }
    }

    fn slots(len: u64) -> Vec<Slot> {
        (0..len).map(|id| Slot { id }).collect()
    }

    fn chain(len: usize) -> Node {
        let mut node = Node { next: None };
        for _ in 1..len {
            node = Node {
                next: Some(Box::new(node)),
            };
        }
        node
    }

    fn measure<T: SizeOf>(value: &T, config: SizeOfConfig) -> Result<Measurement> {
        let filter = SizeOfFilter::default();
        let mut walker = Walker::new(&filter, config);
        walker.root(value)?;
        Ok(walker.finish())
    }

    #[test]
    fn test_leaf_root() {
        let m = measure(&42u64, SizeOfConfig::default()).unwrap();
        assert_eq!(m.bytes, 8);
        assert_eq!(m.objects, 1);
        assert!(!m.partial);
    }

    #[test]
    fn test_shared_allocation_counted_once() {
        let shared = Arc::new("x".repeat(100));
        let pair = Pair {
            left: shared.clone(),
            right: shared,
        };
        let distinct = Pair {
            left: Arc::new("x".repeat(100)),
            right: Arc::new("x".repeat(100)),
        };

        let a = measure(&pair, SizeOfConfig::default()).unwrap();
        let b = measure(&distinct, SizeOfConfig::default()).unwrap();
        let arc = 2 * size_of::<usize>() + size_of::<String>();
        assert_eq!(a.bytes, size_of::<Pair>() + arc + 100);
        assert_eq!(b.bytes, size_of::<Pair>() + 2 * (arc + 100));
    }

    #[test]
    fn test_measurement_is_idempotent() {
        let node = chain(32);
        let a = measure(&node, SizeOfConfig::default()).unwrap();
        let b = measure(&node, SizeOfConfig::default()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.objects, 32);
        assert_eq!(a.bytes, 32 * size_of::<Node>());
    }

    #[test]
    fn test_object_limit_partial() {
        let config = SizeOfConfig {
            max_objects_visited: 10,
            ..Default::default()
        };
        let m = measure(&chain(32), config).unwrap();
        assert!(m.partial);
        assert_eq!(m.objects, 10);
        assert_eq!(m.bytes, 10 * size_of::<Node>());
    }

    #[test]
    fn test_object_limit_abort() {
        let config = SizeOfConfig {
            max_objects_visited: 10,
            abort_on_overflow: true,
            ..Default::default()
        };
        let e = measure(&chain(32), config).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::SizeOfOverflow);
    }

    #[test]
    fn test_depth_limit() {
        let config = SizeOfConfig {
            max_depth: 4,
            ..Default::default()
        };
        let m = measure(&chain(32), config).unwrap();
        assert!(m.partial);
        assert!(m.objects < 32);

        let config = SizeOfConfig {
            max_depth: 4,
            abort_on_overflow: true,
            ..Default::default()
        };
        assert_eq!(
            measure(&chain(32), config).unwrap_err().kind(),
            ErrorKind::SizeOfOverflow
        );
    }

    #[test]
    fn test_elements_count_toward_object_limit() {
        let config = SizeOfConfig {
            max_objects_visited: 10,
            abort_on_overflow: true,
            ..Default::default()
        };
        let v = slots(100_000);

        SLOT_VISITS.with(|visits| visits.set(0));
        let e = measure(&v, config).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::SizeOfOverflow);
        // The vector and its buffer take two of the ten visits.
        assert_eq!(SLOT_VISITS.with(Cell::get), 8);

        SLOT_VISITS.with(|visits| visits.set(0));
        let m = measure(
            &v,
            SizeOfConfig {
                abort_on_overflow: false,
                ..config
            },
        )
        .unwrap();
        assert!(m.partial);
        assert_eq!(m.objects, 2);
        assert_eq!(m.bytes, size_of::<Vec<Slot>>() + v.capacity() * size_of::<Slot>());
        assert_eq!(SLOT_VISITS.with(Cell::get), 8);
    }

    #[test]
    fn test_empty_strings_count_toward_object_limit() {
        let config = SizeOfConfig {
            max_objects_visited: 10,
            ..Default::default()
        };
        let v = vec![String::new(); 1000];
        let m = measure(&v, config).unwrap();
        assert!(m.partial);
        assert_eq!(m.objects, 2);

        let e = measure(
            &v,
            SizeOfConfig {
                abort_on_overflow: true,
                ..config
            },
        )
        .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::SizeOfOverflow);

        let m = measure(&vec![String::new(); 8], config).unwrap();
        assert!(!m.partial);
    }

    #[test]
    fn test_config_serde() {
        let config: SizeOfConfig = serde_json::from_str(r#"{ "max_objects_visited": 64 }"#).unwrap();
        assert_eq!(
            config,
            SizeOfConfig {
                max_objects_visited: 64,
                ..Default::default()
            }
        );
    }
}
