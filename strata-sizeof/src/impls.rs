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
    collections::{HashMap, HashSet, VecDeque},
    mem::size_of,
    sync::Arc,
    time::Duration,
};

use strata_common::error::Result;

use crate::walker::{SizeOf, Walker};

macro_rules! leaf {
    ($($t:ty),* $(,)?) => {
        $(
            impl SizeOf for $t {
                const HAS_CHILDREN: bool = false;
            }
        )*
    };
}

leaf! { u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64, bool, char, (), Duration }

/// Static strings live in the binary and are shared by every holder.
impl SizeOf for &'static str {
    const HAS_CHILDREN: bool = false;

    fn is_flyweight(&self) -> bool {
        true
    }
}

impl SizeOf for String {
    fn visit(&self, walker: &mut Walker<'_>) -> Result<()> {
        walker.buffer(self.capacity())
    }
}

impl<T: SizeOf> SizeOf for Vec<T> {
    fn visit(&self, walker: &mut Walker<'_>) -> Result<()> {
        walker.buffer(self.capacity() * size_of::<T>())?;
        walker.elements(self.iter())
    }
}

impl<T: SizeOf> SizeOf for VecDeque<T> {
    fn visit(&self, walker: &mut Walker<'_>) -> Result<()> {
        walker.buffer(self.capacity() * size_of::<T>())?;
        walker.elements(self.iter())
    }
}

impl<T: SizeOf> SizeOf for Box<T> {
    fn visit(&self, walker: &mut Walker<'_>) -> Result<()> {
        walker.boxed(self.as_ref())
    }
}

impl<T: SizeOf> SizeOf for Arc<T> {
    fn visit(&self, walker: &mut Walker<'_>) -> Result<()> {
        // strong and weak counters
        walker.shared(self.as_ref(), 2 * size_of::<usize>())
    }
}

impl<T: SizeOf> SizeOf for Option<T> {
    const HAS_CHILDREN: bool = T::HAS_CHILDREN;

    fn visit(&self, walker: &mut Walker<'_>) -> Result<()> {
        match self {
            Some(value) => walker.inline(value),
            None => Ok(()),
        }
    }
}

impl<T: SizeOf, const N: usize> SizeOf for [T; N] {
    const HAS_CHILDREN: bool = T::HAS_CHILDREN;

    fn visit(&self, walker: &mut Walker<'_>) -> Result<()> {
        walker.elements(self.iter())
    }
}

impl<A: SizeOf, B: SizeOf> SizeOf for (A, B) {
    const HAS_CHILDREN: bool = A::HAS_CHILDREN || B::HAS_CHILDREN;

    fn visit(&self, walker: &mut Walker<'_>) -> Result<()> {
        walker.inline(&self.0)?;
        walker.inline(&self.1)
    }
}

impl<A: SizeOf, B: SizeOf, C: SizeOf> SizeOf for (A, B, C) {
    const HAS_CHILDREN: bool = A::HAS_CHILDREN || B::HAS_CHILDREN || C::HAS_CHILDREN;

    fn visit(&self, walker: &mut Walker<'_>) -> Result<()> {
        walker.inline(&self.0)?;
        walker.inline(&self.1)?;
        walker.inline(&self.2)
    }
}

/// Approximates the table as one buffer of slots plus one control byte per slot.
impl<K: SizeOf, V: SizeOf, S: 'static> SizeOf for HashMap<K, V, S> {
    fn visit(&self, walker: &mut Walker<'_>) -> Result<()> {
        walker.buffer(self.capacity() * (size_of::<(K, V)>() + 1))?;
        if K::HAS_CHILDREN {
            walker.elements(self.keys())?;
        }
        walker.elements(self.values())
    }
}

impl<T: SizeOf, S: 'static> SizeOf for HashSet<T, S> {
    fn visit(&self, walker: &mut Walker<'_>) -> Result<()> {
        walker.buffer(self.capacity() * (size_of::<T>() + 1))?;
        walker.elements(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{filter::SizeOfFilter, walker::SizeOfConfig};

    fn deep<T: SizeOf>(value: &T) -> usize {
        let filter = SizeOfFilter::default();
        let mut walker = Walker::new(&filter, SizeOfConfig::default());
        walker.root(value).unwrap();
        walker.finish().bytes
    }

    #[test]
    fn test_primitives() {
        assert_eq!(deep(&1u8), 1);
        assert_eq!(deep(&1u64), 8);
        assert_eq!(deep(&1.0f64), 8);
        assert_eq!(deep(&'c'), 4);
    }

    #[test]
    fn test_static_str_is_flyweight() {
        assert_eq!(deep(&"interned"), 0);
        assert_eq!(deep(&Some("interned")), size_of::<Option<&str>>());
    }

    #[test]
    fn test_string_and_vec() {
        let s = String::with_capacity(64);
        assert_eq!(deep(&s), size_of::<String>() + 64);

        let v: Vec<u32> = Vec::with_capacity(16);
        assert_eq!(deep(&v), size_of::<Vec<u32>>() + 64);

        let mut v: Vec<String> = Vec::with_capacity(2);
        v.push(String::with_capacity(10));
        v.push(String::with_capacity(20));
        assert_eq!(deep(&v), size_of::<Vec<String>>() + 2 * size_of::<String>() + 30);

        let empty: Vec<String> = Vec::new();
        assert_eq!(deep(&empty), size_of::<Vec<String>>());
    }

    #[test]
    fn test_box_and_option() {
        assert_eq!(deep(&Box::new(7u64)), size_of::<Box<u64>>() + 8);
        assert_eq!(deep(&Some(Box::new(7u64))), size_of::<Option<Box<u64>>>() + 8);
        assert_eq!(deep(&None::<Box<u64>>), size_of::<Option<Box<u64>>>());
    }

    #[test]
    fn test_tuple_and_array() {
        let t = (1u64, String::with_capacity(8));
        assert_eq!(deep(&t), size_of::<(u64, String)>() + 8);

        let a = [String::with_capacity(4), String::with_capacity(4)];
        assert_eq!(deep(&a), size_of::<[String; 2]>() + 8);
    }

    #[test]
    fn test_arc_dedup_in_vec() {
        let shared = Arc::new(1u64);
        let v = vec![shared.clone(), shared.clone(), shared];
        let bytes = deep(&v);
        assert_eq!(
            bytes,
            size_of::<Vec<Arc<u64>>>() + v.capacity() * size_of::<Arc<u64>>() + 2 * size_of::<usize>() + 8
        );
    }

    #[test]
    fn test_hash_map() {
        let mut map: HashMap<u64, String> = HashMap::new();
        map.insert(1, String::with_capacity(16));
        let expected = size_of::<HashMap<u64, String>>() + map.capacity() * (size_of::<(u64, String)>() + 1) + 16;
        assert_eq!(deep(&map), expected);
    }
}
