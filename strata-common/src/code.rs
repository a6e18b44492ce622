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
    fmt::Debug,
    hash::{BuildHasher, BuildHasherDefault, Hash},
};

use twox_hash::XxHash64;

/// Key trait for the pooled stores.
///
/// Keys are hashed for shard placement and printed in traces.
pub trait Key: Send + Sync + 'static + Hash + Eq + Debug {}
impl<T: Send + Sync + 'static + Hash + Eq + Debug> Key for T {}

/// Value trait for the pooled stores.
pub trait Value: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Value for T {}

/// Hash builder trait.
pub trait HashBuilder: BuildHasher + Send + Sync + 'static {}
impl<T> HashBuilder for T where T: BuildHasher + Send + Sync + 'static {}

/// The default hasher for strata.
///
/// It is guaranteed that the hash results of the same key are the same across different runs.
pub type DefaultHasher = BuildHasherDefault<XxHash64>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_hasher_is_stable() {
        let a = DefaultHasher::default().hash_one("strata");
        let b = DefaultHasher::default().hash_one("strata");
        assert_eq!(a, b);
        assert_ne!(a, DefaultHasher::default().hash_one("strata!"));
    }
}
