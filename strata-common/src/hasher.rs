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

use std::hash::{BuildHasher, Hasher};

/// A hasher that returns the written integer as the hash.
///
/// Only used to make shard and bucket placement predictable in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModHasher {
    state: u64,
}

impl Hasher for ModHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.state = (self.state << 8) + *byte as u64;
        }
    }

    fn write_u32(&mut self, i: u32) {
        self.write(&i.to_be_bytes())
    }

    fn write_u64(&mut self, i: u64) {
        self.write(&i.to_be_bytes())
    }

    fn write_usize(&mut self, i: usize) {
        self.write(&i.to_be_bytes())
    }
}

impl BuildHasher for ModHasher {
    type Hasher = Self;

    fn build_hasher(&self) -> Self::Hasher {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mod_hasher() {
        for i in 0..1024u64 {
            assert_eq!(ModHasher::default().hash_one(i), i);
        }
    }
}
