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

use super::{EvictionPolicy, Stats};

/// Evict the oldest sampled record regardless of hits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fifo;

impl EvictionPolicy for Fifo {
    fn name(&self) -> &'static str {
        "fifo"
    }

    fn score(&self, stats: &Stats) -> u64 {
        stats.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eviction::{select, test_utils::record};

    #[test]
    fn test_fifo() {
        let sample = vec![record(1, 0, 3), record(2, 0, 1), record(3, 0, 2)];
        sample[1].hit(10);
        assert_eq!(*select(&Fifo, 3, &sample, None).unwrap().key(), 2);
    }
}
