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

use std::fmt::Debug;

/// A consumer of pool capacity that can give some of it back.
///
/// Participants register with a [`crate::Pool`] and are asked to evict by the pool's [`crate::Evictor`] when a
/// reservation pushes the pool over its capacity.
pub trait Participant: Send + Sync + 'static + Debug {
    /// Evict at least `count` entries, continuing until at least `bytes_hint` units are freed or nothing evictable
    /// is left.
    ///
    /// Must run synchronously on the calling thread and release what it frees through its accessor before
    /// returning. Returns `true` if anything was evicted.
    fn evict(&self, count: usize, bytes_hint: usize) -> bool;

    /// Units currently charged to the pool by this participant.
    ///
    /// Must be cheap, the evictor reads it for every participant on every pass.
    fn size(&self) -> usize;
}
