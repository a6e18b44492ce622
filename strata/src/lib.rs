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

//! strata - bounded resource pools for in-process caches.
//!
//! Stores of any key and value types charge the measured size of their entries to one shared [`Pool`]. When the pool
//! runs over its capacity, the largest store is asked to evict first, and each store picks its victims from small
//! random samples with a local eviction policy. Pinned entries are never evicted, the pool tolerates the overshoot
//! instead of rejecting writes.

mod config;
mod manager;
pub mod prelude;

pub use prelude::*;
