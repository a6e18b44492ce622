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

//! Shared capacity pools for in-process stores.
//!
//! A [`Pool`] holds one capacity shared by many [`Participant`]s. Each participant charges and credits the pool
//! through its own [`Accessor`]. When a charge pushes usage over the capacity, the pool's [`Evictor`] asks
//! participants to evict on the calling thread.

mod evictor;
mod participant;
mod pool;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use evictor::{Evictor, FromLargestEvictor};
pub use participant::Participant;
pub use pool::{Accessor, Pool, PoolBuilder, PoolUnit};
