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

//! Deep size estimation for pooled stores.
//!
//! Entries are measured by walking what they reach through the [`SizeOf`] trait, bounded by [`SizeOfConfig`] and
//! trimmed by a [`SizeOfFilter`].

mod engine;
mod filter;
mod impls;
mod walker;

pub use engine::{ConstantSizeOfEngine, DefaultSizeOfEngine, Size, SizeOfEngine};
pub use filter::SizeOfFilter;
pub use walker::{Measurement, SizeOf, SizeOfConfig, Walker};
