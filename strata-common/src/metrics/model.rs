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

use std::borrow::Cow;

use super::{registry::noop::NoopMetricsRegistry, BoxedCounter, BoxedGauge, BoxedHistogram, RegistryOps};

// FIXME: https://github.com/rust-lang/rust-analyzer/issues/17685
// #[expect(missing_docs)]
/// ... ...
#[derive(Debug)]
pub struct Metrics {
    /* store metrics */
    /// ... ...
    pub store_insert: BoxedCounter,
    /// ... ...
    pub store_replace: BoxedCounter,
    /// ... ...
    pub store_hit: BoxedCounter,
    /// ... ...
    pub store_miss: BoxedCounter,
    /// ... ...
    pub store_remove: BoxedCounter,
    /// ... ...
    pub store_evict: BoxedCounter,
    /// ... ...
    pub store_evict_miss: BoxedCounter,
    /// ... ...
    pub store_size_of_fallback: BoxedCounter,

    /// ... ...
    pub store_usage: BoxedGauge,

    /* pool metrics */
    /// ... ...
    pub pool_reserve: BoxedCounter,
    /// ... ...
    pub pool_release: BoxedCounter,
    /// ... ...
    pub pool_free_space: BoxedCounter,
    /// ... ...
    pub pool_exhausted: BoxedCounter,
    /// ... ...
    pub pool_overshoot: BoxedCounter,

    /// ... ...
    pub pool_used: BoxedGauge,

    /// ... ...
    pub pool_free_space_duration: BoxedHistogram,
}

impl Metrics {
    /// Create a new metric with the given name.
    pub fn new(name: impl Into<Cow<'static, str>>, registry: &dyn RegistryOps) -> Self {
        let name = name.into();

        /* store metrics */

        let store_ops = registry.register_counter_vec(
            "strata_store_op_total".into(),
            "strata store operations".into(),
            &["name", "op"],
        );
        let store_usage =
            registry.register_gauge_vec("strata_store_usage".into(), "strata store pooled usage".into(), &["name"]);

        let store_insert = store_ops.counter(&[name.clone(), "insert".into()]);
        let store_replace = store_ops.counter(&[name.clone(), "replace".into()]);
        let store_hit = store_ops.counter(&[name.clone(), "hit".into()]);
        let store_miss = store_ops.counter(&[name.clone(), "miss".into()]);
        let store_remove = store_ops.counter(&[name.clone(), "remove".into()]);
        let store_evict = store_ops.counter(&[name.clone(), "evict".into()]);
        let store_evict_miss = store_ops.counter(&[name.clone(), "evict_miss".into()]);
        let store_size_of_fallback = store_ops.counter(&[name.clone(), "size_of_fallback".into()]);

        let store_usage = store_usage.gauge(&[name.clone()]);

        /* pool metrics */

        let pool_ops = registry.register_counter_vec(
            "strata_pool_op_total".into(),
            "strata pool operations".into(),
            &["name", "op"],
        );
        let pool_used =
            registry.register_gauge_vec("strata_pool_used".into(), "strata pool used units".into(), &["name"]);
        let pool_duration = registry.register_histogram_vec(
            "strata_pool_op_duration".into(),
            "strata pool operation durations".into(),
            &["name", "op"],
        );

        let pool_reserve = pool_ops.counter(&[name.clone(), "reserve".into()]);
        let pool_release = pool_ops.counter(&[name.clone(), "release".into()]);
        let pool_free_space = pool_ops.counter(&[name.clone(), "free_space".into()]);
        let pool_exhausted = pool_ops.counter(&[name.clone(), "exhausted".into()]);
        let pool_overshoot = pool_ops.counter(&[name.clone(), "overshoot".into()]);

        let pool_used = pool_used.gauge(&[name.clone()]);

        let pool_free_space_duration = pool_duration.histogram(&[name, "free_space".into()]);

        Self {
            store_insert,
            store_replace,
            store_hit,
            store_miss,
            store_remove,
            store_evict,
            store_evict_miss,
            store_size_of_fallback,
            store_usage,
            pool_reserve,
            pool_release,
            pool_free_space,
            pool_exhausted,
            pool_overshoot,
            pool_used,
            pool_free_space_duration,
        }
    }

    /// Build noop metrics.
    ///
    /// Note: `noop` is only supposed to be called by other strata components.
    #[doc(hidden)]
    pub fn noop() -> Self {
        Self::new("test", &NoopMetricsRegistry)
    }
}
