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
    borrow::Cow,
    collections::HashMap,
    hash::{Hash, Hasher},
    sync::{Arc, LazyLock},
};

use itertools::Itertools;
use parking_lot::Mutex;
use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry, register_int_gauge_vec_with_registry,
    Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Registry,
};

use crate::{
    metrics::{
        BoxedCounter, BoxedCounterVec, BoxedGauge, BoxedGaugeVec, BoxedHistogram, BoxedHistogramVec, Boxer, CounterOps,
        CounterVecOps, GaugeOps, GaugeVecOps, HistogramOps, HistogramVecOps, RegistryOps,
    },
    scope::Scope,
};

type Vectors = HashMap<PrometheusMetricsRegistry, HashMap<Metadata, MetricVec>>;

/// Every vector registered through a [`PrometheusMetricsRegistry`], so that pools and stores sharing one registry
/// reuse the same vectors instead of registering duplicates.
static VECTORS: LazyLock<Mutex<Vectors>> = LazyLock::new(|| Mutex::new(HashMap::new()));

#[derive(Debug, Clone)]
enum MetricVec {
    Counter(IntCounterVec),
    Gauge(IntGaugeVec),
    Histogram(HistogramVec),
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct Metadata {
    name: Cow<'static, str>,
    desc: Cow<'static, str>,
    label_names: &'static [&'static str],
}

fn get_or_register(
    registry: &PrometheusMetricsRegistry,
    metadata: Metadata,
    register: impl FnOnce(&Metadata, &Registry) -> MetricVec,
) -> MetricVec {
    VECTORS.lock().with(|mut vectors| {
        vectors
            .entry(registry.clone())
            .or_default()
            .entry(metadata.clone())
            .or_insert_with(|| register(&metadata, &registry.registry))
            .clone()
    })
}

impl CounterOps for IntCounter {
    fn increase(&self, val: u64) {
        self.inc_by(val);
    }
}

impl CounterVecOps for IntCounterVec {
    fn counter(&self, labels: &[Cow<'static, str>]) -> BoxedCounter {
        let labels = labels.iter().map(Cow::as_ref).collect_vec();
        self.with_label_values(&labels).boxed()
    }
}

impl GaugeOps for IntGauge {
    fn increase(&self, val: u64) {
        self.add(val as _);
    }

    fn decrease(&self, val: u64) {
        self.sub(val as _);
    }

    fn absolute(&self, val: u64) {
        self.set(val as _);
    }
}

impl GaugeVecOps for IntGaugeVec {
    fn gauge(&self, labels: &[Cow<'static, str>]) -> BoxedGauge {
        let labels = labels.iter().map(Cow::as_ref).collect_vec();
        self.with_label_values(&labels).boxed()
    }
}

impl HistogramOps for Histogram {
    fn record(&self, val: f64) {
        self.observe(val);
    }
}

impl HistogramVecOps for HistogramVec {
    fn histogram(&self, labels: &[Cow<'static, str>]) -> BoxedHistogram {
        let labels = labels.iter().map(Cow::as_ref).collect_vec();
        self.with_label_values(&labels).boxed()
    }
}

/// Prometheus metric registry with lib `prometheus`.
///
/// The registry can be cloned and shared by a pool and all of its stores without duplicate registration.
#[derive(Debug, Clone)]
pub struct PrometheusMetricsRegistry {
    registry: Arc<Registry>,
}

impl PartialEq for PrometheusMetricsRegistry {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.registry, &other.registry)
    }
}

impl Eq for PrometheusMetricsRegistry {}

impl Hash for PrometheusMetricsRegistry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.registry).hash(state);
    }
}

impl PrometheusMetricsRegistry {
    /// Create an Prometheus metrics registry.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }
}

impl RegistryOps for PrometheusMetricsRegistry {
    fn register_counter_vec(
        &self,
        name: Cow<'static, str>,
        desc: Cow<'static, str>,
        label_names: &'static [&'static str],
    ) -> BoxedCounterVec {
        let metadata = Metadata { name, desc, label_names };
        match get_or_register(self, metadata, |m, r| {
            MetricVec::Counter(
                register_int_counter_vec_with_registry! { m.name.as_ref(), m.desc.as_ref(), m.label_names, r }
                    .expect("metric names of strata must be valid and unique per registry"),
            )
        }) {
            MetricVec::Counter(v) => v.boxed(),
            _ => unreachable!("metric {} was registered with another type", label_names.join(",")),
        }
    }

    fn register_gauge_vec(
        &self,
        name: Cow<'static, str>,
        desc: Cow<'static, str>,
        label_names: &'static [&'static str],
    ) -> BoxedGaugeVec {
        let metadata = Metadata { name, desc, label_names };
        match get_or_register(self, metadata, |m, r| {
            MetricVec::Gauge(
                register_int_gauge_vec_with_registry! { m.name.as_ref(), m.desc.as_ref(), m.label_names, r }
                    .expect("metric names of strata must be valid and unique per registry"),
            )
        }) {
            MetricVec::Gauge(v) => v.boxed(),
            _ => unreachable!("metric {} was registered with another type", label_names.join(",")),
        }
    }

    fn register_histogram_vec(
        &self,
        name: Cow<'static, str>,
        desc: Cow<'static, str>,
        label_names: &'static [&'static str],
    ) -> BoxedHistogramVec {
        let metadata = Metadata { name, desc, label_names };
        match get_or_register(self, metadata, |m, r| {
            MetricVec::Histogram(
                register_histogram_vec_with_registry! { m.name.as_ref(), m.desc.as_ref(), m.label_names, r }
                    .expect("metric names of strata must be valid and unique per registry"),
            )
        }) {
            MetricVec::Histogram(v) => v.boxed(),
            _ => unreachable!("metric {} was registered with another type", label_names.join(",")),
        }
    }
}
