//! Per-entity samples and complete sample generations.

use std::collections::BTreeMap;

use crate::entity::EntityKey;
use crate::metric::Metric;
use crate::value::{RatioValue, Value};

// ---------------------------------------------------------------------------
// Sample
// ---------------------------------------------------------------------------

/// One entity's metric values for one iteration. Missing metrics are legal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    values: BTreeMap<Metric, Value>,
}

impl Sample {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, coerced into the metric's shape.
    pub fn set(&mut self, metric: Metric, value: impl Into<Value>) {
        self.values.insert(metric, metric.coerce(value.into()));
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, metric: Metric, value: impl Into<Value>) -> Self {
        self.set(metric, value);
        self
    }

    pub fn with_ratio(self, metric: Metric, weight: f64, ratio: f64) -> Self {
        self.with(metric, RatioValue::new(weight, ratio))
    }

    pub fn get(&self, metric: Metric) -> Option<&Value> {
        self.values.get(&metric)
    }

    pub fn remove(&mut self, metric: Metric) -> Option<Value> {
        self.values.remove(&metric)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Present values in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (Metric, &Value)> {
        self.values.iter().map(|(m, v)| (*m, v))
    }
}

impl FromIterator<(Metric, Value)> for Sample {
    fn from_iter<I: IntoIterator<Item = (Metric, Value)>>(iter: I) -> Self {
        let mut sample = Sample::new();
        for (metric, value) in iter {
            sample.set(metric, value);
        }
        sample
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// A complete sample set as of one point in time, with its folded summary.
///
/// The summary always equals the fold of [`Metric::aggregate`] over every
/// entity's present value; a summary metric is present iff some entity
/// reports it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    samples: BTreeMap<EntityKey, Sample>,
    summary: Sample,
    timestamp: u64,
}

impl Generation {
    /// An empty generation stamped at `timestamp` (epoch milliseconds).
    pub fn empty(timestamp: u64) -> Self {
        Self {
            timestamp,
            ..Self::default()
        }
    }

    /// Build a generation from a finished batch in one deterministic pass.
    pub fn from_samples(
        samples: impl IntoIterator<Item = (EntityKey, Sample)>,
        timestamp: u64,
    ) -> Self {
        let mut generation = Self::empty(timestamp);
        for (entity, sample) in samples {
            generation.ingest(entity, sample);
        }
        generation
    }

    /// Add one entity's sample and fold it into the summary. Re-ingesting an
    /// entity replaces its sample and rebuilds the summary.
    pub fn ingest(&mut self, entity: EntityKey, sample: Sample) {
        if self.samples.contains_key(&entity) {
            self.samples.insert(entity, sample);
            self.rebuild_summary();
            return;
        }
        for (metric, value) in sample.iter() {
            self.fold_into_summary(metric, *value);
        }
        self.samples.insert(entity, sample);
    }

    /// Fold one value into the summary with the metric's aggregation rule.
    pub fn fold_into_summary(&mut self, metric: Metric, value: Value) {
        let current = self
            .summary
            .get(metric)
            .copied()
            .unwrap_or_else(|| metric.identity());
        self.summary.set(metric, metric.aggregate(current, value));
    }

    fn rebuild_summary(&mut self) {
        let mut summary = Sample::new();
        for sample in self.samples.values() {
            for (metric, value) in sample.iter() {
                let current = summary
                    .get(metric)
                    .copied()
                    .unwrap_or_else(|| metric.identity());
                summary.set(metric, metric.aggregate(current, *value));
            }
        }
        self.summary = summary;
    }

    pub fn samples(&self) -> &BTreeMap<EntityKey, Sample> {
        &self.samples
    }

    pub fn sample(&self, entity: &EntityKey) -> Option<&Sample> {
        self.samples.get(entity)
    }

    pub fn value(&self, entity: &EntityKey, metric: Metric) -> Option<&Value> {
        self.samples.get(entity).and_then(|s| s.get(metric))
    }

    pub fn summary(&self) -> &Sample {
        &self.summary
    }

    /// Epoch milliseconds at which this generation was collected.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
