use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};

use crate::classify::ResponseCategory;
use crate::macros::aggregate;
use crate::metric::{Metric, ProbeMetric};

/// The `Aggregate` trait defines how raw [`Metric`] values are collected and
/// combined into an intermediate, mergeable representation.
///
/// Aggregates store compact raw data (counts, sample vectors) and leave
/// derived statistics (rates, percentiles) to the `Report` stage, so
/// different reporting formats can derive what they need without losing
/// information.
///
/// `merge` must be associative and commutative: each worker owns a local
/// aggregate during the run and the executor merges them in arbitrary order
/// once all workers have stopped. That partition-then-merge shape is what
/// makes concurrent recording safe without any locking.
pub trait Aggregate
where
    Self: Serialize + DeserializeOwned + PartialOrd + PartialEq + Send + Sync + Debug + Clone,
{
    /// The metric type this aggregate summarizes.
    type Metric: Metric;

    /// Create a new, empty instance of the aggregate.
    fn new() -> Self;

    /// Aggregate multiple metrics into the current instance.
    fn aggregate(&mut self, metrics: &[Self::Metric]) {
        metrics.iter().for_each(|m| self.consume(m));
    }

    /// Incorporate a single metric into the aggregate.
    fn consume(&mut self, metric: &Self::Metric);

    /// Combine two different aggregates into one.
    fn merge(&mut self, other: Self);
}

/// Count plus raw duration samples for one response category.
///
/// The count always advances; a sample is appended only when the duration is
/// a finite, non-negative number. Timeouts therefore count without skewing
/// the distribution.
#[aggregate]
#[derive(Default)]
pub struct CategorySink {
    pub count: u64,
    pub samples: Vec<f64>,
}

impl CategorySink {
    fn record(&mut self, duration_ms: f64) {
        self.count += 1;
        if duration_ms.is_finite() && duration_ms >= 0.0 {
            self.samples.push(duration_ms);
        }
    }

    fn merge(&mut self, other: Self) {
        self.count += other.count;
        self.samples.extend(other.samples);
    }
}

/// Per-category counts, duration distributions, and the recovery/adaptation
/// distributions derived by the tracker.
#[aggregate]
#[derive(Default)]
pub struct ResilienceAggregate {
    pub success: CategorySink,
    pub fallback: CategorySink,
    pub circuit_open: CategorySink,
    pub failure: CategorySink,
    pub invalid: CategorySink,
    /// Every finite duration regardless of category.
    pub total_samples: Vec<f64>,
    pub recovery_samples: Vec<f64>,
    pub adaptation_samples: Vec<f64>,
}

impl ResilienceAggregate {
    /// Record one classified outcome. The category counter always advances;
    /// non-finite or negative durations are excluded from the distributions.
    pub fn record(&mut self, category: ResponseCategory, duration_ms: f64) {
        if duration_ms.is_finite() && duration_ms >= 0.0 {
            self.total_samples.push(duration_ms);
        }
        self.sink_mut(category).record(duration_ms);
    }

    pub fn sink(&self, category: ResponseCategory) -> &CategorySink {
        match category {
            ResponseCategory::Success => &self.success,
            ResponseCategory::Fallback => &self.fallback,
            ResponseCategory::CircuitOpen => &self.circuit_open,
            ResponseCategory::Failure => &self.failure,
            ResponseCategory::Invalid => &self.invalid,
        }
    }

    fn sink_mut(&mut self, category: ResponseCategory) -> &mut CategorySink {
        match category {
            ResponseCategory::Success => &mut self.success,
            ResponseCategory::Fallback => &mut self.fallback,
            ResponseCategory::CircuitOpen => &mut self.circuit_open,
            ResponseCategory::Failure => &mut self.failure,
            ResponseCategory::Invalid => &mut self.invalid,
        }
    }

    pub fn total(&self) -> u64 {
        ResponseCategory::ALL.iter().map(|&c| self.sink(c).count).sum()
    }

    /// Fraction of probes classified `Success` or `Fallback`. `Invalid`
    /// counts as unavailable here; the report stage exposes the alternate
    /// policy.
    pub fn availability(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.success.count + self.fallback.count) as f64 / total as f64
    }

    /// Fraction of probes classified `Success` only.
    pub fn success_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.success.count as f64 / total as f64
    }
}

impl Aggregate for ResilienceAggregate {
    type Metric = ProbeMetric;

    fn new() -> Self {
        ResilienceAggregate::default()
    }

    fn consume(&mut self, metric: &Self::Metric) {
        self.record(metric.category, metric.duration_ms.unwrap_or(f64::NAN));
        if let Some(recovery) = metric.recovery_ms {
            if recovery.is_finite() && recovery >= 0.0 {
                self.recovery_samples.push(recovery);
            }
        }
        if let Some(adaptation) = metric.adaptation_ms {
            if adaptation.is_finite() && adaptation >= 0.0 {
                self.adaptation_samples.push(adaptation);
            }
        }
    }

    fn merge(&mut self, other: Self) {
        self.success.merge(other.success);
        self.fallback.merge(other.fallback);
        self.circuit_open.merge(other.circuit_open);
        self.failure.merge(other.failure);
        self.invalid.merge(other.invalid);
        self.total_samples.extend(other.total_samples);
        self.recovery_samples.extend(other.recovery_samples);
        self.adaptation_samples.extend(other.adaptation_samples);
    }
}
