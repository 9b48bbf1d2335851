use std::fmt::Debug;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::aggregate::{Aggregate, ResilienceAggregate};

/// A report derives final statistics from an aggregate. Keeping derivation
/// here means different report formats can read the same raw aggregate.
pub trait Report<A>
where
    Self: Send + Sync + Debug + From<A> + Serialize + DeserializeOwned,
    A: Aggregate,
{
}

/// Reporters consume a finished report and send it somewhere: stdout, a
/// file, a metrics backend, wherever.
#[async_trait]
pub trait Reporter<A: Aggregate, R: Report<A>> {
    async fn report(&self, report: R) -> Result<(), Box<dyn std::error::Error>>;
}

/// Whether `Invalid` responses count toward availability. The source
/// scenarios disagree on this, so it is a knob rather than a law; the
/// default treats `Invalid` as unavailable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportPolicy {
    pub invalid_is_available: bool,
}

/// Summary statistics over one duration distribution, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationStats {
    pub count: usize,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

impl DurationStats {
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self { count: 0, mean_ms: 0.0, p50_ms: 0.0, p95_ms: 0.0, p99_ms: 0.0, max_ms: 0.0 };
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        let len = sorted.len();
        let pct = |p: f64| sorted[((p / 100.0) * (len - 1) as f64).round() as usize];
        Self {
            count: len,
            mean_ms: sorted.iter().sum::<f64>() / len as f64,
            p50_ms: pct(50.0),
            p95_ms: pct(95.0),
            p99_ms: pct(99.0),
            max_ms: sorted[len - 1],
        }
    }
}

/// End-of-run snapshot: counts, rates, and duration distributions, in the
/// shape external threshold evaluation consumes (e.g. "availability > 0.90",
/// "p95 duration < 500ms").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResilienceReport {
    /// Target deployment label, for comparing runs across versions.
    pub version: Option<String>,
    pub total: u64,
    pub success: u64,
    pub fallback: u64,
    pub circuit_open: u64,
    pub failure: u64,
    pub invalid: u64,
    /// Success ∪ Fallback over everything (policy-adjustable for Invalid).
    pub availability: f64,
    /// Success only.
    pub success_rate: f64,
    pub duration: DurationStats,
    pub duration_success: DurationStats,
    pub duration_fallback: DurationStats,
    /// CircuitOpen, Failure, and Invalid lumped together, the way the
    /// analysis pipeline consumes them.
    pub duration_failure: DurationStats,
    pub recovery: DurationStats,
    pub adaptation: DurationStats,
}

impl ResilienceReport {
    pub fn with_policy(agg: &ResilienceAggregate, policy: ReportPolicy) -> Self {
        let total = agg.total();
        let mut available = agg.success.count + agg.fallback.count;
        if policy.invalid_is_available {
            available += agg.invalid.count;
        }
        let rate = |n: u64| if total == 0 { 0.0 } else { n as f64 / total as f64 };

        let mut failure_samples = agg.circuit_open.samples.clone();
        failure_samples.extend_from_slice(&agg.failure.samples);
        failure_samples.extend_from_slice(&agg.invalid.samples);

        Self {
            version: None,
            total,
            success: agg.success.count,
            fallback: agg.fallback.count,
            circuit_open: agg.circuit_open.count,
            failure: agg.failure.count,
            invalid: agg.invalid.count,
            availability: rate(available),
            success_rate: rate(agg.success.count),
            duration: DurationStats::from_samples(&agg.total_samples),
            duration_success: DurationStats::from_samples(&agg.success.samples),
            duration_fallback: DurationStats::from_samples(&agg.fallback.samples),
            duration_failure: DurationStats::from_samples(&failure_samples),
            recovery: DurationStats::from_samples(&agg.recovery_samples),
            adaptation: DurationStats::from_samples(&agg.adaptation_samples),
        }
    }

    pub fn versioned(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

impl From<ResilienceAggregate> for ResilienceReport {
    fn from(agg: ResilienceAggregate) -> Self {
        Self::with_policy(&agg, ReportPolicy::default())
    }
}

impl Report<ResilienceAggregate> for ResilienceReport {}

/// Pretty-prints the report to stdout.
pub struct StdoutReporter;

#[async_trait]
impl Reporter<ResilienceAggregate, ResilienceReport> for StdoutReporter {
    async fn report(&self, report: ResilienceReport) -> Result<(), Box<dyn std::error::Error>> {
        println!("{report:#?}");
        Ok(())
    }
}

/// Machine-readable variant for the analysis pipeline.
pub struct JsonReporter;

#[async_trait]
impl Reporter<ResilienceAggregate, ResilienceReport> for JsonReporter {
    async fn report(&self, report: ResilienceReport) -> Result<(), Box<dyn std::error::Error>> {
        let value = serde_json::to_string_pretty(&report)?;
        println!("{value}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ResponseCategory;

    fn mixed_aggregate() -> ResilienceAggregate {
        let mut agg = ResilienceAggregate::new();
        for category in [
            ResponseCategory::Success,
            ResponseCategory::Fallback,
            ResponseCategory::CircuitOpen,
            ResponseCategory::Failure,
            ResponseCategory::Success,
        ] {
            agg.record(category, 10.0);
        }
        agg
    }

    #[test]
    fn report_derives_the_canonical_rates() {
        let report = ResilienceReport::from(mixed_aggregate());
        assert_eq!(report.total, 5);
        assert_eq!(report.success, 2);
        assert_eq!(report.fallback, 1);
        assert!((report.availability - 0.6).abs() < 1e-12);
        assert!((report.success_rate - 0.4).abs() < 1e-12);
    }

    #[test]
    fn invalid_policy_flips_availability() {
        let mut agg = mixed_aggregate();
        agg.record(ResponseCategory::Invalid, 1.0);

        let strict = ResilienceReport::with_policy(&agg, ReportPolicy::default());
        assert!((strict.availability - 3.0 / 6.0).abs() < 1e-12);

        let lenient =
            ResilienceReport::with_policy(&agg, ReportPolicy { invalid_is_available: true });
        assert!((lenient.availability - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn empty_aggregate_reports_zeros() {
        let report = ResilienceReport::from(ResilienceAggregate::new());
        assert_eq!(report.total, 0);
        assert_eq!(report.availability, 0.0);
        assert_eq!(report.duration.count, 0);
        assert_eq!(report.duration.p95_ms, 0.0);
    }

    #[test]
    fn version_label_is_attached() {
        let report = ResilienceReport::from(ResilienceAggregate::new()).versioned("V2_agressivo");
        assert_eq!(report.version.as_deref(), Some("V2_agressivo"));
    }

    #[test]
    fn serializes_for_the_analysis_pipeline() {
        let report = ResilienceReport::from(mixed_aggregate());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["total"], 5);
        assert!(json["availability"].as_f64().is_some());
        assert!(json["recovery"]["p95_ms"].as_f64().is_some());
    }

    mod duration_stats {
        use super::*;

        #[test]
        fn percentiles_over_a_known_distribution() {
            let samples: Vec<f64> = (1..=100).map(f64::from).collect();
            let stats = DurationStats::from_samples(&samples);
            assert_eq!(stats.count, 100);
            assert!((stats.mean_ms - 50.5).abs() < 1e-9);
            assert_eq!(stats.p50_ms, 51.0);
            assert_eq!(stats.p95_ms, 95.0);
            assert_eq!(stats.p99_ms, 99.0);
            assert_eq!(stats.max_ms, 100.0);
        }

        #[test]
        fn single_sample_is_every_percentile() {
            let stats = DurationStats::from_samples(&[42.0]);
            assert_eq!(stats.p50_ms, 42.0);
            assert_eq!(stats.p99_ms, 42.0);
            assert_eq!(stats.max_ms, 42.0);
        }

        #[test]
        fn unsorted_input_is_handled() {
            let stats = DurationStats::from_samples(&[30.0, 10.0, 20.0]);
            assert_eq!(stats.p50_ms, 20.0);
            assert_eq!(stats.max_ms, 30.0);
        }
    }
}
