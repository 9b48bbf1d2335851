use std::future::Future;
use std::time::Instant;

use chrono::Utc;
use rand::Rng;
use reqwest::Client;
use serde::Serialize;

use crate::classify::{classify, ResponseCategory};
use crate::config::{Config, ConfigError};
use crate::metric::{Metric, ProbeMetric};
use crate::mode::ModeDistribution;
use crate::timeline::Timeline;
use crate::tracker::IterationContext;

const DEFAULT_ADAPTATION_THRESHOLD: u32 = 10;

/// One probe iteration. Implementations are handed the worker's private
/// [`IterationContext`] and return the sample to aggregate.
///
/// The executor clones one workload per worker, so implementations should be
/// cheap to clone (share heavy resources like HTTP clients internally, the
/// way [`PaymentWorkload`] does).
pub trait Workload: Send + Sync + Clone + 'static {
    type Metric: Metric;

    /// Structural configuration checks, run before any worker starts.
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    fn iterate(&self, ctx: &mut IterationContext) -> impl Future<Output = Self::Metric> + Send;
}

#[derive(Debug, Serialize)]
struct PaymentRequest {
    amount: f64,
    payment_method: &'static str,
    customer_id: String,
    /// ISO-8601, matching what the target's audit log expects.
    timestamp: String,
}

/// Probes the payment service once per iteration: resolve the active phase,
/// draw a request mode, `POST /pagar?modo={mode}`, classify the outcome, and
/// feed the recovery/adaptation tracker.
///
/// Timeouts and transport errors classify as `Failure` with no duration
/// sample; an out-of-contract status classifies as `Invalid` and is logged.
/// Neither ever aborts the worker loop.
#[derive(Clone, Debug)]
pub struct PaymentWorkload {
    config: Config,
    timeline: Timeline,
    distribution: Option<ModeDistribution>,
    adaptation_threshold: u32,
    client: Client,
}

impl PaymentWorkload {
    /// Fails fast on a malformed mode distribution: a broken one would
    /// invalidate every subsequent measurement.
    pub fn new(config: Config, timeline: Timeline) -> Result<Self, ConfigError> {
        let distribution = config
            .mode_distribution
            .as_deref()
            .map(str::parse::<ModeDistribution>)
            .transpose()?;
        let client = Client::builder().timeout(config.probe_timeout).build()?;
        Ok(Self {
            config,
            timeline,
            distribution,
            adaptation_threshold: DEFAULT_ADAPTATION_THRESHOLD,
            client,
        })
    }

    /// Consecutive failures a worker must see before the next healthy
    /// response counts as "adapted".
    pub fn adaptation_threshold(mut self, threshold: u32) -> Self {
        self.adaptation_threshold = threshold;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Warn (never fail) if the target is not reporting healthy. Useful
    /// before a long run; a sick target wastes the whole measurement.
    pub async fn preflight(&self) {
        let url = format!("{}/actuator/health", self.config.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!("target reporting healthy");
            }
            Ok(resp) => {
                tracing::warn!(status = resp.status().as_u16(), "target not reporting healthy");
            }
            Err(err) => {
                tracing::warn!(error = %err, "health preflight failed");
            }
        }
    }
}

impl Workload for PaymentWorkload {
    type Metric = ProbeMetric;

    fn validate(&self) -> Result<(), ConfigError> {
        self.timeline.validate()
    }

    fn iterate(&self, ctx: &mut IterationContext) -> impl Future<Output = ProbeMetric> + Send {
        async move {
            let elapsed = ctx.elapsed();
            let phase = self.timeline.resolve(elapsed);
            let label = phase.label.to_string();
            ctx.note_pattern(&label, elapsed);

            let mode = match &self.distribution {
                Some(distribution) => distribution.select(&mut ctx.rng),
                None => phase.mix.select(&mut ctx.rng),
            };

            let body = PaymentRequest {
                amount: 100.0 + ctx.rng.gen::<f64>() * 900.0,
                payment_method: "credit_card",
                customer_id: format!("customer-{}-{}", ctx.worker, Utc::now().timestamp_millis()),
                timestamp: Utc::now().to_rfc3339(),
            };
            let url = format!("{}/pagar?modo={}", self.config.base_url, mode.wire_name());

            let issued = Instant::now();
            let outcome = self.client.post(&url).json(&body).send().await;
            let duration = issued.elapsed();

            let (category, duration_ms) = match outcome {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let category = classify(status);
                    if category == ResponseCategory::Invalid {
                        tracing::warn!(status, %url, "unexpected status from target");
                    }
                    (category, Some(duration.as_secs_f64() * 1000.0))
                }
                Err(err) => {
                    if err.is_timeout() {
                        tracing::debug!(%url, "probe timed out");
                    } else {
                        tracing::debug!(%url, error = %err, "probe transport error");
                    }
                    (ResponseCategory::Failure, None)
                }
            };

            let now = ctx.elapsed();
            let emissions = ctx.observe(category, now, self.adaptation_threshold);

            ProbeMetric {
                category,
                mode,
                phase: label,
                duration_ms,
                recovery_ms: emissions.recovery.map(|d| d.as_secs_f64() * 1000.0),
                adaptation_ms: emissions.adaptation.map(|d| d.as_secs_f64() * 1000.0),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::InjectionMix;
    use crate::timeline::Phase;
    use std::time::Duration;

    fn timeline() -> Timeline {
        Timeline::builder()
            .phases(vec![Phase::new(
                "steady",
                Duration::ZERO,
                Duration::from_secs(60),
                InjectionMix::NONE,
            )])
            .build()
    }

    #[test]
    fn malformed_distribution_fails_before_any_iteration() {
        let config = Config::builder()
            .mode_distribution("normal:0.7,latencia:")
            .build();
        let err = PaymentWorkload::new(config, timeline()).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedDistribution { .. }), "{err}");
    }

    #[test]
    fn well_formed_distribution_is_accepted() {
        let config = Config::builder()
            .mode_distribution("normal:0.7,latencia:0.2,falha:0.1")
            .build();
        let workload = PaymentWorkload::new(config, timeline()).unwrap();
        assert!(workload.validate().is_ok());
    }

    #[test]
    fn empty_timeline_fails_validation() {
        let workload = PaymentWorkload::new(Config::default(), Timeline::builder().build()).unwrap();
        assert!(matches!(workload.validate(), Err(ConfigError::EmptyTimeline)));
    }

    #[test]
    fn payment_payload_shape() {
        let body = PaymentRequest {
            amount: 150.0,
            payment_method: "credit_card",
            customer_id: "customer-3-1700000000000".into(),
            timestamp: "2026-08-04T12:00:00+00:00".into(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["amount"], 150.0);
        assert_eq!(json["payment_method"], "credit_card");
        assert!(json["customer_id"].as_str().unwrap().starts_with("customer-"));
        assert!(json["timestamp"].as_str().is_some());
    }
}
