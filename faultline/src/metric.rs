use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};

use crate::classify::ResponseCategory;
use crate::macros::metric;
use crate::mode::Mode;

/// Metrics that should be collected and processed by the framework.
/// Metrics can be composed of other metrics as well.
pub trait Metric
where
    Self: Serialize + DeserializeOwned + PartialOrd + PartialEq + Send + Sync + Debug + Clone,
{
}

/// Sample produced by one probe iteration.
///
/// `duration_ms` is absent for timeouts and transport errors, which are
/// classified as `Failure` but contribute no duration sample. The recovery
/// and adaptation fields carry the tracker's emissions for this iteration,
/// when there are any.
#[metric]
pub struct ProbeMetric {
    pub category: ResponseCategory,
    pub mode: Mode,
    /// Label of the phase that was active when the probe was issued.
    pub phase: String,
    pub duration_ms: Option<f64>,
    pub recovery_ms: Option<f64>,
    pub adaptation_ms: Option<f64>,
}

impl ProbeMetric {
    pub fn new(category: ResponseCategory, mode: Mode, phase: impl Into<String>) -> Self {
        Self {
            category,
            mode,
            phase: phase.into(),
            duration_ms: None,
            recovery_ms: None,
            adaptation_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_round_trip() {
        let metric = ProbeMetric {
            category: ResponseCategory::Fallback,
            mode: Mode::Failure,
            phase: "stress".into(),
            duration_ms: Some(12.5),
            recovery_ms: None,
            adaptation_ms: Some(3200.0),
        };
        let json = serde_json::to_string(&metric).unwrap();
        let back: ProbeMetric = serde_json::from_str(&json).unwrap();
        assert_eq!(back, metric);
    }
}
