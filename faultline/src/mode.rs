use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Request mode sent to the target as the `modo` query parameter.
///
/// The wire names are the ones the payment service understands.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Mode {
    Normal,
    Latency,
    Failure,
}

impl Mode {
    /// Query-string value understood by the target service.
    pub fn wire_name(self) -> &'static str {
        match self {
            Mode::Normal => "normal",
            Mode::Latency => "latencia",
            Mode::Failure => "falha",
        }
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Mode::Normal),
            "latencia" => Ok(Mode::Latency),
            "falha" => Ok(Mode::Failure),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

/// Failure/latency injection weights for one phase; the remainder of the
/// probability mass goes to `Normal`.
///
/// Weights are clamped at construction so `failure + latency <= 1` always
/// holds; a violating configuration is reported once via `tracing::warn!`
/// rather than silently accepted or rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InjectionMix {
    failure: f64,
    latency: f64,
}

impl InjectionMix {
    /// No injection at all: every draw is `Normal`.
    pub const NONE: InjectionMix = InjectionMix { failure: 0.0, latency: 0.0 };

    pub fn new(failure: f64, latency: f64) -> Self {
        let failure = if failure.is_finite() { failure.clamp(0.0, 1.0) } else { 0.0 };
        let mut latency = if latency.is_finite() { latency.clamp(0.0, 1.0) } else { 0.0 };
        if failure + latency > 1.0 {
            tracing::warn!(failure, latency, "injection weights exceed 1.0, clamping latency");
            latency = 1.0 - failure;
        }
        Self { failure, latency }
    }

    pub fn failure(&self) -> f64 {
        self.failure
    }

    pub fn latency(&self) -> f64 {
        self.latency
    }

    /// Draw a mode: `r < failure` → `Failure`, `r < failure + latency` →
    /// `Latency`, otherwise `Normal`.
    pub fn select<R: Rng>(&self, rng: &mut R) -> Mode {
        let r = rng.gen::<f64>();
        if r < self.failure {
            Mode::Failure
        } else if r < self.failure + self.latency {
            Mode::Latency
        } else {
            Mode::Normal
        }
    }
}

impl Default for InjectionMix {
    fn default() -> Self {
        InjectionMix::NONE
    }
}

/// Weighted draw table over request modes, for scenarios configured with an
/// explicit `mode:weight` distribution instead of per-phase weights.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeDistribution {
    entries: Vec<(Mode, f64)>,
    total: f64,
}

impl ModeDistribution {
    pub fn new(entries: Vec<(Mode, f64)>) -> Self {
        let total = entries.iter().map(|(_, w)| w).sum();
        Self { entries, total }
    }

    /// Cumulative-weight draw: the first mode whose cumulative weight reaches
    /// `r * total` wins. A non-positive total degenerates to always `Normal`.
    pub fn select<R: Rng>(&self, rng: &mut R) -> Mode {
        if self.total <= 0.0 {
            return Mode::Normal;
        }
        let target = rng.gen::<f64>() * self.total;
        let mut cumulative = 0.0;
        for &(mode, weight) in &self.entries {
            cumulative += weight;
            if target <= cumulative {
                return mode;
            }
        }
        // floating-point slack: fall back to the last entry
        self.entries.last().map(|&(mode, _)| mode).unwrap_or(Mode::Normal)
    }
}

impl FromStr for ModeDistribution {
    type Err = ConfigError;

    /// Parse a comma-separated `mode:weight` list, e.g.
    /// `normal:0.7,latencia:0.2,falha:0.1`. Any malformed entry fails the
    /// whole parse: a broken distribution invalidates every subsequent
    /// measurement, so it must never be silently dropped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut entries = Vec::new();
        for raw in s.split(',') {
            let entry = raw.trim();
            let (name, weight) = entry.split_once(':').ok_or_else(|| {
                ConfigError::MalformedDistribution { entry: entry.to_string() }
            })?;
            let mode: Mode = name.trim().parse()?;
            let weight: f64 = weight.trim().parse().map_err(|_| {
                ConfigError::MalformedDistribution { entry: entry.to_string() }
            })?;
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::MalformedDistribution { entry: entry.to_string() });
            }
            entries.push((mode, weight));
        }
        if entries.is_empty() {
            return Err(ConfigError::MalformedDistribution { entry: s.to_string() });
        }
        Ok(Self::new(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    mod injection_mix {
        use super::*;

        #[test]
        fn weights_converge_over_many_draws() {
            let mix = InjectionMix::new(0.3, 0.2);
            let mut rng = StdRng::seed_from_u64(42);
            let (mut failures, mut latencies) = (0u32, 0u32);
            let draws = 10_000;
            for _ in 0..draws {
                match mix.select(&mut rng) {
                    Mode::Failure => failures += 1,
                    Mode::Latency => latencies += 1,
                    Mode::Normal => {}
                }
            }
            let failure_freq = f64::from(failures) / f64::from(draws);
            let latency_freq = f64::from(latencies) / f64::from(draws);
            assert!((failure_freq - 0.3).abs() <= 0.02, "failure freq {failure_freq}");
            assert!((latency_freq - 0.2).abs() <= 0.02, "latency freq {latency_freq}");
        }

        #[test]
        fn oversubscribed_weights_are_clamped() {
            let mix = InjectionMix::new(0.8, 0.6);
            assert_eq!(mix.failure(), 0.8);
            assert!((mix.latency() - 0.2).abs() < 1e-12);
        }

        #[test]
        fn weights_outside_unit_interval_are_clamped() {
            let mix = InjectionMix::new(-0.5, 1.5);
            assert_eq!(mix.failure(), 0.0);
            assert_eq!(mix.latency(), 1.0);
        }

        #[test]
        fn non_finite_weights_become_zero() {
            let mix = InjectionMix::new(f64::NAN, f64::INFINITY);
            assert_eq!(mix.failure(), 0.0);
            assert_eq!(mix.latency(), 0.0);
        }

        #[test]
        fn all_failure_mix_only_draws_failure() {
            let mix = InjectionMix::new(1.0, 0.0);
            let mut rng = StdRng::seed_from_u64(7);
            for _ in 0..100 {
                assert_eq!(mix.select(&mut rng), Mode::Failure);
            }
        }
    }

    mod distribution {
        use super::*;

        #[test]
        fn parses_the_default_distribution() {
            let dist: ModeDistribution = "normal:0.7,latencia:0.2,falha:0.1".parse().unwrap();
            let mut rng = StdRng::seed_from_u64(11);
            let mut normals = 0u32;
            for _ in 0..10_000 {
                if dist.select(&mut rng) == Mode::Normal {
                    normals += 1;
                }
            }
            let freq = f64::from(normals) / 10_000.0;
            assert!((freq - 0.7).abs() <= 0.02, "normal freq {freq}");
        }

        #[test]
        fn unparseable_weight_is_a_config_error() {
            let err = "normal:0.7,latencia:".parse::<ModeDistribution>().unwrap_err();
            assert!(matches!(err, ConfigError::MalformedDistribution { .. }), "{err}");
        }

        #[test]
        fn unknown_mode_is_a_config_error() {
            let err = "normal:0.7,chaos:0.3".parse::<ModeDistribution>().unwrap_err();
            assert!(matches!(err, ConfigError::UnknownMode(_)), "{err}");
        }

        #[test]
        fn missing_separator_is_a_config_error() {
            let err = "normal".parse::<ModeDistribution>().unwrap_err();
            assert!(matches!(err, ConfigError::MalformedDistribution { .. }), "{err}");
        }

        #[test]
        fn negative_weight_is_a_config_error() {
            let err = "normal:-1".parse::<ModeDistribution>().unwrap_err();
            assert!(matches!(err, ConfigError::MalformedDistribution { .. }), "{err}");
        }

        #[test]
        fn non_positive_total_degenerates_to_normal() {
            let dist = ModeDistribution::new(vec![(Mode::Failure, 0.0), (Mode::Latency, 0.0)]);
            let mut rng = StdRng::seed_from_u64(3);
            for _ in 0..100 {
                assert_eq!(dist.select(&mut rng), Mode::Normal);
            }
        }

        #[test]
        fn weights_are_normalized_by_total() {
            // weights summing to 10 behave like 0.8 / 0.2
            let dist = ModeDistribution::new(vec![(Mode::Normal, 8.0), (Mode::Failure, 2.0)]);
            let mut rng = StdRng::seed_from_u64(5);
            let mut failures = 0u32;
            for _ in 0..10_000 {
                if dist.select(&mut rng) == Mode::Failure {
                    failures += 1;
                }
            }
            let freq = f64::from(failures) / 10_000.0;
            assert!((freq - 0.2).abs() <= 0.02, "failure freq {freq}");
        }
    }
}
