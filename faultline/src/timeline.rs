use std::time::Duration;

use typed_builder::TypedBuilder;

use crate::config::ConfigError;
use crate::mode::InjectionMix;

/// One named time window `[start, end)` in run-elapsed seconds, with its
/// injection weights.
#[derive(Debug, Clone)]
pub struct Phase {
    pub name: String,
    pub start: Duration,
    pub end: Duration,
    pub mix: InjectionMix,
}

impl Phase {
    pub fn new(name: impl Into<String>, start: Duration, end: Duration, mix: InjectionMix) -> Self {
        Self { name: name.into(), start, end, mix }
    }

    fn contains(&self, elapsed: Duration) -> bool {
        self.start <= elapsed && elapsed < self.end
    }
}

/// Recurring downtime window: the first `downtime_ratio` share of every
/// `cycle_length`, with the cycle origin shifted by `offset`.
///
/// An 80s cycle with ratio 0.75 and a 20s offset keeps the target "down" for
/// 60s of every 80s, starting 60s into the run.
#[derive(Debug, Clone, TypedBuilder)]
pub struct CyclicWindow {
    pub cycle_length: Duration,
    pub downtime_ratio: f64,
    #[builder(default = Duration::ZERO)]
    pub offset: Duration,
    #[builder(default = String::from("downtime"), setter(into))]
    pub label: String,
    pub mix: InjectionMix,
}

impl CyclicWindow {
    fn covers(&self, elapsed: Duration) -> bool {
        let cycle = self.cycle_length.as_secs_f64();
        if cycle <= 0.0 {
            return false;
        }
        let position = (elapsed.as_secs_f64() + self.offset.as_secs_f64()) % cycle;
        position < cycle * self.downtime_ratio
    }
}

/// Absolute outage window `[start, end)` that wins over cyclic windows and
/// base phases alike. Used for forced maintenance periods.
#[derive(Debug, Clone)]
pub struct OutageWindow {
    pub start: Duration,
    pub end: Duration,
    pub label: String,
    pub mix: InjectionMix,
}

impl OutageWindow {
    pub fn new(start: Duration, end: Duration, label: impl Into<String>, mix: InjectionMix) -> Self {
        Self { start, end, label: label.into(), mix }
    }

    fn contains(&self, elapsed: Duration) -> bool {
        self.start <= elapsed && elapsed < self.end
    }
}

/// Which layer of the timeline produced a resolved phase, in precedence
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseSource {
    Override,
    Cyclic,
    Base,
    Default,
}

/// Injection parameters active at one instant of the run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPhase<'a> {
    pub label: &'a str,
    pub mix: InjectionMix,
    pub source: PhaseSource,
}

/// Declarative, ordered description of the run's time windows.
///
/// The timeline is static for the whole run; [`Timeline::resolve`] is a pure
/// function of it and the elapsed time. Elapsed time is always run-relative
/// (seconds since the run started), never wall clock.
#[derive(Debug, Clone, TypedBuilder)]
pub struct Timeline {
    #[builder(default)]
    pub phases: Vec<Phase>,
    #[builder(default)]
    pub cycle: Option<CyclicWindow>,
    #[builder(default)]
    pub overrides: Vec<OutageWindow>,
    /// Applies whenever no other window matches.
    #[builder(default = String::from("steady"), setter(into))]
    pub default_label: String,
    #[builder(default)]
    pub default_mix: InjectionMix,
}

impl Timeline {
    /// Structural checks that would invalidate every downstream measurement.
    /// Run before any worker starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.phases.is_empty() && self.cycle.is_none() && self.overrides.is_empty() {
            return Err(ConfigError::EmptyTimeline);
        }
        for (i, a) in self.overrides.iter().enumerate() {
            for b in &self.overrides[i + 1..] {
                if a.start < b.end && b.start < a.end {
                    return Err(ConfigError::OverlappingOverrides {
                        first: a.label.clone(),
                        second: b.label.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Active phase for a given run-elapsed time.
    ///
    /// Precedence, highest to lowest: absolute outage window, cyclic downtime
    /// window, base phase list, default. Base phases are scanned in
    /// declaration order; if two are misconfigured to overlap, the first
    /// match wins.
    pub fn resolve(&self, elapsed: Duration) -> ResolvedPhase<'_> {
        if let Some(window) = self.overrides.iter().find(|w| w.contains(elapsed)) {
            return ResolvedPhase {
                label: &window.label,
                mix: window.mix,
                source: PhaseSource::Override,
            };
        }
        if let Some(cycle) = self.cycle.as_ref().filter(|c| c.covers(elapsed)) {
            return ResolvedPhase { label: &cycle.label, mix: cycle.mix, source: PhaseSource::Cyclic };
        }
        if let Some(phase) = self.phases.iter().find(|p| p.contains(elapsed)) {
            return ResolvedPhase { label: &phase.name, mix: phase.mix, source: PhaseSource::Base };
        }
        ResolvedPhase {
            label: &self.default_label,
            mix: self.default_mix,
            source: PhaseSource::Default,
        }
    }
}
