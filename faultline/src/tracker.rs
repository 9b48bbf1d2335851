use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::classify::ResponseCategory;

/// Client-side approximation of the target's breaker state. Per worker; it
/// tracks what this worker has observed, not the server's actual state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
}

/// Durations derived from one observation, to be fed into the aggregate.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Emissions {
    /// Time between the first failure of a degraded episode and the success
    /// that ended it.
    pub recovery: Option<Duration>,
    /// Time between the start of the current injection pattern and the first
    /// healthy response after a long failure streak.
    pub adaptation: Option<Duration>,
}

/// Per-virtual-user mutable state, created once per worker and threaded
/// through every iteration. Owned exclusively by its worker, never shared,
/// so it needs no synchronization.
#[derive(Debug)]
pub struct IterationContext {
    pub worker: u64,
    /// Worker-private randomness for mode selection and pacing jitter.
    pub rng: SmallRng,
    started_at: Instant,
    state: CircuitState,
    last_failure_at: Option<Duration>,
    circuit_open_observed: bool,
    consecutive_failures: u32,
    pattern: Option<String>,
    pattern_started_at: Duration,
}

impl IterationContext {
    /// `started_at` is the shared run origin: all phase and tracker math is
    /// relative to it, never to wall clock.
    pub fn new(worker: u64, started_at: Instant) -> Self {
        Self {
            worker,
            rng: SmallRng::from_entropy(),
            started_at,
            state: CircuitState::Closed,
            last_failure_at: None,
            circuit_open_observed: false,
            consecutive_failures: 0,
            pattern: None,
            pattern_started_at: Duration::ZERO,
        }
    }

    /// Monotonic time since the run started.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn circuit_open_observed(&self) -> bool {
        self.circuit_open_observed
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Restart the adaptation clock whenever the active injection pattern
    /// changes. The failure streak restarts with it, so adaptation is always
    /// measured against the pattern that caused the failures.
    pub fn note_pattern(&mut self, label: &str, now: Duration) {
        if self.pattern.as_deref() != Some(label) {
            self.pattern = Some(label.to_string());
            self.pattern_started_at = now;
            self.consecutive_failures = 0;
        }
    }

    /// Feed one classified outcome through the Closed/Open state machine.
    ///
    /// - `Closed` + failure/circuit-open → `Open`, stamping the failure time.
    /// - `Open` + fallback/circuit-open → still `Open`, nothing emitted.
    /// - `Open` + success → `Closed`, emitting the recovery duration.
    /// - a success or fallback after more than `adaptation_threshold`
    ///   consecutive failures emits the adaptation duration.
    ///
    /// `Invalid` never transitions the state: an out-of-contract status says
    /// nothing about the breaker.
    pub fn observe(
        &mut self,
        category: ResponseCategory,
        now: Duration,
        adaptation_threshold: u32,
    ) -> Emissions {
        let mut out = Emissions::default();
        let failure_streak = self.consecutive_failures;

        match category {
            ResponseCategory::Failure | ResponseCategory::CircuitOpen => {
                self.consecutive_failures += 1;
                if category == ResponseCategory::CircuitOpen {
                    self.circuit_open_observed = true;
                }
                if self.state == CircuitState::Closed {
                    self.state = CircuitState::Open;
                    // first failure of the episode; later failures keep it
                    self.last_failure_at = Some(now);
                }
            }
            ResponseCategory::Success => {
                if failure_streak > adaptation_threshold {
                    out.adaptation = Some(now.saturating_sub(self.pattern_started_at));
                }
                self.consecutive_failures = 0;
                if self.state == CircuitState::Open {
                    self.state = CircuitState::Closed;
                    if let Some(failed_at) = self.last_failure_at.take() {
                        out.recovery = Some(now.saturating_sub(failed_at));
                    }
                    self.circuit_open_observed = false;
                }
            }
            ResponseCategory::Fallback => {
                if failure_streak > adaptation_threshold {
                    out.adaptation = Some(now.saturating_sub(self.pattern_started_at));
                }
                self.consecutive_failures = 0;
                // degraded but responsive: the circuit stays where it is
            }
            ResponseCategory::Invalid => {}
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> IterationContext {
        IterationContext::new(0, Instant::now())
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn recovery_duration_spans_first_failure_to_next_success() {
        let mut ctx = ctx();
        let e = ctx.observe(ResponseCategory::Failure, ms(10_000), 10);
        assert_eq!(ctx.state(), CircuitState::Open);
        assert_eq!(e, Emissions::default());

        let e = ctx.observe(ResponseCategory::Success, ms(13_200), 10);
        assert_eq!(ctx.state(), CircuitState::Closed);
        assert_eq!(e.recovery, Some(ms(3_200)));
    }

    #[test]
    fn recovery_measured_from_first_failure_of_the_episode() {
        let mut ctx = ctx();
        ctx.observe(ResponseCategory::Failure, ms(1_000), 10);
        ctx.observe(ResponseCategory::Failure, ms(2_000), 10);
        ctx.observe(ResponseCategory::CircuitOpen, ms(3_000), 10);
        let e = ctx.observe(ResponseCategory::Success, ms(5_000), 10);
        assert_eq!(e.recovery, Some(ms(4_000)));
    }

    #[test]
    fn fallback_keeps_the_circuit_open_without_emitting() {
        let mut ctx = ctx();
        ctx.observe(ResponseCategory::CircuitOpen, ms(1_000), 10);
        assert_eq!(ctx.state(), CircuitState::Open);
        assert!(ctx.circuit_open_observed());

        let e = ctx.observe(ResponseCategory::Fallback, ms(2_000), 10);
        assert_eq!(ctx.state(), CircuitState::Open);
        assert_eq!(e.recovery, None);

        let e = ctx.observe(ResponseCategory::Success, ms(4_500), 10);
        assert_eq!(e.recovery, Some(ms(3_500)));
        assert!(!ctx.circuit_open_observed());
    }

    #[test]
    fn success_while_closed_emits_nothing() {
        let mut ctx = ctx();
        let e = ctx.observe(ResponseCategory::Success, ms(1_000), 10);
        assert_eq!(e, Emissions::default());
        assert_eq!(ctx.state(), CircuitState::Closed);
    }

    #[test]
    fn invalid_does_not_transition_the_state() {
        let mut ctx = ctx();
        ctx.observe(ResponseCategory::Invalid, ms(1_000), 10);
        assert_eq!(ctx.state(), CircuitState::Closed);

        ctx.observe(ResponseCategory::Failure, ms(2_000), 10);
        ctx.observe(ResponseCategory::Invalid, ms(3_000), 10);
        assert_eq!(ctx.state(), CircuitState::Open);
    }

    #[test]
    fn adaptation_emitted_after_threshold_exceeded() {
        let mut ctx = ctx();
        ctx.note_pattern("burst", ms(0));
        for i in 0..4 {
            ctx.observe(ResponseCategory::Failure, ms(1_000 * (i + 1)), 3);
        }
        assert_eq!(ctx.consecutive_failures(), 4);

        let e = ctx.observe(ResponseCategory::Fallback, ms(6_000), 3);
        assert_eq!(e.adaptation, Some(ms(6_000)));
        assert_eq!(ctx.consecutive_failures(), 0);
    }

    #[test]
    fn adaptation_measured_from_pattern_start() {
        let mut ctx = ctx();
        ctx.note_pattern("steady", ms(0));
        ctx.note_pattern("burst", ms(60_000));
        for i in 0..5 {
            ctx.observe(ResponseCategory::Failure, ms(61_000 + 500 * i), 3);
        }
        let e = ctx.observe(ResponseCategory::Success, ms(65_000), 3);
        assert_eq!(e.adaptation, Some(ms(5_000)));
    }

    #[test]
    fn pattern_change_resets_the_failure_streak() {
        let mut ctx = ctx();
        ctx.note_pattern("burst", ms(0));
        for i in 0..5 {
            ctx.observe(ResponseCategory::Failure, ms(1_000 * (i + 1)), 3);
        }
        ctx.note_pattern("calm", ms(10_000));
        assert_eq!(ctx.consecutive_failures(), 0);

        // the streak under the old pattern must not leak an emission
        let e = ctx.observe(ResponseCategory::Success, ms(11_000), 3);
        assert_eq!(e.adaptation, None);
        // but the recovery emission still fires: the circuit was open
        assert_eq!(e.recovery, Some(ms(10_000)));
    }

    #[test]
    fn streak_below_threshold_emits_no_adaptation() {
        let mut ctx = ctx();
        ctx.note_pattern("burst", ms(0));
        for i in 0..3 {
            ctx.observe(ResponseCategory::Failure, ms(1_000 * (i + 1)), 3);
        }
        let e = ctx.observe(ResponseCategory::Success, ms(5_000), 3);
        assert_eq!(e.adaptation, None);
    }
}
