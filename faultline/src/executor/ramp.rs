use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use typed_builder::TypedBuilder;

use super::{Executor, RunError};
use crate::aggregate::Aggregate;
use crate::scenario::Scenario;
use crate::tracker::IterationContext;
use crate::workload::Workload;

use internals::*;

/// One ramp segment: interpolate the probe rate from the previous segment's
/// target to `target` probes/second over `duration`.
///
/// A zero-duration segment only jumps the governor's instantaneous rate for
/// subsequent segments; it does not itself release probes.
#[derive(Debug, Clone, Copy)]
pub struct RateStage {
    pub duration: Duration,
    /// Probes per second.
    pub target: f64,
}

impl RateStage {
    pub fn new(duration: Duration, target: f64) -> Self {
        Self { duration, target }
    }
}

/// The semaphore keeps 3 bits of usize for flags; cap permits below that.
const MAX_TOKENS: usize = usize::MAX >> 3;

/// Token-bucket executor: a governor task refills a semaphore at the
/// interpolated stage rate and each virtual user claims one permit per probe.
///
/// - The governor ticks every `tick`, adding permits according to a linear
///   interpolation between the previous stage's rate and the current one,
///   carrying fractional permits across ticks so the long-term average rate
///   is preserved.
/// - `bucket_capacity` bounds how many unclaimed permits can pile up,
///   limiting bursts after a slow stretch.
/// - Shutdown only interrupts a worker waiting for a permit; a probe that
///   already holds one always finishes.
#[derive(TypedBuilder)]
pub struct RampExecutor {
    pub stages: Vec<RateStage>,
    #[builder(default = Duration::from_millis(100))]
    pub tick: Duration,
    #[builder(default = MAX_TOKENS)]
    pub bucket_capacity: usize,
    #[builder(default = num_cpus::get() * 120)]
    pub vus: usize,
}

impl<A, W> Executor<A, W> for RampExecutor
where
    A: Aggregate + 'static,
    W: Workload<Metric = A::Metric>,
{
    async fn exec(&self, scenario: &Scenario<A, Self, W>) -> Result<A, RunError> {
        scenario.workload.validate()?;

        let (signals, go_tx, shutdown_tx) = RunSignals::new();
        let started_at = std::time::Instant::now();

        tracing::info!("spawning rate governor...");
        let governor = tokio::spawn(rate_governor(
            signals.clone(),
            self.stages.clone(),
            self.tick,
            self.bucket_capacity,
        ));

        tracing::info!(vus = self.vus, "spawning virtual users...");
        let handles = spawn_vus::<A, W>(signals, self.vus, scenario.workload.clone(), started_at);

        tracing::info!("running scenario: {}", scenario.name);
        go_tx
            .send(true)
            .map_err(|e| RunError::Coordination(e.to_string()))?;

        // The governor finishing its stages means the run is over.
        governor
            .await
            .map_err(|e| RunError::Coordination(e.to_string()))?;
        shutdown_tx
            .send(true)
            .map_err(|e| RunError::Coordination(e.to_string()))?;

        tracing::info!("retrieving data from workers...");
        let mut final_agg = A::new();
        for joined in join_all(handles).await {
            match joined {
                Ok(agg) => final_agg.merge(agg),
                Err(err) => tracing::error!(error = %err, "worker panicked, dropping its samples"),
            }
        }

        tracing::info!("done running scenario: {}", scenario.name);
        Ok(final_agg)
    }
}

#[cfg(feature = "internals")]
pub use internals::*;

/// Internal plumbing, exposed behind the `internals` feature for custom
/// executors.
mod internals {
    use super::*;

    /// Shared coordination state for the governor and all worker tasks.
    ///
    /// `go` uses a watch channel rather than a notify so a late-starting task
    /// cannot miss the start signal.
    #[derive(Clone)]
    pub struct RunSignals {
        pub go: watch::Receiver<bool>,
        pub shutdown: watch::Receiver<bool>,
        /// The token bucket. Workers acquire permits, the governor adds them.
        pub tokens: Arc<Semaphore>,
    }

    impl RunSignals {
        pub fn new() -> (Self, watch::Sender<bool>, watch::Sender<bool>) {
            let (go_tx, go_rx) = watch::channel(false);
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            (
                Self {
                    go: go_rx,
                    shutdown: shutdown_rx,
                    tokens: Arc::new(Semaphore::new(0)),
                },
                go_tx,
                shutdown_tx,
            )
        }
    }

    /// Governor task: walks the stages, adding permits each tick at the
    /// interpolated rate, until the stages are exhausted or shutdown wins.
    pub async fn rate_governor(
        signals: RunSignals,
        stages: Vec<RateStage>,
        tick: Duration,
        bucket_capacity: usize,
    ) {
        let RunSignals { mut go, mut shutdown, tokens } = signals;

        let refill = async {
            if go.wait_for(|g| *g).await.is_err() {
                return;
            }
            let mut rate = 0.0;
            let mut fractional = 0.0;
            let total = stages.len();

            for (i, stage) in stages.into_iter().enumerate() {
                // instant jump: lets a run start at (or spike to) a rate
                if stage.duration.is_zero() {
                    rate = stage.target;
                    continue;
                }

                tracing::debug!(stage = i, total, target = stage.target, "entering ramp stage");
                let stage_start = Instant::now();
                let mut next_tick = Instant::now();
                let start_rate = rate;
                let end_rate = stage.target;

                loop {
                    let elapsed = Instant::now().duration_since(stage_start);
                    if elapsed >= stage.duration {
                        break;
                    }
                    next_tick += tick;

                    let (add, carry) = refill_for_tick(
                        elapsed,
                        stage.duration,
                        start_rate,
                        end_rate,
                        fractional,
                        tick,
                    );
                    fractional = carry;

                    if add > 0 {
                        let available = tokens.available_permits();
                        if available < bucket_capacity {
                            let free = bucket_capacity - available;
                            tokens.add_permits(add.min(free));
                        }
                    }
                    tokio::time::sleep_until(next_tick).await;
                }
                // land exactly on the stage target so rounding never leaks
                // into the next stage
                rate = end_rate;
            }
        };

        tokio::select! {
            _ = refill => {
                tracing::debug!("governor finished all stages");
            }
            _ = shutdown.wait_for(|b| *b) => {
                tracing::debug!("governor received shutdown");
            }
        }
    }

    /// Permits to add for one governor tick, with the fractional remainder
    /// carried into the next tick.
    ///
    /// The instantaneous rate is a linear interpolation between `start_rate`
    /// and `end_rate` across the stage; multiplying by the tick length gives
    /// a fractional permit count whose whole part is released now and whose
    /// remainder is carried, so the long-term average matches the ramp.
    pub fn refill_for_tick(
        elapsed: Duration,
        stage_duration: Duration,
        start_rate: f64,
        end_rate: f64,
        fractional: f64,
        tick: Duration,
    ) -> (usize, f64) {
        let t = (elapsed.as_secs_f64() / stage_duration.as_secs_f64()).min(1.0);
        let rate = start_rate + (end_rate - start_rate) * t;
        let add = rate * tick.as_secs_f64() + fractional;

        let whole = add.floor();
        let carry = add - whole;

        let permits = if whole >= MAX_TOKENS as f64 {
            MAX_TOKENS
        } else if whole < 0.0 {
            0
        } else {
            whole as usize
        };
        (permits, carry)
    }

    /// Spawn `vus` worker tasks. Each waits for the go signal, then claims
    /// one permit per probe. Shutdown interrupts the wait for a permit, never
    /// a probe in flight.
    pub fn spawn_vus<A, W>(
        signals: RunSignals,
        vus: usize,
        workload: W,
        started_at: std::time::Instant,
    ) -> Vec<JoinHandle<A>>
    where
        A: Aggregate + 'static,
        W: Workload<Metric = A::Metric>,
    {
        (0..vus)
            .map(|i| {
                let RunSignals { mut go, mut shutdown, tokens } = signals.clone();
                let workload = workload.clone();
                tokio::spawn(async move {
                    let mut ctx = IterationContext::new(i as u64, started_at);
                    let mut agg = A::new();

                    if go.wait_for(|g| *g).await.is_err() {
                        return agg;
                    }
                    loop {
                        tokio::select! {
                            permit = tokens.clone().acquire_owned() => {
                                match permit {
                                    Ok(permit) => {
                                        // the governor alone adds permits;
                                        // never return this one
                                        permit.forget();
                                        let metric = workload.iterate(&mut ctx).await;
                                        agg.consume(&metric);
                                    }
                                    Err(_) => break,
                                }
                            }
                            _ = async { shutdown.wait_for(|b| *b).await.map(|_| ()) } => break,
                        }
                    }
                    agg
                })
            })
            .collect()
    }
}
