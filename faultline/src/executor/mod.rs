//! Executor — orchestration of runtime execution.
//!
//! The `Executor` trait is the runtime hook that executes a `Scenario`.
//! Two strategies are built in: [`ConstantExecutor`] keeps a fixed pool of
//! virtual users iterating for a fixed duration, and [`RampExecutor`] drives
//! a token-bucket governor through a list of rate stages.

pub mod constant;
pub mod ramp;

pub use constant::ConstantExecutor;
pub use ramp::{RampExecutor, RateStage};

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;

use crate::aggregate::Aggregate;
use crate::config::ConfigError;
use crate::scenario::Scenario;
use crate::workload::Workload;

/// Errors that end a run before it produces a usable aggregate.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("run coordination failed: {0}")]
    Coordination(String),
}

/// The runtime hook that executes a `Scenario`.
///
/// Executors control concurrency and scheduling: how many virtual users run,
/// how probes are paced or rate-limited, and when the run ends. Each worker
/// owns its [`IterationContext`](crate::tracker::IterationContext) and a
/// worker-local aggregate; the executor merges the aggregates once all
/// workers have stopped.
pub trait Executor<A, W>
where
    Self: Send + Sync + Sized,
    A: Aggregate,
    W: Workload<Metric = A::Metric>,
{
    /// Execute the scenario and return the final merged aggregate.
    fn exec(
        &self,
        scenario: &Scenario<A, Self, W>,
    ) -> impl Future<Output = Result<A, RunError>> + Send;
}

/// Inter-iteration sleep policy. A delay affects only the issuing worker.
#[derive(Debug, Clone)]
pub enum Pacing {
    /// Fire the next probe immediately.
    None,
    Fixed(Duration),
    /// Uniform random delay in `[min, max)`.
    Uniform { min: Duration, max: Duration },
    /// Piecewise delays keyed by run-elapsed time: the delay of the first
    /// entry whose bound exceeds the elapsed time applies; past the last
    /// bound, the last entry's delay sticks.
    Phased(Vec<(Duration, Duration)>),
}

impl Pacing {
    pub fn delay<R: Rng>(&self, elapsed: Duration, rng: &mut R) -> Option<Duration> {
        match self {
            Pacing::None => None,
            Pacing::Fixed(delay) => Some(*delay),
            Pacing::Uniform { min, max } => {
                if max <= min {
                    return Some(*min);
                }
                let span = (*max - *min).as_secs_f64();
                Some(*min + Duration::from_secs_f64(rng.gen::<f64>() * span))
            }
            Pacing::Phased(steps) => steps
                .iter()
                .find(|(until, _)| elapsed < *until)
                .or_else(|| steps.last())
                .map(|(_, delay)| *delay),
        }
    }
}
