use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use typed_builder::TypedBuilder;

use super::{Executor, Pacing, RunError};
use crate::aggregate::Aggregate;
use crate::scenario::Scenario;
use crate::tracker::IterationContext;
use crate::workload::Workload;

/// Fixed pool of virtual users, each looping iterate → consume → sleep until
/// the run duration elapses.
///
/// Shutdown is checked between iterations only, so an in-flight probe always
/// finishes and no partial iteration is force-aborted; the run overshoots its
/// duration by at most one probe per worker.
#[derive(Debug, Clone, TypedBuilder)]
pub struct ConstantExecutor {
    pub duration: Duration,
    #[builder(default = 10)]
    pub vus: usize,
    #[builder(default = Pacing::Fixed(Duration::from_secs(1)))]
    pub pacing: Pacing,
}

impl<A, W> Executor<A, W> for ConstantExecutor
where
    A: Aggregate + 'static,
    W: Workload<Metric = A::Metric>,
{
    async fn exec(&self, scenario: &Scenario<A, Self, W>) -> Result<A, RunError> {
        scenario.workload.validate()?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let started_at = Instant::now();

        tracing::info!(vus = self.vus, duration = ?self.duration, "spawning virtual users...");
        let handles: Vec<JoinHandle<A>> = (0..self.vus)
            .map(|i| {
                let workload = scenario.workload.clone();
                let pacing = self.pacing.clone();
                let mut shutdown = shutdown_rx.clone();
                tokio::spawn(async move {
                    let mut ctx = IterationContext::new(i as u64, started_at);
                    let mut agg = A::new();
                    loop {
                        if *shutdown.borrow() {
                            break;
                        }
                        let metric = workload.iterate(&mut ctx).await;
                        agg.consume(&metric);
                        if let Some(delay) = pacing.delay(ctx.elapsed(), &mut ctx.rng) {
                            tokio::select! {
                                _ = tokio::time::sleep(delay) => {}
                                _ = shutdown.changed() => {}
                            }
                        }
                    }
                    agg
                })
            })
            .collect();

        tracing::info!("running scenario: {}", scenario.name);
        tokio::time::sleep(self.duration).await;
        shutdown_tx
            .send(true)
            .map_err(|e| RunError::Coordination(e.to_string()))?;

        tracing::info!("retrieving data from workers...");
        let mut final_agg = A::new();
        for joined in join_all(handles).await {
            match joined {
                Ok(agg) => final_agg.merge(agg),
                // one lost worker should not cost the whole run's data
                Err(err) => tracing::error!(error = %err, "worker panicked, dropping its samples"),
            }
        }

        tracing::info!("done running scenario: {}", scenario.name);
        Ok(final_agg)
    }
}
