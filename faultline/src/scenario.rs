use std::marker::PhantomData;

use typed_builder::TypedBuilder;

use crate::aggregate::Aggregate;
use crate::executor::{Executor, RunError};
use crate::workload::Workload;

/// Glue that ties a named workload to the executor that drives it.
///
/// The aggregate type parameter picks the sink the run's metrics flow into;
/// workload configuration is validated by the executor before any worker
/// starts, so a broken schedule fails the run instead of skewing it.
#[derive(Debug, Clone, TypedBuilder)]
pub struct Scenario<A, E, W>
where
    A: Aggregate,
    E: Executor<A, W>,
    W: Workload<Metric = A::Metric>,
{
    #[builder(setter(into))]
    pub name: String,
    pub workload: W,
    pub executor: E,
    #[builder(default, setter(skip))]
    aggregate: PhantomData<A>,
}

impl<A, E, W> Scenario<A, E, W>
where
    A: Aggregate,
    E: Executor<A, W>,
    W: Workload<Metric = A::Metric>,
{
    pub async fn run(&mut self) -> Result<A, RunError> {
        self.executor.exec(self).await
    }
}
