use std::time::Duration;

use anyhow::Result;
use faultline::config::Config;
use faultline::executor::{ConstantExecutor, Pacing};
use faultline::mode::InjectionMix;
use faultline::report::{ResilienceReport, StdoutReporter};
use faultline::timeline::{Phase, Timeline};
use faultline::workload::PaymentWorkload;
use faultline::{aggregate::ResilienceAggregate, Reporter, Scenario};

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    let version = config.version.clone();

    // Warmup -> normal -> stress -> catastrophe -> recovery -> cooldown,
    // the same shape the V1/V2 comparison runs use.
    let timeline = Timeline::builder()
        .phases(vec![
            Phase::new("warmup", secs(0), secs(30), InjectionMix::new(0.05, 0.15)),
            Phase::new("normal", secs(30), secs(150), InjectionMix::new(0.05, 0.15)),
            Phase::new("stress", secs(150), secs(270), InjectionMix::new(0.25, 0.25)),
            Phase::new("catastrophe", secs(270), secs(390), InjectionMix::new(1.0, 0.0)),
            Phase::new("recovery", secs(390), secs(510), InjectionMix::new(0.15, 0.25)),
            Phase::new("cooldown", secs(510), secs(540), InjectionMix::NONE),
        ])
        .build();

    let workload = PaymentWorkload::new(config, timeline)?;
    workload.preflight().await;

    let results = Scenario::<ResilienceAggregate, _, _>::builder()
        .name("multi-phase payment probe")
        .workload(workload)
        .executor(
            ConstantExecutor::builder()
                .duration(secs(540))
                .vus(100)
                // 0.5-1s between probes, like a real user pausing
                .pacing(Pacing::Uniform {
                    min: Duration::from_millis(500),
                    max: Duration::from_secs(1),
                })
                .build(),
        )
        .build()
        .run()
        .await?;

    let mut report = ResilienceReport::from(results);
    if let Some(version) = version {
        report = report.versioned(version);
    }
    StdoutReporter
        .report(report)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(())
}
