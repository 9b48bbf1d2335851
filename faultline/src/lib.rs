//! Faultline — a phased synthetic workload driver for circuit-breaker
//! experiments.
//!
//! Faultline drives a stream of probes against a service protected by a
//! circuit breaker, injecting failures and latency according to a declarative
//! timeline, and classifies every response into the semantic categories the
//! breaker cares about. The interesting questions it answers are not "how
//! fast is the service" but "how available did it stay under injected chaos,
//! how long did it take to recover, and how quickly did it adapt".
//!
//! # Architecture
//!
//! The main building blocks are:
//!
//! - [`Timeline`](timeline::Timeline): declarative description of the test's
//!   time windows and their injection weights. Resolving an elapsed time to
//!   the active phase is a pure function with a fixed precedence: absolute
//!   outage windows beat cyclic downtime windows beat the base phase list
//!   beat the default.
//! - [`Mode`](mode::Mode): the request mode drawn per probe from the active
//!   phase's weights (or from an explicit weight table).
//! - [`classify`](classify::classify): maps an HTTP status to a
//!   [`ResponseCategory`](classify::ResponseCategory).
//! - [`IterationContext`](tracker::IterationContext): per-virtual-user state
//!   feeding the recovery/adaptation tracker. Owned by exactly one worker,
//!   never shared.
//! - [`Workload`](workload::Workload): one probe iteration, from phase
//!   resolution to the emitted [`Metric`].
//! - [`Executor`]: runs the workload across many virtual users. Workers
//!   consume metrics into worker-local [`Aggregate`]s which are merged once
//!   the run ends.
//! - [`Report`]/[`Reporter`]: turn the merged aggregate into the end-of-run
//!   snapshot consumed by external threshold evaluation.
//!
//! # Example
//!
//! See `examples/payment.rs` for a full multi-phase run against a local
//! payment service.

/// Metric aggregators
pub mod aggregate;
/// HTTP outcome classification
pub mod classify;
/// Run configuration and configuration errors
pub mod config;
/// Orchestrators that define how things will actually run
pub mod executor;
/// Single metrics
pub mod metric;
/// Request modes and weighted selection
pub mod mode;
/// Reports and Reporters
pub mod report;
/// Main module of the framework that glues everything together
pub mod scenario;
/// Phase timelines and the elapsed-time scheduler
pub mod timeline;
/// Per-worker circuit state tracking
pub mod tracker;
/// Probe workloads
pub mod workload;

pub use aggregate::Aggregate;
pub use executor::Executor;
pub use metric::Metric;
pub use report::{Report, Reporter};
pub use scenario::Scenario;
pub use workload::Workload;

/// Procedural macros to reduce boilerplate
pub mod macros {
    pub use faultline_macros::*;
}
