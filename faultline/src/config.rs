use std::env;
use std::time::Duration;

use thiserror::Error;
use typed_builder::TypedBuilder;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Environment-style run configuration.
///
/// Recognized variables: `PAYMENT_BASE_URL`, `PAYMENT_MODE_DISTRIBUTION`
/// (a `mode:weight` CSV), and `VERSION` (free-form label attached to the
/// report so runs against different target deployments can be compared).
#[derive(Debug, Clone, TypedBuilder)]
pub struct Config {
    #[builder(default = String::from(DEFAULT_BASE_URL), setter(into))]
    pub base_url: String,
    /// Raw `mode:weight` CSV, parsed before the run starts. When set it
    /// replaces the per-phase injection weights.
    #[builder(default, setter(strip_option, into))]
    pub mode_distribution: Option<String>,
    #[builder(default, setter(strip_option, into))]
    pub version: Option<String>,
    /// Per-probe timeout; a timed-out probe classifies as `Failure` with no
    /// duration sample.
    #[builder(default = Duration::from_secs(5))]
    pub probe_timeout: Duration,
}

impl Config {
    /// Read the recognized environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            base_url: env::var("PAYMENT_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
            mode_distribution: env::var("PAYMENT_MODE_DISTRIBUTION").ok(),
            version: env::var("VERSION").ok(),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::builder().build()
    }
}

/// A broken schedule or distribution invalidates every downstream
/// measurement, so these fail the run before any worker starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed mode distribution entry: {entry:?}")]
    MalformedDistribution { entry: String },
    #[error("unknown request mode: {0:?}")]
    UnknownMode(String),
    #[error("timeline defines no phases, cyclic windows, or outage windows")]
    EmptyTimeline,
    #[error("absolute outage windows {first:?} and {second:?} overlap")]
    OverlappingOverrides { first: String, second: String },
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}
