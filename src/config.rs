//! Command line and environment configuration for both binaries.

use crate::dispatcher::DEFAULT_IDLE_TIMEOUT;
use crate::prober::{DEFAULT_PROBE_INTERVAL, DEFAULT_PROBE_TIMEOUT};
use crate::retry::{BackoffStrategy, RetryPolicy};
use crate::simulator::{SimulatorConfig, SimulatorConfigError};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_COLLECTOR_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_COLLECTOR_URL: &str = "http://127.0.0.1:8080/data";
pub const DEFAULT_PROBE_TARGET: &str = "https://www.google.com/";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Simulator(#[from] SimulatorConfigError),
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
    #[error("max attempts must be at least 1")]
    ZeroMaxAttempts,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Flaky HTTP collector for ping records", long_about = None)]
pub struct CollectorArgs {
    /// Address to listen on
    #[arg(long, env = "COLLECTOR_BIND", default_value = DEFAULT_COLLECTOR_BIND)]
    pub bind: String,

    /// Share of valid requests that are stored and acknowledged
    #[arg(long, env = "COLLECTOR_SUCCESS_RATIO", default_value_t = 0.6)]
    pub success_ratio: f64,

    /// Share of valid requests answered with a simulated 500
    #[arg(long, env = "COLLECTOR_ERROR_RATIO", default_value_t = 0.2)]
    pub error_ratio: f64,

    /// Seed for the outcome generator
    #[arg(long, env = "COLLECTOR_SEED")]
    pub seed: Option<u64>,

    /// Answer invalid payloads with 400 instead of 500
    #[arg(long, env = "COLLECTOR_DISTINCT_VALIDATION_STATUS")]
    pub distinct_validation_status: bool,

    /// Serve Prometheus metrics on this address
    #[arg(long, env = "COLLECTOR_METRICS_BIND")]
    pub metrics_bind: Option<SocketAddr>,
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub bind: String,
    pub simulator: SimulatorConfig,
    pub seed: Option<u64>,
    pub distinct_validation_status: bool,
    pub metrics_bind: Option<SocketAddr>,
}

impl TryFrom<CollectorArgs> for CollectorConfig {
    type Error = ConfigError;

    fn try_from(args: CollectorArgs) -> Result<Self, Self::Error> {
        let simulator = SimulatorConfig {
            success_ratio: args.success_ratio,
            error_ratio: args.error_ratio,
        };
        simulator.validate()?;

        Ok(Self {
            bind: args.bind,
            simulator,
            seed: args.seed,
            distinct_validation_status: args.distinct_validation_status,
            metrics_bind: args.metrics_bind,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackoffArg {
    /// base * 2^attempt
    Exponential,
    /// base * (2 XOR attempt), as the legacy client did
    XorCompat,
}

impl From<BackoffArg> for BackoffStrategy {
    fn from(arg: BackoffArg) -> Self {
        match arg {
            BackoffArg::Exponential => BackoffStrategy::Exponential,
            BackoffArg::XorCompat => BackoffStrategy::XorCompat,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Measures latency and reports it to the collector", long_about = None)]
pub struct ClientArgs {
    /// URL whose latency is measured
    #[arg(long, env = "PING_TARGET", default_value = DEFAULT_PROBE_TARGET)]
    pub target: String,

    /// Collector endpoint receiving ping records
    #[arg(long, env = "PING_COLLECTOR_URL", default_value = DEFAULT_COLLECTOR_URL)]
    pub collector_url: String,

    /// Milliseconds between probes
    #[arg(long, env = "PING_INTERVAL_MS", default_value_t = DEFAULT_PROBE_INTERVAL.as_millis() as u64)]
    pub interval_ms: u64,

    /// Milliseconds a delivery may stay idle before it counts as timed out
    #[arg(long, env = "PING_IDLE_TIMEOUT_MS", default_value_t = DEFAULT_IDLE_TIMEOUT.as_millis() as u64)]
    pub idle_timeout_ms: u64,

    /// Milliseconds allowed for one probe request
    #[arg(long, env = "PING_PROBE_TIMEOUT_MS", default_value_t = DEFAULT_PROBE_TIMEOUT.as_millis() as u64)]
    pub probe_timeout_ms: u64,

    /// Backoff between delivery attempts
    #[arg(long, env = "PING_BACKOFF", value_enum, default_value_t = BackoffArg::Exponential)]
    pub backoff: BackoffArg,

    /// Base delay in milliseconds for the backoff
    #[arg(long, env = "PING_BACKOFF_BASE_MS", default_value_t = 1000)]
    pub backoff_base_ms: u64,

    /// Upper bound in milliseconds for a single backoff delay
    #[arg(long, env = "PING_MAX_BACKOFF_MS")]
    pub max_backoff_ms: Option<u64>,

    /// Give up on a ping after this many attempts (default: never)
    #[arg(long, env = "PING_MAX_ATTEMPTS")]
    pub max_attempts: Option<u64>,

    /// Add ±20% jitter to backoff delays
    #[arg(long, env = "PING_BACKOFF_JITTER")]
    pub jitter: bool,

    /// Serve Prometheus metrics on this address
    #[arg(long, env = "PING_METRICS_BIND")]
    pub metrics_bind: Option<SocketAddr>,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub target: String,
    pub collector_url: String,
    pub interval: Duration,
    pub idle_timeout: Duration,
    pub probe_timeout: Duration,
    pub retry_policy: RetryPolicy,
    pub metrics_bind: Option<SocketAddr>,
}

impl TryFrom<ClientArgs> for ClientConfig {
    type Error = ConfigError;

    fn try_from(args: ClientArgs) -> Result<Self, Self::Error> {
        let interval = positive_millis("interval", args.interval_ms)?;
        let idle_timeout = positive_millis("idle timeout", args.idle_timeout_ms)?;
        let probe_timeout = positive_millis("probe timeout", args.probe_timeout_ms)?;
        if args.max_attempts == Some(0) {
            return Err(ConfigError::ZeroMaxAttempts);
        }

        let retry_policy = RetryPolicy {
            max_attempts: args.max_attempts,
            base_delay: Duration::from_millis(args.backoff_base_ms),
            strategy: args.backoff.into(),
            max_backoff: args.max_backoff_ms.map(Duration::from_millis),
            jitter: args.jitter,
        };

        Ok(Self {
            target: args.target,
            collector_url: args.collector_url,
            interval,
            idle_timeout,
            probe_timeout,
            retry_policy,
            metrics_bind: args.metrics_bind,
        })
    }
}

fn positive_millis(name: &'static str, millis: u64) -> Result<Duration, ConfigError> {
    if millis == 0 {
        Err(ConfigError::ZeroDuration(name))
    } else {
        Ok(Duration::from_millis(millis))
    }
}
