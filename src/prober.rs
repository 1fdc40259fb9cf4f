//! Latency measurement against the probe target.

use crate::dispatcher::Deliver;
use crate::scheduler::RetryScheduler;
use crate::types::{PingData, PingId, Timestamp};
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Default interval between probes.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(1000);

/// Default limit on a single probe request.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe request timed out")]
    Timeout,
    #[error("probe request failed: {0}")]
    Request(reqwest::Error),
}

impl From<reqwest::Error> for ProbeError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ProbeError::Timeout
        } else {
            ProbeError::Request(error)
        }
    }
}

/// Times HTTP requests to a fixed target and turns them into [`PingData`].
pub struct LatencyProber {
    client: Client,
    target: String,
    last_id: AtomicU64,
}

impl LatencyProber {
    pub fn new(target: impl Into<String>, request_timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(ProbeError::Request)?;
        Ok(Self {
            client,
            target: target.into(),
            last_id: AtomicU64::new(0),
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Milliseconds from sending the request until the whole body was read.
    /// Any status counts as a measurement.
    pub async fn measure(&self) -> Result<f64, ProbeError> {
        let start = Instant::now();
        let response = self.client.get(&self.target).send().await?;
        response.bytes().await?;
        Ok(start.elapsed().as_secs_f64() * 1000.0)
    }

    /// Takes the next ping id and the start date, then measures once.
    ///
    /// Ids follow the order in which measurements started, not the order in
    /// which they finished. A failed measurement still consumes its id.
    pub async fn probe(&self) -> Result<PingData, ProbeError> {
        let ping_id = self.next_id();
        let date = now_millis();
        let response_time = self.measure().await?;
        Ok(PingData::new(ping_id, date, response_time))
    }

    fn next_id(&self) -> PingId {
        self.last_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

fn now_millis() -> Timestamp {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}

/// Probes every `period` and hands each measurement to the scheduler.
///
/// Every tick runs in its own task, so a slow probe or a long retry chain
/// never delays the next tick. Failed probes are logged and skipped.
pub async fn run_probe_loop<D: Deliver>(
    prober: Arc<LatencyProber>,
    scheduler: Arc<RetryScheduler<D>>,
    period: Duration,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let prober = Arc::clone(&prober);
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move {
            match prober.probe().await {
                Ok(ping) => {
                    debug!(
                        "Probe {} of {} took {:.1} ms",
                        ping.ping_id,
                        prober.target(),
                        ping.response_time
                    );
                    scheduler.submit(ping);
                }
                Err(e) => {
                    warn!("Skipping tick, probe of {} failed: {}", prober.target(), e);
                    metrics::counter!("client_probe_failures_total").increment(1);
                }
            }
        });
    }
}
