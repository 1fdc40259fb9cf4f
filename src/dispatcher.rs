//! Client side delivery of ping records to the collector.

use crate::stats::ClientStatistics;
use crate::types::PingData;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default time a delivery may sit idle before it is abandoned.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a single delivery attempt failed. Every variant is retried.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("collector did not answer within the idle timeout")]
    Timeout,
    #[error("collector returned 500: {body}")]
    ServerError { body: String },
    #[error("collector returned unexpected status {0}")]
    UnexpectedStatus(StatusCode),
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    #[error("failed to encode ping: {0}")]
    Encode(#[from] serde_json::Error),
}

impl DeliveryError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryError::Timeout => "timeout",
            DeliveryError::ServerError { .. } => "server_error",
            DeliveryError::UnexpectedStatus(_) => "unexpected_status",
            DeliveryError::Transport(_) => "transport",
            DeliveryError::Encode(_) => "encode",
        }
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            DeliveryError::Timeout
        } else {
            DeliveryError::Transport(error)
        }
    }
}

/// One delivery attempt of one ping.
pub trait Deliver: Send + Sync + 'static {
    fn deliver(&self, ping: &PingData) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// Posts ping records to the collector and keeps [`ClientStatistics`] current.
pub struct PingDispatcher {
    client: Client,
    collector_url: String,
    stats: Arc<ClientStatistics>,
}

impl PingDispatcher {
    pub fn new(
        collector_url: impl Into<String>,
        idle_timeout: Duration,
        stats: Arc<ClientStatistics>,
    ) -> Result<Self, reqwest::Error> {
        // The read timer restarts after every successful read; a slow but
        // steadily progressing response is never cut off.
        let client = Client::builder()
            .connect_timeout(idle_timeout)
            .read_timeout(idle_timeout)
            .build()?;
        Ok(Self {
            client,
            collector_url: collector_url.into(),
            stats,
        })
    }

    async fn post(&self, ping: &PingData) -> Result<(), DeliveryError> {
        let body = serde_json::to_vec(ping)?;
        let request = self
            .client
            .post(&self.collector_url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        match status {
            StatusCode::OK => Ok(()),
            StatusCode::INTERNAL_SERVER_ERROR => Err(DeliveryError::ServerError { body: text }),
            other => Err(DeliveryError::UnexpectedStatus(other)),
        }
    }

    fn record(&self, result: &Result<(), DeliveryError>) {
        match result {
            Ok(()) => {
                self.stats.record_success();
                metrics::counter!("client_delivery_success_total").increment(1);
            }
            Err(error) => {
                match error {
                    DeliveryError::ServerError { .. } => self.stats.record_server_error(),
                    DeliveryError::Timeout => self.stats.record_timeout(),
                    _ => self.stats.record_other_failure(),
                }
                metrics::counter!("client_delivery_errors_total", "kind" => error.kind())
                    .increment(1);
            }
        }
    }
}

impl Deliver for PingDispatcher {
    async fn deliver(&self, ping: &PingData) -> Result<(), DeliveryError> {
        self.stats.record_request();
        metrics::counter!("client_delivery_requests_total").increment(1);

        let result = self.post(ping).await;
        debug!(
            "Delivery of ping {} attempt {}: {:?}",
            ping.ping_id, ping.delivery_attempt, result
        );
        self.record(&result);
        result
    }
}
