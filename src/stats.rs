use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Delivery counters shared by every dispatch chain of the client.
///
/// Counters only ever grow. Every attempt bumps `requests` first and then
/// exactly one outcome counter, so once no attempt is in flight
/// `requests == success + errors_500 + errors_timeout + errors_other`.
#[derive(Debug, Default)]
pub struct ClientStatistics {
    requests: AtomicU64,
    success: AtomicU64,
    errors_500: AtomicU64,
    errors_timeout: AtomicU64,
    errors_other: AtomicU64,
}

impl ClientStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_server_error(&self) {
        self.errors_500.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.errors_timeout.fetch_add(1, Ordering::Relaxed);
    }

    /// Transport failures and unexpected statuses.
    pub fn record_other_failure(&self) {
        self.errors_other.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            success: self.success.load(Ordering::Relaxed),
            errors_500: self.errors_500.load(Ordering::Relaxed),
            errors_timeout: self.errors_timeout.load(Ordering::Relaxed),
            errors_other: self.errors_other.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ClientStatistics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    pub requests: u64,
    pub success: u64,
    #[serde(rename = "errors500")]
    pub errors_500: u64,
    pub errors_timeout: u64,
    pub errors_other: u64,
}

impl StatisticsSnapshot {
    /// Attempts that have finished with any outcome.
    pub fn completed(&self) -> u64 {
        self.success + self.errors_500 + self.errors_timeout + self.errors_other
    }
}

impl fmt::Display for StatisticsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "requests: {}", self.requests)?;
        writeln!(f, "success: {}", self.success)?;
        writeln!(f, "errors500: {}", self.errors_500)?;
        writeln!(f, "errorsTimeout: {}", self.errors_timeout)?;
        write!(f, "errorsOther: {}", self.errors_other)
    }
}

/// Count, mean and median over collected response times.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseTimeSummary {
    pub length: usize,
    pub average: f64,
    pub median: f64,
}

impl ResponseTimeSummary {
    /// Returns `None` when there are no samples.
    ///
    /// The median is the element at index `n / 2` of the ascending order, so
    /// an even-length input yields the upper of the two middle values.
    pub fn from_samples<I>(samples: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut values: Vec<f64> = samples.into_iter().collect();
        if values.is_empty() {
            return None;
        }

        values.sort_by(f64::total_cmp);
        let length = values.len();
        let average = values.iter().sum::<f64>() / length as f64;
        let median = values[length / 2];

        Some(Self {
            length,
            average,
            median,
        })
    }
}

impl fmt::Display for ResponseTimeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "length: {}", self.length)?;
        writeln!(f, "average: {}", self.average)?;
        write!(f, "median: {}", self.median)
    }
}

/// Renders the collector's shutdown report.
pub fn format_summary(summary: Option<&ResponseTimeSummary>) -> String {
    match summary {
        Some(summary) => summary.to_string(),
        None => "no data collected".to_string(),
    }
}
