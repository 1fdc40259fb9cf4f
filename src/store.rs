use crate::stats::ResponseTimeSummary;
use crate::types::PingData;
use parking_lot::RwLock;
use tracing::debug;

/// Append-only in-memory store of accepted ping records.
///
/// Records are kept in arrival order. There is no eviction and no
/// deduplication: a ping the client believes failed (for instance after a
/// timeout on a request that was in fact accepted) is stored again when it is
/// re-delivered.
///
/// # Example
/// ```
/// use ping_relay::{CollectedStore, PingData};
///
/// let store = CollectedStore::new();
/// store.append(PingData::new(1, 1_700_000_000_000, 42.0));
/// let summary = store.summary().unwrap();
/// assert_eq!(summary.median, 42.0);
/// ```
#[derive(Debug, Default)]
pub struct CollectedStore {
    records: RwLock<Vec<PingData>>,
}

impl CollectedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, ping: PingData) {
        let mut records = self.records.write();
        records.push(ping);
        debug!("Collected store now holds {} records", records.len());
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Copy of every stored record, oldest first.
    pub fn records(&self) -> Vec<PingData> {
        self.records.read().clone()
    }

    /// Aggregate over stored response times, `None` while the store is empty.
    pub fn summary(&self) -> Option<ResponseTimeSummary> {
        let records = self.records.read();
        ResponseTimeSummary::from_samples(records.iter().map(|ping| ping.response_time))
    }
}
