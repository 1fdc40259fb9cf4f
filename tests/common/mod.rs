use parking_lot::Mutex;
use ping_relay::api::ApiState;
use ping_relay::simulator::{OutcomeDecision, OutcomePolicy};
use ping_relay::{CollectedStore, CollectorServer, PingData};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

/// The payload used by the end-to-end scenarios.
#[allow(dead_code)]
pub fn sample_ping() -> PingData {
    PingData::new(1, 1_700_000_000_000, 42.0)
}

/// Plays back a fixed list of decisions, then accepts everything.
#[allow(dead_code)]
pub struct ScriptedOutcomes {
    script: Mutex<VecDeque<OutcomeDecision>>,
}

#[allow(dead_code)]
impl ScriptedOutcomes {
    pub fn new(script: impl IntoIterator<Item = OutcomeDecision>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
        }
    }
}

impl OutcomePolicy for ScriptedOutcomes {
    fn decide(&self) -> OutcomeDecision {
        self.script
            .lock()
            .pop_front()
            .unwrap_or(OutcomeDecision::Accept)
    }
}

/// Starts a collector on an ephemeral loopback port.
#[allow(dead_code)]
pub async fn spawn_collector(
    outcomes: Arc<dyn OutcomePolicy>,
) -> (SocketAddr, Arc<CollectedStore>) {
    let store = Arc::new(CollectedStore::new());
    let state = ApiState::new(Arc::clone(&store), outcomes);
    let server = CollectorServer::bind("127.0.0.1:0", state).await.unwrap();
    let addr = server.local_addr().unwrap();

    tokio::spawn(async move {
        server.run().await.unwrap();
    });

    (addr, store)
}

#[allow(dead_code)]
pub fn data_url(addr: SocketAddr) -> String {
    format!("http://{}/data", addr)
}
