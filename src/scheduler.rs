use crate::dispatcher::Deliver;
use crate::retry::RetryPolicy;
use crate::types::{PingData, PingId};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Runs one delivery chain per ping and re-submits failed attempts after the
/// policy's backoff.
///
/// Each chain is a task registered under its `pingId`. Chains run
/// independently of each other; within a chain, attempt N finishes before
/// attempt N+1 is scheduled.
pub struct RetryScheduler<D: Deliver> {
    dispatcher: Arc<D>,
    policy: RetryPolicy,
    chains: Arc<DashMap<PingId, JoinHandle<()>>>,
}

impl<D: Deliver> RetryScheduler<D> {
    pub fn new(dispatcher: Arc<D>, policy: RetryPolicy) -> Self {
        Self {
            dispatcher,
            policy,
            chains: Arc::new(DashMap::new()),
        }
    }

    /// Starts the delivery chain for a freshly probed ping.
    pub fn submit(&self, ping: PingData) {
        let ping_id = ping.ping_id;
        let (registered, start) = oneshot::channel::<()>();
        let chain = run_chain(
            Arc::clone(&self.dispatcher),
            self.policy.clone(),
            Arc::clone(&self.chains),
            ping,
        );
        // The chain must not deregister itself before it has been registered
        let handle = tokio::spawn(async move {
            if start.await.is_ok() {
                chain.await;
            }
        });
        if let Some(previous) = self.chains.insert(ping_id, handle) {
            warn!("Ping {} submitted twice, aborting earlier chain", ping_id);
            previous.abort();
        }
        let _ = registered.send(());
    }

    /// Number of pings still waiting for a successful delivery.
    pub fn in_flight(&self) -> usize {
        self.chains.len()
    }

    /// Aborts every outstanding chain and returns how many were cancelled.
    pub fn shutdown(&self) -> usize {
        let ids: Vec<PingId> = self.chains.iter().map(|entry| *entry.key()).collect();
        let mut aborted = 0;
        for id in ids {
            if let Some((_, handle)) = self.chains.remove(&id) {
                handle.abort();
                aborted += 1;
            }
        }
        info!("Cancelled {} pending delivery chains", aborted);
        aborted
    }
}

async fn run_chain<D: Deliver>(
    dispatcher: Arc<D>,
    policy: RetryPolicy,
    chains: Arc<DashMap<PingId, JoinHandle<()>>>,
    mut ping: PingData,
) {
    let ping_id = ping.ping_id;

    loop {
        match dispatcher.deliver(&ping).await {
            Ok(()) => {
                debug!(
                    "Ping {} delivered on attempt {}",
                    ping_id, ping.delivery_attempt
                );
                break;
            }
            Err(error) if !policy.allows_retry_after(ping.delivery_attempt) => {
                warn!(
                    "Giving up on ping {} after {} attempts: {}",
                    ping_id, ping.delivery_attempt, error
                );
                break;
            }
            Err(error) => {
                let delay = policy.delay_after(ping.delivery_attempt);
                warn!(
                    "Ping {} attempt {} failed: {}, retrying in {:?}",
                    ping_id, ping.delivery_attempt, error, delay
                );
                sleep(delay).await;
                ping = ping.next_attempt();
            }
        }
    }

    chains.remove(&ping_id);
}
