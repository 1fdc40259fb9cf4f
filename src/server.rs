use crate::api::{create_api_router, ApiState};
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

/// HTTP collector bound to a listening socket.
///
/// # Example
/// ```no_run
/// use ping_relay::api::ApiState;
/// use ping_relay::simulator::{FailureSimulator, SimulatorConfig};
/// use ping_relay::{CollectedStore, CollectorServer};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(CollectedStore::new());
/// let simulator = FailureSimulator::with_entropy(SimulatorConfig::default())?;
/// let server = CollectorServer::bind("127.0.0.1:8080", ApiState::new(store, Arc::new(simulator))).await?;
/// server.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct CollectorServer {
    listener: TcpListener,
    router: Router,
}

impl CollectorServer {
    pub async fn bind(bind_address: &str, state: ApiState) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind(bind_address).await?;
        info!("Collector bound to {}", listener.local_addr()?);

        Ok(Self {
            listener,
            router: create_api_router(state),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Serves requests until the task is dropped. Connections are not drained.
    pub async fn run(self) -> Result<(), std::io::Error> {
        info!("Collector listening on {}", self.listener.local_addr()?);
        axum::serve(self.listener, self.router).await
    }
}
