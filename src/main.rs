use clap::Parser;
use ping_relay::api::ApiState;
use ping_relay::config::{CollectorArgs, CollectorConfig};
use ping_relay::simulator::{FailureSimulator, OutcomePolicy};
use ping_relay::stats::format_summary;
use ping_relay::telemetry::{init_tracing, install_metrics_exporter};
use ping_relay::{CollectedStore, CollectorServer};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("ping_relay=info,tower_http=info");

    let config = CollectorConfig::try_from(CollectorArgs::parse())?;
    install_metrics_exporter(config.metrics_bind)?;

    let simulator = match config.seed {
        Some(seed) => {
            info!("Seeding outcome generator with {}", seed);
            FailureSimulator::with_seed(config.simulator, seed)?
        }
        None => FailureSimulator::with_entropy(config.simulator)?,
    };
    info!(
        "Outcome split: accept {:.0}%, error {:.0}%, hang {:.0}%",
        config.simulator.success_ratio * 100.0,
        config.simulator.error_ratio * 100.0,
        config.simulator.hang_ratio() * 100.0
    );

    let store = Arc::new(CollectedStore::new());
    let outcomes: Arc<dyn OutcomePolicy> = Arc::new(simulator);
    let state = ApiState::new(Arc::clone(&store), outcomes)
        .with_distinct_validation_status(config.distinct_validation_status);

    let server = CollectorServer::bind(&config.bind, state).await?;

    tokio::select! {
        result = server.run() => {
            result.map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Received Ctrl+C, shutting down without draining connections");
        }
    }

    println!("{}", format_summary(store.summary().as_ref()));
    Ok(())
}
