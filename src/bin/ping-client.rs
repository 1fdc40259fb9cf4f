// ping-client: measures latency to a target and reports each sample to the collector
//
// Every tick probes the target once and starts a delivery chain that retries
// with backoff until the collector acknowledges the record.
//
// Usage:
//   cargo run --bin ping-client -- --collector-url http://127.0.0.1:8080/data

use std::sync::Arc;

use clap::Parser;
use ping_relay::config::{ClientArgs, ClientConfig};
use ping_relay::prober::run_probe_loop;
use ping_relay::telemetry::{init_tracing, install_metrics_exporter};
use ping_relay::{ClientStatistics, LatencyProber, PingDispatcher, RetryScheduler};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("ping_relay=info");

    let config = ClientConfig::try_from(ClientArgs::parse())?;
    install_metrics_exporter(config.metrics_bind)?;

    let stats = Arc::new(ClientStatistics::new());
    let prober = Arc::new(LatencyProber::new(&config.target, config.probe_timeout)?);
    let dispatcher = Arc::new(PingDispatcher::new(
        &config.collector_url,
        config.idle_timeout,
        Arc::clone(&stats),
    )?);
    let scheduler = Arc::new(RetryScheduler::new(dispatcher, config.retry_policy.clone()));

    info!(
        "Probing {} every {:?}, reporting to {}",
        config.target, config.interval, config.collector_url
    );

    tokio::select! {
        _ = run_probe_loop(prober, Arc::clone(&scheduler), config.interval) => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Received Ctrl+C, shutting down");
        }
    }

    scheduler.shutdown();
    println!("{}", stats.snapshot());
    Ok(())
}
