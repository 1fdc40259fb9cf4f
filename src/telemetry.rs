use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global tracing subscriber. `RUST_LOG` overrides `default_directive`.
pub fn init_tracing(default_directive: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Starts the Prometheus exporter on its own listener when an address is given.
///
/// Must be called from within a tokio runtime.
pub fn install_metrics_exporter(bind: Option<SocketAddr>) -> anyhow::Result<()> {
    let Some(addr) = bind else {
        return Ok(());
    };

    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe_metrics();
    info!("Metrics available at http://{}/metrics", addr);
    Ok(())
}

fn describe_metrics() {
    metrics::describe_counter!(
        "collector_requests_total",
        "Requests received on the data endpoint"
    );
    metrics::describe_counter!(
        "collector_pings_accepted_total",
        "Ping records stored by the collector"
    );
    metrics::describe_counter!(
        "collector_simulated_errors_total",
        "Requests answered with a simulated internal error"
    );
    metrics::describe_counter!(
        "collector_simulated_hangs_total",
        "Requests intentionally left unanswered"
    );
    metrics::describe_counter!(
        "collector_validation_failures_total",
        "Requests rejected by payload validation"
    );
    metrics::describe_counter!(
        "client_delivery_requests_total",
        "Delivery attempts sent to the collector"
    );
    metrics::describe_counter!(
        "client_delivery_success_total",
        "Delivery attempts acknowledged by the collector"
    );
    metrics::describe_counter!(
        "client_delivery_errors_total",
        "Failed delivery attempts by kind"
    );
    metrics::describe_counter!(
        "client_probe_failures_total",
        "Probe ticks skipped because the target request failed"
    );
}
