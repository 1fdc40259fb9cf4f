use crate::error::CollectorError;
use crate::simulator::{OutcomeDecision, OutcomePolicy};
use crate::store::CollectedStore;
use crate::types::{ensure_json_content_type, PingData};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Path accepting ping records.
pub const DATA_PATH: &str = "/data";

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<CollectedStore>,
    pub outcomes: Arc<dyn OutcomePolicy>,
    /// Status used for payloads that fail validation. Defaults to 500, which
    /// makes them indistinguishable from simulated errors.
    pub validation_status: StatusCode,
}

impl ApiState {
    pub fn new(store: Arc<CollectedStore>, outcomes: Arc<dyn OutcomePolicy>) -> Self {
        Self {
            store,
            outcomes,
            validation_status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Answer validation failures with `400` instead of `500`.
    pub fn with_distinct_validation_status(mut self, distinct: bool) -> Self {
        self.validation_status = if distinct {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        self
    }
}

/// Builds the collector router.
///
/// Only `POST /data` is served; every other method or path gets an empty
/// `400`. Request bodies are buffered whole with no size limit.
pub fn create_api_router(state: ApiState) -> Router {
    Router::new()
        .route(DATA_PATH, post(ingest_ping).fallback(reject_route))
        .fallback(reject_route)
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn reject_route() -> StatusCode {
    StatusCode::BAD_REQUEST
}

async fn ingest_ping(State(state): State<ApiState>, headers: HeaderMap, body: Bytes) -> Response {
    metrics::counter!("collector_requests_total").increment(1);

    match handle_ping(&state, &headers, &body).await {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(CollectorError::Validation(e)) => {
            warn!("Rejected ping payload: {}", e);
            metrics::counter!("collector_validation_failures_total").increment(1);
            (state.validation_status, e.to_string()).into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn handle_ping(
    state: &ApiState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), CollectorError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .map(|value| value.to_str().unwrap_or_default());
    ensure_json_content_type(content_type)?;

    let ping = PingData::from_json_slice(body)?;

    match state.outcomes.decide() {
        OutcomeDecision::Accept => {
            info!(
                "Accepted ping {} (attempt {}, {} ms)",
                ping.ping_id, ping.delivery_attempt, ping.response_time
            );
            state.store.append(ping);
            metrics::counter!("collector_pings_accepted_total").increment(1);
            Ok(())
        }
        OutcomeDecision::Error => {
            debug!(
                "Simulating internal error for ping {} (attempt {})",
                ping.ping_id, ping.delivery_attempt
            );
            metrics::counter!("collector_simulated_errors_total").increment(1);
            Err(CollectorError::Simulated)
        }
        OutcomeDecision::Hang => {
            debug!(
                "Simulating hang for ping {} (attempt {})",
                ping.ping_id, ping.delivery_attempt
            );
            metrics::counter!("collector_simulated_hangs_total").increment(1);
            // Held open until the client gives up and the connection is dropped.
            std::future::pending::<()>().await;
            Ok(())
        }
    }
}
