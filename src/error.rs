use crate::types::ValidationError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Reasons a collector request ends without storing the record.
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Random internal error")]
    Simulated,
}

impl IntoResponse for CollectorError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
