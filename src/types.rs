use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub type PingId = u64;
/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Errors raised while validating an incoming ping record.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Unsupported content type: expected application/json, got {0}")]
    UnsupportedContentType(String),
    #[error("Missing Content-Type header")]
    MissingContentType,
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Expected a JSON object")]
    NotAnObject,
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    #[error("Field {0} must be a number")]
    NotANumber(&'static str),
    #[error("Field {field} must be >= 0, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("Field {0} must be an integer")]
    NotAnInteger(&'static str),
}

/// One latency measurement together with its delivery state.
///
/// Everything except `delivery_attempt` is fixed when the probe produces the
/// record; retries go through [`PingData::next_attempt`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingData {
    pub ping_id: PingId,
    pub delivery_attempt: u64,
    pub date: Timestamp,
    pub response_time: f64,
}

impl PingData {
    /// A fresh measurement on its first delivery attempt.
    pub fn new(ping_id: PingId, date: Timestamp, response_time: f64) -> Self {
        Self {
            ping_id,
            delivery_attempt: 1,
            date,
            response_time,
        }
    }

    /// The same measurement, one delivery attempt later.
    pub fn next_attempt(&self) -> Self {
        Self {
            delivery_attempt: self.delivery_attempt.saturating_add(1),
            ..self.clone()
        }
    }

    /// Parses and validates a collector request body.
    ///
    /// Fields are checked in the order `date`, `pingId`, `deliveryAttempt`,
    /// `responseTime`; the first violation wins.
    pub fn from_json_slice(body: &[u8]) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_slice(body)?;
        let object = value.as_object().ok_or(ValidationError::NotAnObject)?;

        let date = integer_field(object, "date")?;
        let ping_id = integer_field(object, "pingId")?;
        let delivery_attempt = integer_field(object, "deliveryAttempt")?;
        let response_time = number_field(object, "responseTime")?;

        Ok(Self {
            ping_id,
            delivery_attempt,
            date,
            response_time,
        })
    }
}

/// Checks a `Content-Type` header value against `application/json`.
/// Parameters such as `charset` are ignored.
pub fn ensure_json_content_type(content_type: Option<&str>) -> Result<(), ValidationError> {
    let content_type = content_type.ok_or(ValidationError::MissingContentType)?;
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    if essence.eq_ignore_ascii_case("application/json") {
        Ok(())
    } else {
        Err(ValidationError::UnsupportedContentType(
            content_type.to_string(),
        ))
    }
}

fn number_field(object: &Map<String, Value>, field: &'static str) -> Result<f64, ValidationError> {
    let value = object
        .get(field)
        .ok_or(ValidationError::MissingField(field))?;
    let number = value.as_f64().ok_or(ValidationError::NotANumber(field))?;
    if number < 0.0 {
        return Err(ValidationError::Negative {
            field,
            value: number,
        });
    }
    Ok(number)
}

fn integer_field(object: &Map<String, Value>, field: &'static str) -> Result<u64, ValidationError> {
    let number = number_field(object, field)?;
    if let Some(integer) = object.get(field).and_then(Value::as_u64) {
        return Ok(integer);
    }
    // 3.0 is a valid integer even though serde_json keeps it as a float
    if number.fract() == 0.0 && number < u64::MAX as f64 {
        Ok(number as u64)
    } else {
        Err(ValidationError::NotAnInteger(field))
    }
}
