//! Score message decoding.
//!
//! Queue payloads are JSON objects of the form
//! `{ "email": <string>, "score": <integer or integer string> }`. A float
//! with no fractional part, such as `42.0`, counts as an integer.
//! Only the shape is validated here: any non-empty identity and any `i64`
//! score are accepted.

use crate::score::ScoreEvent;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Field carrying the identity in queue payloads.
pub const IDENTITY_FIELD: &str = "email";

/// Field carrying the score in queue payloads.
pub const SCORE_FIELD: &str = "score";

/// Reasons a payload cannot become a [`ScoreEvent`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload is not well-formed JSON
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// Payload is JSON but not an object
    #[error("Payload is not a JSON object")]
    NotAnObject,

    /// A required field is absent
    #[error("Missing field '{0}'")]
    MissingField(&'static str),

    /// Identity is present but not a non-empty string
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    /// Score is present but not representable as an integer
    #[error("Invalid score: {0}")]
    InvalidScore(String),
}

/// Decode a raw queue payload into a [`ScoreEvent`].
///
/// # Errors
///
/// Returns [`DecodeError`] when the payload is not a JSON object, when
/// `email` or `score` is missing, when `email` is not a non-empty string, or
/// when `score` is neither an `i64`, an integral float in `i64` range, nor a
/// string holding an `i64`.
///
/// # Example
///
/// ```
/// use scoreboard_core::decode::decode;
///
/// let event = decode(br#"{"email":"a@x.com","score":"42"}"#).unwrap();
/// assert_eq!(event.identity(), "a@x.com");
/// assert_eq!(event.score(), 42);
/// ```
pub fn decode(payload: &[u8]) -> Result<ScoreEvent, DecodeError> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let Value::Object(fields) = value else {
        return Err(DecodeError::NotAnObject);
    };

    let identity = match fields.get(IDENTITY_FIELD) {
        None | Some(Value::Null) => return Err(DecodeError::MissingField(IDENTITY_FIELD)),
        Some(Value::String(s)) => s.clone(),
        Some(other) => return Err(DecodeError::InvalidIdentity(other.to_string())),
    };

    let score = match fields.get(SCORE_FIELD) {
        None | Some(Value::Null) => return Err(DecodeError::MissingField(SCORE_FIELD)),
        Some(raw) => parse_score(raw)?,
    };

    ScoreEvent::new(identity, score)
        .ok_or_else(|| DecodeError::InvalidIdentity("identity is empty".to_string()))
}

/// Coerce a JSON value into an integer score.
fn parse_score(raw: &Value) -> Result<i64, DecodeError> {
    match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(integral))
            .ok_or_else(|| DecodeError::InvalidScore(n.to_string())),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| DecodeError::InvalidScore(format!("{s:?}"))),
        other => Err(DecodeError::InvalidScore(other.to_string())),
    }
}

/// Exact `i64` value of a float such as `42.0`.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::float_cmp)]
fn integral(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is out of range.
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.is_finite() && f.fract() == 0.0 && in_range).then(|| f as i64)
}

/// Encode an event into the queue payload format accepted by [`decode`].
///
/// # Errors
///
/// Returns [`DecodeError::Malformed`] if JSON serialization fails.
pub fn encode(event: &ScoreEvent) -> Result<Vec<u8>, DecodeError> {
    #[derive(Serialize)]
    struct Payload<'a> {
        email: &'a str,
        score: i64,
    }

    serde_json::to_vec(&Payload {
        email: event.identity(),
        score: event.score(),
    })
    .map_err(|e| DecodeError::Malformed(e.to_string()))
}
