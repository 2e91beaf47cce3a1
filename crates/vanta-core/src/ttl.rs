//! Time-to-live parsing and the reserved metadata keys.
//!
//! A TTL is either a number of milliseconds or a string of the form
//! `⟨number⟩⟨unit⟩` with unit one of `ms`, `s`, `m`, `h`, `d`. Expiry is
//! stored as an absolute epoch-millisecond timestamp under
//! [`TTL_EXPIRES_KEY`]; the original human-readable form is kept under
//! [`TTL_DURATION_KEY`] for observability.

use chrono::Utc;
use serde_json::{Map, Value};

use crate::error::{EngineError, EngineResult};

/// Metadata key carrying the owning tenant identifier.
pub const TENANT_ID_KEY: &str = "_tenant_id";

/// Metadata key carrying the absolute expiry timestamp (epoch ms).
pub const TTL_EXPIRES_KEY: &str = "_ttl_expires";

/// Metadata key carrying the original TTL form.
pub const TTL_DURATION_KEY: &str = "_ttl_duration";

/// Returns the current wall-clock time as epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parses a TTL value into a duration in milliseconds.
///
/// # Errors
///
/// Returns [`EngineError::InvalidTtl`] for non-positive or non-finite
/// numbers, unknown units, and anything that is neither a number nor a
/// duration string.
pub fn parse_ttl(value: &Value) -> EngineResult<i64> {
    match value {
        Value::Number(n) => {
            let millis = n
                .as_f64()
                .ok_or_else(|| EngineError::invalid_ttl(value.to_string()))?;
            to_positive_millis(millis).ok_or_else(|| EngineError::invalid_ttl(value.to_string()))
        }
        Value::String(s) => parse_duration_str(s).ok_or_else(|| EngineError::invalid_ttl(s)),
        _ => Err(EngineError::invalid_ttl(value.to_string())),
    }
}

fn parse_duration_str(s: &str) -> Option<i64> {
    let s = s.trim();
    // `ms` must be tried before `m`.
    let units: [(&str, f64); 5] = [
        ("ms", 1.0),
        ("s", 1_000.0),
        ("m", 60_000.0),
        ("h", 3_600_000.0),
        ("d", 86_400_000.0),
    ];
    let (number, multiplier) = units
        .iter()
        .find_map(|(unit, mult)| s.strip_suffix(unit).map(|n| (n, *mult)))?;
    let number: f64 = number.parse().ok()?;
    to_positive_millis(number * multiplier)
}

fn to_positive_millis(millis: f64) -> Option<i64> {
    (millis.is_finite() && millis > 0.0).then(|| millis.round() as i64)
}

/// Returns `true` when the metadata carries an expiry at or before `now`.
#[must_use]
pub fn is_expired(metadata: &Map<String, Value>, now: i64) -> bool {
    metadata
        .get(TTL_EXPIRES_KEY)
        .and_then(Value::as_f64)
        .is_some_and(|expires| expires <= now as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_ttl_is_milliseconds() {
        assert_eq!(parse_ttl(&json!(1500)).unwrap(), 1500);
        assert_eq!(parse_ttl(&json!(0.5)).unwrap(), 1);
    }

    #[test]
    fn string_ttl_units() {
        assert_eq!(parse_ttl(&json!("50ms")).unwrap(), 50);
        assert_eq!(parse_ttl(&json!("30s")).unwrap(), 30_000);
        assert_eq!(parse_ttl(&json!("5m")).unwrap(), 300_000);
        assert_eq!(parse_ttl(&json!("2h")).unwrap(), 7_200_000);
        assert_eq!(parse_ttl(&json!("1d")).unwrap(), 86_400_000);
        assert_eq!(parse_ttl(&json!("1.5s")).unwrap(), 1500);
    }

    #[test]
    fn malformed_ttls_are_rejected() {
        for bad in [json!("fast"), json!("10w"), json!("ms"), json!(-5), json!(0), json!(true)] {
            assert!(parse_ttl(&bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn expiry_check_is_inclusive() {
        let meta = json!({ TTL_EXPIRES_KEY: 1000 }).as_object().cloned().unwrap();
        assert!(is_expired(&meta, 1000));
        assert!(is_expired(&meta, 2000));
        assert!(!is_expired(&meta, 999));
        assert!(!is_expired(&serde_json::Map::new(), i64::MAX));
    }
}
