//! Validates raw candle records against the Candle invariants (§3, §4.2).

use chrono::{DateTime, Utc};

use crate::error::CoreError;

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct RawCandle {
    pub start_ts: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: Option<f64>,
}

/// A candle that has passed invariant checks.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleRecord {
    pub start_ts: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Validates a single candle. Unlike the Python original (which only checks
/// `close` against `low`/`high`), this also checks `open`, matching the
/// literal invariant `low ≤ open,close ≤ high` (see DESIGN.md).
pub fn validate_candle(raw: &RawCandle) -> Result<CandleRecord, CoreError> {
    if raw.low > raw.high {
        return Err(CoreError::InvalidCandle {
            reason: format!("low ({}) must be <= high ({})", raw.low, raw.high),
        });
    }
    if raw.open < raw.low || raw.open > raw.high {
        return Err(CoreError::InvalidCandle {
            reason: format!(
                "open ({}) must be within [low, high] = [{}, {}]",
                raw.open, raw.low, raw.high
            ),
        });
    }
    if raw.close < raw.low || raw.close > raw.high {
        return Err(CoreError::InvalidCandle {
            reason: format!(
                "close ({}) must be within [low, high] = [{}, {}]",
                raw.close, raw.low, raw.high
            ),
        });
    }
    let volume = raw.volume.unwrap_or(0.0);
    if volume < 0.0 {
        return Err(CoreError::InvalidCandle {
            reason: format!("volume ({volume}) must be >= 0"),
        });
    }
    Ok(CandleRecord {
        start_ts: raw.start_ts,
        open: raw.open,
        high: raw.high,
        low: raw.low,
        close: raw.close,
        volume,
    })
}

/// Validates a whole batch, failing on the first invalid record (§4.2).
pub fn validate_batch(raw: &[RawCandle]) -> Result<Vec<CandleRecord>, CoreError> {
    raw.iter().map(validate_candle).collect()
}
