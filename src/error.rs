//! Typed error taxonomy for the data pipeline, training orchestrator, and
//! backtest engine. Infrastructure failures (I/O, Parquet, JSON) are wrapped
//! with `anyhow::Context` at the call site rather than folded into this enum.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid candle: {reason}")]
    InvalidCandle { reason: String },

    #[error("empty batch supplied for ingestion")]
    EmptyBatch,

    #[error("unsupported layer '{layer}'")]
    UnsupportedLayer { layer: String },

    #[error("unsupported timeframe '{timeframe}'")]
    UnsupportedTimeframe { timeframe: String },

    #[error("insufficient data: have {have} rows, need at least {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("insufficient cash: need {need:.2}, have {have:.2}")]
    InsufficientCash { need: f64, have: f64 },

    #[error("run '{run_id}' not found for {symbol}/{timeframe}")]
    RunNotFound {
        symbol: String,
        timeframe: String,
        run_id: String,
    },

    #[error("no candles in requested date window")]
    EmptyWindow,

    #[error("dataset version collision: {path} already exists")]
    VersionCollision { path: String },

    #[error("corrupt registry at {path}: {reason}")]
    CorruptRegistry { path: String, reason: String },

    #[error("no open position for '{0}'")]
    PositionNotFound(String),

    #[error("order rejected: {reason}")]
    OrderRejected { reason: String },
}
