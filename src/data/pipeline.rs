//! Orchestrates raw→bronze→silver promotion for a batch of candles (§4.5).

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use polars::prelude::*;
use tracing::{info, info_span};

use crate::calendar::ExchangeCalendar;
use crate::config::{timeframe_minutes, DataPipelineConfig};
use crate::data::schema::{validate_batch, CandleRecord, RawCandle};
use crate::data::store::{Layer, ParquetStore};
use crate::data::version::{build_version, DatasetVersion};
use crate::error::CoreError;

#[derive(Debug, Clone)]
pub struct DataArtifacts {
    pub raw_path: std::path::PathBuf,
    pub bronze_path: std::path::PathBuf,
    pub silver_path: std::path::PathBuf,
    pub namespace: String,
    pub run_id: String,
    pub record_count: usize,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone)]
struct BronzeRow {
    start_ts: DateTime<Utc>,
    end_ts: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    session: String,
    provider: String,
    ingested_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct SilverRow {
    bronze: BronzeRow,
    return_1: f64,
    return_5: f64,
    rolling_mean_10: f64,
    rolling_std_10: f64,
    volume_ma_10: f64,
    high_low_spread: f64,
    momentum_10: f64,
    ema_20: f64,
    is_gap_up: i32,
    is_gap_down: i32,
}

pub struct DataPipeline<'a> {
    config: &'a DataPipelineConfig,
    store: ParquetStore,
    calendar: ExchangeCalendar,
}

impl<'a> DataPipeline<'a> {
    pub fn new(config: &'a DataPipelineConfig) -> Self {
        Self {
            store: ParquetStore::new(&config.data_root),
            calendar: ExchangeCalendar::new(&config.timezone),
            config,
        }
    }

    pub fn ingest(
        &self,
        symbol: &str,
        timeframe: &str,
        candles: Vec<RawCandle>,
        provider: Option<&str>,
        explicit_namespace: Option<&str>,
        run_id: Option<String>,
    ) -> Result<DataArtifacts> {
        let span = info_span!("ingest", symbol, timeframe);
        let _enter = span.enter();

        if candles.is_empty() {
            return Err(CoreError::EmptyBatch.into());
        }

        let records = validate_batch(&candles)?;
        let version = build_version(
            symbol,
            timeframe,
            explicit_namespace,
            run_id,
            &self.config.dataset_namespace,
        );

        let provider_name = provider.unwrap_or("unknown").to_string();
        let ingested_at = Utc::now();
        let mut raw_sorted = records;
        raw_sorted.sort_by_key(|r| r.start_ts);

        let raw_frame = raw_frame_from_records(&raw_sorted, &provider_name, ingested_at)?;
        let raw_path = self.persist(Layer::Raw, &version, raw_frame)?;

        let interval_minutes = *timeframe_minutes().get(timeframe).unwrap_or(&5);
        let bronze_rows = bronze_transform(
            &raw_sorted,
            interval_minutes,
            &provider_name,
            ingested_at,
            &self.calendar,
        );
        let bronze_frame = bronze_frame_from_rows(&bronze_rows)?;
        let bronze_path = self.persist(Layer::Bronze, &version, bronze_frame)?;

        let silver_rows = silver_transform(&bronze_rows);
        let silver_frame = silver_frame_from_rows(&silver_rows)?;
        let record_count = silver_rows.len();
        let silver_path = self.persist(Layer::Silver, &version, silver_frame)?;

        let mut metadata = HashMap::new();
        metadata.insert("symbol".to_string(), symbol.to_string());
        metadata.insert("timeframe".to_string(), timeframe.to_string());
        metadata.insert("provider".to_string(), provider_name);
        metadata.insert(
            "start_ts".to_string(),
            silver_rows
                .first()
                .map(|r| r.bronze.start_ts.to_rfc3339())
                .unwrap_or_default(),
        );
        metadata.insert(
            "end_ts".to_string(),
            silver_rows
                .last()
                .map(|r| r.bronze.start_ts.to_rfc3339())
                .unwrap_or_default(),
        );

        info!(record_count, run_id = %version.run_id, "ingest complete");

        Ok(DataArtifacts {
            raw_path,
            bronze_path,
            silver_path,
            namespace: version.namespace,
            run_id: version.run_id,
            record_count,
            metadata,
        })
    }

    fn persist(&self, layer: Layer, version: &DatasetVersion, mut frame: DataFrame) -> Result<std::path::PathBuf> {
        self.store.write(
            &mut frame,
            layer,
            &version.symbol_safe,
            &version.timeframe,
            &version.namespace,
            &version.run_id,
        )
    }
}

fn raw_frame_from_records(
    records: &[CandleRecord],
    provider: &str,
    ingested_at: DateTime<Utc>,
) -> Result<DataFrame> {
    let start_ts: Vec<i64> = records.iter().map(|r| r.start_ts.timestamp_millis()).collect();
    let open: Vec<f64> = records.iter().map(|r| r.open).collect();
    let high: Vec<f64> = records.iter().map(|r| r.high).collect();
    let low: Vec<f64> = records.iter().map(|r| r.low).collect();
    let close: Vec<f64> = records.iter().map(|r| r.close).collect();
    let volume: Vec<f64> = records.iter().map(|r| r.volume).collect();
    let provider_col = vec![provider.to_string(); records.len()];
    let ingested_at_col = vec![ingested_at.timestamp_millis(); records.len()];

    Ok(df! {
        "start_ts" => &start_ts,
        "open" => &open,
        "high" => &high,
        "low" => &low,
        "close" => &close,
        "volume" => &volume,
        "provider" => &provider_col,
        "ingested_at" => &ingested_at_col,
    }?)
}

/// Drops duplicate `start_ts` keeping the last, computes `end_ts`, classifies
/// `session`, drops non-trading-day rows, fills null volume with 0 (§4.5
/// step 5). Tie-break: the later-arriving candle wins (§4.5).
fn bronze_transform(
    records: &[CandleRecord],
    interval_minutes: i64,
    provider: &str,
    ingested_at: DateTime<Utc>,
    calendar: &ExchangeCalendar,
) -> Vec<BronzeRow> {
    let mut by_ts: Vec<(DateTime<Utc>, &CandleRecord)> = Vec::new();
    for record in records {
        if let Some(existing) = by_ts.iter_mut().find(|(ts, _)| *ts == record.start_ts) {
            existing.1 = record;
        } else {
            by_ts.push((record.start_ts, record));
        }
    }
    by_ts.sort_by_key(|(ts, _)| *ts);

    by_ts
        .into_iter()
        .filter_map(|(start_ts, record)| {
            let date = start_ts.date_naive();
            if !calendar.is_trading_day(date) {
                return None;
            }
            let ist = start_ts.with_timezone(&chrono_tz::Asia::Kolkata);
            let status = calendar.validate_trading_session(ist);
            let session = if status.is_market_open {
                status
                    .session_type
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_else(|| "regular".to_string())
            } else {
                status.reason
            };
            let end_ts = start_ts + chrono::Duration::minutes(interval_minutes);
            Some(BronzeRow {
                start_ts,
                end_ts,
                open: record.open,
                high: record.high,
                low: record.low,
                close: record.close,
                volume: record.volume,
                session,
                provider: provider.to_string(),
                ingested_at,
            })
        })
        .collect()
}

/// Adds derived features per §3 with rolling windows of 10 and EMA span 20;
/// replaces ±Inf with NaN then 0; drops rows where `close` is NaN (never
/// happens given validation, kept for parity with the source's defensive
/// step).
fn silver_transform(bronze: &[BronzeRow]) -> Vec<SilverRow> {
    let n = bronze.len();
    let closes: Vec<f64> = bronze.iter().map(|r| r.close).collect();
    let opens: Vec<f64> = bronze.iter().map(|r| r.open).collect();
    let highs: Vec<f64> = bronze.iter().map(|r| r.high).collect();
    let lows: Vec<f64> = bronze.iter().map(|r| r.low).collect();
    let volumes: Vec<f64> = bronze.iter().map(|r| r.volume).collect();

    let pct_change = |i: usize, lag: usize| -> f64 {
        if i < lag || closes[i - lag] == 0.0 {
            0.0
        } else {
            let v = (closes[i] - closes[i - lag]) / closes[i - lag];
            if v.is_finite() {
                v
            } else {
                0.0
            }
        }
    };

    let rolling_mean = |i: usize, window: usize, data: &[f64]| -> f64 {
        let start = i.saturating_sub(window - 1);
        let slice = &data[start..=i];
        slice.iter().sum::<f64>() / slice.len() as f64
    };

    let rolling_std = |i: usize, window: usize, data: &[f64]| -> f64 {
        let start = i.saturating_sub(window - 1);
        let slice = &data[start..=i];
        if slice.len() < 2 {
            return 0.0;
        }
        let mean = slice.iter().sum::<f64>() / slice.len() as f64;
        let var = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (slice.len() - 1) as f64;
        let std = var.sqrt();
        if std.is_finite() {
            std
        } else {
            0.0
        }
    };

    // EMA with adjust=false: ema[0] = close[0]; ema[i] = alpha*close[i] + (1-alpha)*ema[i-1].
    let alpha = 2.0 / (20.0 + 1.0);
    let mut ema_20 = vec![0.0; n];
    for i in 0..n {
        ema_20[i] = if i == 0 {
            closes[0]
        } else {
            alpha * closes[i] + (1.0 - alpha) * ema_20[i - 1]
        };
    }

    (0..n)
        .map(|i| {
            let high_low_spread = if closes[i] != 0.0 {
                let v = (highs[i] - lows[i]) / closes[i];
                if v.is_finite() {
                    v
                } else {
                    0.0
                }
            } else {
                0.0
            };
            let momentum_10 = if i >= 10 { closes[i] - closes[i - 10] } else { 0.0 };
            let is_gap_up = if i > 0 && opens[i] > closes[i - 1] { 1 } else { 0 };
            let is_gap_down = if i > 0 && opens[i] < closes[i - 1] { 1 } else { 0 };

            SilverRow {
                bronze: bronze[i].clone(),
                return_1: pct_change(i, 1),
                return_5: pct_change(i, 5),
                rolling_mean_10: rolling_mean(i, 10, &closes),
                rolling_std_10: rolling_std(i, 10, &closes),
                volume_ma_10: rolling_mean(i, 10, &volumes),
                high_low_spread,
                momentum_10,
                ema_20: ema_20[i],
                is_gap_up,
                is_gap_down,
            }
        })
        .collect()
}

fn bronze_frame_from_rows(rows: &[BronzeRow]) -> Result<DataFrame> {
    let start_ts: Vec<i64> = rows.iter().map(|r| r.start_ts.timestamp_millis()).collect();
    let end_ts: Vec<i64> = rows.iter().map(|r| r.end_ts.timestamp_millis()).collect();
    let open: Vec<f64> = rows.iter().map(|r| r.open).collect();
    let high: Vec<f64> = rows.iter().map(|r| r.high).collect();
    let low: Vec<f64> = rows.iter().map(|r| r.low).collect();
    let close: Vec<f64> = rows.iter().map(|r| r.close).collect();
    let volume: Vec<f64> = rows.iter().map(|r| r.volume).collect();
    let session: Vec<&str> = rows.iter().map(|r| r.session.as_str()).collect();
    let provider: Vec<&str> = rows.iter().map(|r| r.provider.as_str()).collect();
    let ingested_at: Vec<i64> = rows.iter().map(|r| r.ingested_at.timestamp_millis()).collect();

    Ok(df! {
        "start_ts" => &start_ts,
        "end_ts" => &end_ts,
        "open" => &open,
        "high" => &high,
        "low" => &low,
        "close" => &close,
        "volume" => &volume,
        "session" => &session,
        "provider" => &provider,
        "ingested_at" => &ingested_at,
    }?)
}

fn silver_frame_from_rows(rows: &[SilverRow]) -> Result<DataFrame> {
    let start_ts: Vec<i64> = rows.iter().map(|r| r.bronze.start_ts.timestamp_millis()).collect();
    let end_ts: Vec<i64> = rows.iter().map(|r| r.bronze.end_ts.timestamp_millis()).collect();
    let open: Vec<f64> = rows.iter().map(|r| r.bronze.open).collect();
    let high: Vec<f64> = rows.iter().map(|r| r.bronze.high).collect();
    let low: Vec<f64> = rows.iter().map(|r| r.bronze.low).collect();
    let close: Vec<f64> = rows.iter().map(|r| r.bronze.close).collect();
    let volume: Vec<f64> = rows.iter().map(|r| r.bronze.volume).collect();
    let session: Vec<&str> = rows.iter().map(|r| r.bronze.session.as_str()).collect();
    let return_1: Vec<f64> = rows.iter().map(|r| r.return_1).collect();
    let return_5: Vec<f64> = rows.iter().map(|r| r.return_5).collect();
    let rolling_mean_10: Vec<f64> = rows.iter().map(|r| r.rolling_mean_10).collect();
    let rolling_std_10: Vec<f64> = rows.iter().map(|r| r.rolling_std_10).collect();
    let volume_ma_10: Vec<f64> = rows.iter().map(|r| r.volume_ma_10).collect();
    let high_low_spread: Vec<f64> = rows.iter().map(|r| r.high_low_spread).collect();
    let momentum_10: Vec<f64> = rows.iter().map(|r| r.momentum_10).collect();
    let ema_20: Vec<f64> = rows.iter().map(|r| r.ema_20).collect();
    let is_gap_up: Vec<i32> = rows.iter().map(|r| r.is_gap_up).collect();
    let is_gap_down: Vec<i32> = rows.iter().map(|r| r.is_gap_down).collect();

    Ok(df! {
        "start_ts" => &start_ts,
        "end_ts" => &end_ts,
        "open" => &open,
        "high" => &high,
        "low" => &low,
        "close" => &close,
        "volume" => &volume,
        "session" => &session,
        "return_1" => &return_1,
        "return_5" => &return_5,
        "rolling_mean_10" => &rolling_mean_10,
        "rolling_std_10" => &rolling_std_10,
        "volume_ma_10" => &volume_ma_10,
        "high_low_spread" => &high_low_spread,
        "momentum_10" => &momentum_10,
        "ema_20" => &ema_20,
        "is_gap_up" => &is_gap_up,
        "is_gap_down" => &is_gap_down,
    }?)
}

/// Constructs `n` synthetic 5-minute candles with `close[i] = base + i`,
/// used by tests and available to callers seeding demos. `open[i]` is the
/// prior candle's close (or the first candle's own close for `i == 0`), so
/// the series never gaps up or down relative to the prior close.
pub fn synthetic_candles(start: DateTime<Utc>, n: usize, base_close: f64) -> Vec<RawCandle> {
    (0..n)
        .map(|i| {
            let close = base_close + i as f64;
            let open = if i == 0 { close } else { base_close + (i - 1) as f64 };
            RawCandle {
                start_ts: start + chrono::Duration::minutes(5 * i as i64),
                open,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: Some(1000.0 + i as f64),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config(root: &std::path::Path) -> DataPipelineConfig {
        DataPipelineConfig::new(root).unwrap()
    }

    #[test]
    fn happy_path_ingest_produces_silver_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());
        let pipeline = DataPipeline::new(&cfg);

        // 2025-11-05T09:15+05:30 == 2025-11-05T03:45:00Z
        let start = Utc.with_ymd_and_hms(2025, 11, 5, 3, 45, 0).unwrap();
        let candles = synthetic_candles(start, 40, 3252.0);

        let artifacts = pipeline
            .ingest("RELIANCE.NS", "5m", candles, None, None, None)
            .unwrap();
        assert_eq!(artifacts.record_count, 40);
    }

    #[test]
    fn holiday_rows_are_dropped() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());
        let pipeline = DataPipeline::new(&cfg);

        // 2025-11-09 is a Sunday; include 5 candles on it among 40.
        let start = Utc.with_ymd_and_hms(2025, 11, 5, 3, 45, 0).unwrap();
        let mut candles = synthetic_candles(start, 35, 3252.0);
        let sunday = Utc.with_ymd_and_hms(2025, 11, 9, 3, 45, 0).unwrap();
        candles.extend(synthetic_candles(sunday, 5, 4000.0));

        let artifacts = pipeline
            .ingest("RELIANCE.NS", "5m", candles, None, None, None)
            .unwrap();
        assert_eq!(artifacts.record_count, 35);
    }

    #[test]
    fn empty_batch_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());
        let pipeline = DataPipeline::new(&cfg);
        let result = pipeline.ingest("RELIANCE.NS", "5m", vec![], None, None, None);
        assert!(result.is_err());
    }

    #[test]
    fn ema_matches_analytic_formula() {
        let start = Utc.with_ymd_and_hms(2025, 11, 5, 3, 45, 0).unwrap();
        let candles = synthetic_candles(start, 40, 3252.0);
        let records = validate_batch(&candles).unwrap();
        let calendar = ExchangeCalendar::default();
        let bronze = bronze_transform(&records, 5, "unknown", Utc::now(), &calendar);
        let silver = silver_transform(&bronze);

        let closes: Vec<f64> = bronze.iter().map(|r| r.close).collect();
        let alpha = 2.0 / 21.0;
        let mut expected = closes[0];
        for i in 1..closes.len() {
            expected = alpha * closes[i] + (1.0 - alpha) * expected;
        }
        assert!((silver.last().unwrap().ema_20 - expected).abs() < 1e-9);
    }

    #[test]
    fn gap_flags_are_zero_for_monotonic_close_series() {
        let start = Utc.with_ymd_and_hms(2025, 11, 5, 3, 45, 0).unwrap();
        let candles = synthetic_candles(start, 40, 3252.0);
        let records = validate_batch(&candles).unwrap();
        let calendar = ExchangeCalendar::default();
        let bronze = bronze_transform(&records, 5, "unknown", Utc::now(), &calendar);
        let silver = silver_transform(&bronze);
        assert!(silver.iter().all(|r| r.is_gap_up == 0 && r.is_gap_down == 0));
    }
}
