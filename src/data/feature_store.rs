//! Reads silver-layer feature frames, consulting the version registry for
//! pinned run_ids before falling back to the latest run (§4.6).

use anyhow::Result;
use chrono::{DateTime, Utc};
use polars::prelude::*;

use crate::config::DataPipelineConfig;
use crate::data::store::{Layer, ParquetStore};
use crate::data::version::safe_symbol;
use crate::data::version_registry::VersionRegistry;
use crate::error::CoreError;

pub struct FeatureStore<'a> {
    config: &'a DataPipelineConfig,
    store: ParquetStore,
}

impl<'a> FeatureStore<'a> {
    pub fn new(config: &'a DataPipelineConfig) -> Self {
        Self {
            store: ParquetStore::new(&config.data_root),
            config,
        }
    }

    /// Loads the silver frame for `symbol`/`timeframe`. If `run_id` is not
    /// given explicitly, the version registry is consulted for a pinned
    /// run_id before falling back to the newest run (§4.6, §4.11).
    pub fn load_features(
        &self,
        symbol: &str,
        timeframe: &str,
        namespace: Option<&str>,
        run_id: Option<&str>,
    ) -> Result<DataFrame> {
        let namespace = namespace.unwrap_or(&self.config.dataset_namespace);
        let symbol_safe = safe_symbol(symbol);

        let resolved_run_id = match run_id {
            Some(r) => Some(r.to_string()),
            None => {
                let registry = VersionRegistry::load(self.config.registry_path())?;
                registry
                    .get(namespace, &symbol_safe, timeframe)
                    .map(|s| s.to_string())
            }
        };

        let frame = self.store.read_latest(
            Layer::Silver,
            &symbol_safe,
            timeframe,
            namespace,
            resolved_run_id.as_deref(),
        )?;

        frame.ok_or_else(|| {
            CoreError::RunNotFound {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
                run_id: resolved_run_id.unwrap_or_else(|| "latest".to_string()),
            }
            .into()
        })
    }

    /// Loads features and filters to `[start, end)` by `start_ts`. Returns
    /// `CoreError::EmptyWindow` if nothing falls inside the window (§4.6).
    pub fn load_time_window(
        &self,
        symbol: &str,
        timeframe: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        namespace: Option<&str>,
        run_id: Option<&str>,
    ) -> Result<DataFrame> {
        let frame = self.load_features(symbol, timeframe, namespace, run_id)?;
        let start_ms = start.timestamp_millis();
        let end_ms = end.timestamp_millis();

        let filtered = frame
            .lazy()
            .filter(col("start_ts").gt_eq(lit(start_ms)).and(col("start_ts").lt(lit(end_ms))))
            .collect()?;

        if filtered.height() == 0 {
            return Err(CoreError::EmptyWindow.into());
        }
        Ok(filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::pipeline::{synthetic_candles, DataPipeline};
    use chrono::TimeZone;

    fn ingested(tmp: &std::path::Path) -> DataPipelineConfig {
        let cfg = DataPipelineConfig::new(tmp).unwrap();
        let pipeline = DataPipeline::new(&cfg);
        let start = Utc.with_ymd_and_hms(2025, 11, 5, 3, 45, 0).unwrap();
        let candles = synthetic_candles(start, 40, 3252.0);
        pipeline
            .ingest("RELIANCE.NS", "5m", candles, None, None, Some("run-a".to_string()))
            .unwrap();
        cfg
    }

    #[test]
    fn load_features_finds_latest_run() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = ingested(tmp.path());
        let store = FeatureStore::new(&cfg);
        let frame = store.load_features("RELIANCE.NS", "5m", None, None).unwrap();
        assert_eq!(frame.height(), 40);
    }

    #[test]
    fn registry_pin_overrides_latest() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = ingested(tmp.path());
        let pipeline = DataPipeline::new(&cfg);
        let start = Utc.with_ymd_and_hms(2025, 11, 6, 3, 45, 0).unwrap();
        let candles = synthetic_candles(start, 10, 4000.0);
        pipeline
            .ingest("RELIANCE.NS", "5m", candles, None, None, Some("run-b".to_string()))
            .unwrap();

        let mut registry = VersionRegistry::load(cfg.registry_path()).unwrap();
        registry.set("v1", "RELIANCE_NS", "5m", "run-a").unwrap();

        let store = FeatureStore::new(&cfg);
        let frame = store.load_features("RELIANCE.NS", "5m", None, None).unwrap();
        assert_eq!(frame.height(), 40);
    }

    #[test]
    fn missing_run_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = DataPipelineConfig::new(tmp.path()).unwrap();
        let store = FeatureStore::new(&cfg);
        assert!(store.load_features("NOPE.NS", "5m", None, None).is_err());
    }

    #[test]
    fn load_time_window_filters_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = ingested(tmp.path());
        let store = FeatureStore::new(&cfg);
        let start = Utc.with_ymd_and_hms(2025, 11, 5, 3, 45, 0).unwrap();
        let end = start + chrono::Duration::minutes(25);
        let frame = store
            .load_time_window("RELIANCE.NS", "5m", start, end, None, None)
            .unwrap();
        assert_eq!(frame.height(), 5);
    }

    #[test]
    fn load_time_window_empty_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = ingested(tmp.path());
        let store = FeatureStore::new(&cfg);
        let start = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let end = start + chrono::Duration::minutes(25);
        assert!(store
            .load_time_window("RELIANCE.NS", "5m", start, end, None, None)
            .is_err());
    }
}
