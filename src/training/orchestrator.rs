//! High-level walk-forward training across model families (§4.9), grounded
//! on the source's `TrainingOrchestrator.train` / `walk_forward_validate`.

use std::collections::HashMap;

use anyhow::Result;
use chrono::Utc;
use polars::prelude::*;
use tracing::{info, info_span, warn};

use crate::config::{CoreConfig, ModelHyperparameters};
use crate::data::feature_store::FeatureStore;
use crate::data::version::safe_symbol;
use crate::error::CoreError;
use crate::training::models::baseline::BaselineTrainer;
use crate::training::models::gradient_boosting::GradientBoostingTrainer;
use crate::training::models::quantile::QuantileTrainer;
use crate::training::models::random_forest::RandomForestTrainer;
use crate::training::models::ModelTrainer;
use crate::training::splitter::WalkForwardSplitter;

pub const DEFAULT_FAMILIES: [&str; 4] = ["baseline", "random_forest", "gradient_boosting", "quantile"];

#[derive(Debug, Clone)]
pub struct TrainingResult {
    pub experiment_id: String,
    pub symbol: String,
    pub timeframe: String,
    pub metrics: HashMap<String, HashMap<String, f64>>,
    pub artifacts: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct SplitMetric {
    pub split: usize,
    pub rmse: f64,
    pub mae: f64,
    pub rmse_pct: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Alert {
    pub family: String,
    pub split: usize,
    pub metric: String,
    pub value_pct: f64,
}

#[derive(Debug, Clone)]
pub struct WalkForwardValidation {
    pub symbol: String,
    pub timeframe: String,
    pub split_metrics: HashMap<String, Vec<SplitMetric>>,
    pub aggregated: HashMap<String, HashMap<String, f64>>,
    pub alerts: Vec<Alert>,
}

fn build_trainer(family: &str, params: &ModelHyperparameters) -> Option<Box<dyn ModelTrainer>> {
    match family {
        "baseline" => Some(Box::new(BaselineTrainer::default())),
        "random_forest" => Some(Box::new(RandomForestTrainer::new(
            params.random_forest_n_estimators,
            params.random_forest_max_depth,
        ))),
        "gradient_boosting" => Some(Box::new(GradientBoostingTrainer::new(
            params.gradient_boosting_n_estimators,
            params.gradient_boosting_learning_rate,
        ))),
        "quantile" => Some(Box::new(QuantileTrainer::new(params.quantile_alpha))),
        _ => None,
    }
}

fn aggregate_metrics(metrics: &[HashMap<String, f64>]) -> HashMap<String, f64> {
    let mut aggregated = HashMap::new();
    if metrics.is_empty() {
        return aggregated;
    }
    for key in metrics[0].keys() {
        let sum: f64 = metrics.iter().filter_map(|m| m.get(key)).sum();
        let count = metrics.iter().filter(|m| m.contains_key(key)).count().max(1);
        aggregated.insert(key.clone(), sum / count as f64);
    }
    aggregated
}

pub struct TrainingOrchestrator<'a> {
    config: &'a CoreConfig,
    feature_store: FeatureStore<'a>,
    registry: crate::training::registry::ExperimentRegistry,
}

impl<'a> TrainingOrchestrator<'a> {
    pub fn new(config: &'a CoreConfig) -> Result<Self> {
        Ok(Self {
            feature_store: FeatureStore::new(&config.data),
            registry: crate::training::registry::ExperimentRegistry::new(config.data.experiments_root())?,
            config,
        })
    }

    fn families(&self, families: Option<Vec<String>>) -> Vec<String> {
        families.unwrap_or_else(|| DEFAULT_FAMILIES.iter().map(|s| s.to_string()).collect())
    }

    pub fn train(
        &self,
        symbol: &str,
        timeframe: &str,
        families: Option<Vec<String>>,
        run_id: Option<&str>,
    ) -> Result<TrainingResult> {
        let span = info_span!("train", symbol, timeframe);
        let _enter = span.enter();

        let families = self.families(families);
        let df = self.feature_store.load_features(symbol, timeframe, None, run_id)?;
        if df.height() < self.config.training.min_rows {
            return Err(CoreError::InsufficientData {
                have: df.height(),
                need: self.config.training.min_rows,
            }
            .into());
        }

        let forecast_horizon = self.config.forecast_horizon(timeframe);
        let splitter = WalkForwardSplitter::new(self.config.training.walk_forward_splits, forecast_horizon);
        let splits = splitter.split(df.height())?;

        let mut metrics_summary = HashMap::new();
        let mut artifacts_summary = HashMap::new();

        for family in &families {
            let Some(mut trainer) = build_trainer(family, &self.config.training.model_params) else {
                continue;
            };
            let mut metrics_accum = Vec::new();
            for split in &splits {
                let test_len = split.test_range.1 - split.test_range.0;
                if test_len < self.config.min_candles_for_prediction {
                    warn!(family = %family, test_len, min = self.config.min_candles_for_prediction, "skipping split with too few candles to predict over");
                    continue;
                }
                let train_df = df.slice(split.train_range.0 as i64, split.train_range.1 - split.train_range.0);
                let test_df = df.slice(split.test_range.0 as i64, test_len);
                let output = trainer.train_and_score(&train_df, &test_df)?;
                artifacts_summary.insert(
                    format!("{family}_artifact"),
                    output.artifact.get("trainer").cloned().unwrap_or_default(),
                );
                metrics_accum.push(output.metrics);
            }
            metrics_summary.insert(family.clone(), aggregate_metrics(&metrics_accum));
        }

        let experiment_id = format!(
            "exp-{}-{}-{}",
            safe_symbol(symbol),
            timeframe,
            Utc::now().format("%Y%m%dT%H%M%S")
        );
        let record = crate::training::registry::ExperimentRecord {
            experiment_id: experiment_id.clone(),
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            families: families.clone(),
            metrics: metrics_summary.clone(),
            artifacts: artifacts_summary.clone(),
            created_at: Utc::now(),
        };
        let path = self.registry.log(&record)?;
        artifacts_summary.insert("registry_path".to_string(), path.display().to_string());

        info!(experiment_id = %experiment_id, "training complete");

        Ok(TrainingResult {
            experiment_id,
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            metrics: metrics_summary,
            artifacts: artifacts_summary,
        })
    }

    /// Runs the same walk-forward loop but surfaces per-split RMSE as a
    /// percentage of the latest close, logging a `warn` for every split that
    /// breaches `alert_threshold_pct` (§4.9).
    pub fn walk_forward_validate(
        &self,
        symbol: &str,
        timeframe: &str,
        families: Option<Vec<String>>,
        run_id: Option<&str>,
        alert_threshold_pct: f64,
    ) -> Result<WalkForwardValidation> {
        let families = self.families(families);
        let df = self.feature_store.load_features(symbol, timeframe, None, run_id)?;
        if df.height() < self.config.training.min_rows {
            return Err(CoreError::InsufficientData {
                have: df.height(),
                need: self.config.training.min_rows,
            }
            .into());
        }

        let reference_close = df
            .column("close")?
            .cast(&DataType::Float64)?
            .f64()?
            .get(df.height() - 1);

        let forecast_horizon = self.config.forecast_horizon(timeframe);
        let splitter = WalkForwardSplitter::new(self.config.training.walk_forward_splits, forecast_horizon);
        let splits = splitter.split(df.height())?;

        let mut split_metrics: HashMap<String, Vec<SplitMetric>> = HashMap::new();
        let mut alerts = Vec::new();

        for family in &families {
            let Some(mut trainer) = build_trainer(family, &self.config.training.model_params) else {
                continue;
            };
            let mut results = Vec::new();
            for (split_id, split) in splits.iter().enumerate() {
                let test_len = split.test_range.1 - split.test_range.0;
                if test_len < self.config.min_candles_for_prediction {
                    warn!(family = %family, split_id, test_len, min = self.config.min_candles_for_prediction, "skipping split with too few candles to predict over");
                    continue;
                }
                let train_df = df.slice(split.train_range.0 as i64, split.train_range.1 - split.train_range.0);
                let test_df = df.slice(split.test_range.0 as i64, test_len);
                let output = trainer.train_and_score(&train_df, &test_df)?;
                let rmse = *output.metrics.get("rmse").unwrap_or(&0.0);
                let mae = *output.metrics.get("mae").unwrap_or(&0.0);
                let rmse_pct = reference_close
                    .filter(|c| *c != 0.0)
                    .map(|c| rmse / c.abs());

                if let Some(pct) = rmse_pct {
                    if pct > alert_threshold_pct {
                        warn!(family = %family, split = split_id, rmse_pct = pct * 100.0, "walk-forward rmse breach");
                        alerts.push(Alert {
                            family: family.clone(),
                            split: split_id,
                            metric: "rmse".to_string(),
                            value_pct: pct * 100.0,
                        });
                    }
                }

                results.push(SplitMetric {
                    split: split_id,
                    rmse,
                    mae,
                    rmse_pct: rmse_pct.map(|p| p * 100.0),
                });
            }
            split_metrics.insert(family.clone(), results);
        }

        let aggregated = split_metrics
            .iter()
            .map(|(family, results)| {
                let metrics: Vec<HashMap<String, f64>> = results
                    .iter()
                    .map(|r| HashMap::from([("rmse".to_string(), r.rmse), ("mae".to_string(), r.mae)]))
                    .collect();
                (family.clone(), aggregate_metrics(&metrics))
            })
            .collect();

        Ok(WalkForwardValidation {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            split_metrics,
            aggregated,
            alerts,
        })
    }
}
