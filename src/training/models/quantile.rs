//! Quantile-interval trainer: lower, upper and point boosted estimators
//! (§4.8). Only the point estimator's metrics are published, matching the
//! source; the bounds surface solely through `artifact_metadata` (decided
//! open question, see DESIGN.md).

use std::collections::HashMap;

use anyhow::Result;
use polars::prelude::*;

use crate::training::tree::GradientBoostingRegressor;

use super::{build_xy, evaluate, ModelTrainer, TrainOutput};

pub struct QuantileTrainer {
    alpha: f64,
    lower: Option<GradientBoostingRegressor>,
    upper: Option<GradientBoostingRegressor>,
    point: Option<GradientBoostingRegressor>,
    last_avg_bounds: (f64, f64),
}

impl QuantileTrainer {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            lower: None,
            upper: None,
            point: None,
            last_avg_bounds: (0.0, 0.0),
        }
    }
}

impl ModelTrainer for QuantileTrainer {
    fn name(&self) -> &'static str {
        "quantile"
    }

    fn fit(&mut self, train_df: &DataFrame) -> Result<()> {
        let (x, y) = build_xy(train_df)?;

        let mut lower = GradientBoostingRegressor::new(200, 0.05, 3, Some(1.0 - self.alpha));
        lower.fit(&x, &y);
        let mut upper = GradientBoostingRegressor::new(200, 0.05, 3, Some(self.alpha));
        upper.fit(&x, &y);
        let mut point = GradientBoostingRegressor::new(200, 0.05, 3, None);
        point.fit(&x, &y);

        self.lower = Some(lower);
        self.upper = Some(upper);
        self.point = Some(point);
        Ok(())
    }

    fn predict(&self, test_df: &DataFrame) -> Result<Vec<f64>> {
        let (x, _) = build_xy(test_df)?;
        Ok(self.point.as_ref().map(|m| m.predict(&x)).unwrap_or_default())
    }

    fn artifact_metadata(&self) -> HashMap<String, String> {
        HashMap::from([
            ("trainer".to_string(), self.name().to_string()),
            (
                "avg_bounds".to_string(),
                format!("[{:.4}, {:.4}]", self.last_avg_bounds.0, self.last_avg_bounds.1),
            ),
        ])
    }

    /// Overridden so the lower/upper interval can be computed alongside the
    /// point estimate without requiring interior mutability in `predict`
    /// (the interval never feeds into published metrics, only
    /// `artifact_metadata`, per the decided open question).
    fn train_and_score(&mut self, train_df: &DataFrame, test_df: &DataFrame) -> Result<TrainOutput> {
        self.fit(train_df)?;
        let (x, actuals) = build_xy(test_df)?;

        let point_preds = self.point.as_ref().map(|m| m.predict(&x)).unwrap_or_default();
        let lower_preds = self.lower.as_ref().map(|m| m.predict(&x)).unwrap_or_default();
        let upper_preds = self.upper.as_ref().map(|m| m.predict(&x)).unwrap_or_default();

        self.last_avg_bounds = (
            mean(&lower_preds),
            mean(&upper_preds),
        );

        let metrics = evaluate(&actuals, &point_preds);
        Ok(TrainOutput {
            model_name: self.name().to_string(),
            metrics,
            artifact: self.artifact_metadata(),
        })
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(n: usize) -> DataFrame {
        let close: Vec<f64> = (0..n).map(|i| 100.0 + i as f64 * 0.5).collect();
        df! {
            "open" => &close, "high" => &close, "low" => &close, "close" => &close,
            "volume" => &vec![1000.0; n], "return_1" => &vec![0.0; n], "return_5" => &vec![0.0; n],
            "rolling_mean_10" => &close, "rolling_std_10" => &vec![1.0; n],
            "volume_ma_10" => &vec![1000.0; n], "high_low_spread" => &vec![0.0; n],
            "momentum_10" => &vec![0.0; n], "ema_20" => &close,
            "is_gap_up" => &vec![0i32; n], "is_gap_down" => &vec![0i32; n],
        }
        .unwrap()
    }

    #[test]
    fn fit_trains_all_three_models() {
        let train = frame(40);
        let mut trainer = QuantileTrainer::new(0.85);
        trainer.fit(&train).unwrap();
        assert!(trainer.lower.is_some());
        assert!(trainer.upper.is_some());
        assert!(trainer.point.is_some());
    }
}
