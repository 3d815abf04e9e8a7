//! Gradient-boosted tree trainer over the frozen feature vector (§4.8).

use anyhow::Result;
use polars::prelude::*;

use crate::training::tree::GradientBoostingRegressor;

use super::{build_xy, ModelTrainer};

pub struct GradientBoostingTrainer {
    n_estimators: usize,
    learning_rate: f64,
    model: Option<GradientBoostingRegressor>,
}

impl GradientBoostingTrainer {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            model: None,
        }
    }
}

impl ModelTrainer for GradientBoostingTrainer {
    fn name(&self) -> &'static str {
        "gradient_boosting"
    }

    fn fit(&mut self, train_df: &DataFrame) -> Result<()> {
        let (x, y) = build_xy(train_df)?;
        let mut model = GradientBoostingRegressor::new(self.n_estimators, self.learning_rate, 3, None);
        model.fit(&x, &y);
        self.model = Some(model);
        Ok(())
    }

    fn predict(&self, test_df: &DataFrame) -> Result<Vec<f64>> {
        let (x, _) = build_xy(test_df)?;
        Ok(self.model.as_ref().map(|m| m.predict(&x)).unwrap_or_default())
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
    fn fits_and_predicts_with_low_error_on_smooth_series() {
        let train = frame(60);
        let mut trainer = GradientBoostingTrainer::new(100, 0.1);
        trainer.fit(&train).unwrap();
        let preds = trainer.predict(&train).unwrap();
        let (_, actuals) = build_xy(&train).unwrap();
        let mae: f64 = preds.iter().zip(&actuals).map(|(p, a)| (p - a).abs()).sum::<f64>() / preds.len() as f64;
        assert!(mae < 5.0, "mae too high: {mae}");
    }
}
