//! Random forest trainer over the frozen feature vector (§4.8).

use anyhow::Result;
use polars::prelude::*;

use crate::training::tree::RandomForestRegressor;

use super::{build_xy, ModelTrainer};

pub struct RandomForestTrainer {
    n_estimators: usize,
    max_depth: usize,
    model: Option<RandomForestRegressor>,
}

impl RandomForestTrainer {
    pub fn new(n_estimators: usize, max_depth: usize) -> Self {
        Self {
            n_estimators,
            max_depth,
            model: None,
        }
    }
}

impl ModelTrainer for RandomForestTrainer {
    fn name(&self) -> &'static str {
        "random_forest"
    }

    fn fit(&mut self, train_df: &DataFrame) -> Result<()> {
        let (x, y) = build_xy(train_df)?;
        let mut model = RandomForestRegressor::new(self.n_estimators, self.max_depth);
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
        let close: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
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
    fn fits_and_predicts_without_panicking() {
        let train = frame(40);
        let test = frame(10);
        let mut trainer = RandomForestTrainer::new(20, 4);
        trainer.fit(&train).unwrap();
        let preds = trainer.predict(&test).unwrap();
        assert_eq!(preds.len(), 10);
    }
}
