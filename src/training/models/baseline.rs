//! Persistence/moving-average baseline trainer (§4.8).

use anyhow::Result;
use polars::prelude::*;

use super::{build_xy, ModelTrainer};

pub struct BaselineTrainer {
    mean_close: f64,
}

impl Default for BaselineTrainer {
    fn default() -> Self {
        Self { mean_close: 0.0 }
    }
}

impl ModelTrainer for BaselineTrainer {
    fn name(&self) -> &'static str {
        "baseline"
    }

    fn fit(&mut self, train_df: &DataFrame) -> Result<()> {
        let (_, y) = build_xy(train_df)?;
        self.mean_close = if y.is_empty() {
            0.0
        } else {
            y.iter().sum::<f64>() / y.len() as f64
        };
        Ok(())
    }

    fn predict(&self, test_df: &DataFrame) -> Result<Vec<f64>> {
        Ok(vec![self.mean_close; test_df.height()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicts_flat_mean_of_training_close() {
        let train = df! { "open" => &[1.0, 1.0], "high" => &[1.0,1.0], "low" => &[1.0,1.0],
            "close" => &[100.0, 110.0], "volume" => &[1.0,1.0], "return_1" => &[0.0,0.0],
            "return_5" => &[0.0,0.0], "rolling_mean_10" => &[0.0,0.0], "rolling_std_10" => &[0.0,0.0],
            "volume_ma_10" => &[0.0,0.0], "high_low_spread" => &[0.0,0.0], "momentum_10" => &[0.0,0.0],
            "ema_20" => &[0.0,0.0], "is_gap_up" => &[0i32,0], "is_gap_down" => &[0i32,0] }
        .unwrap();
        let mut trainer = BaselineTrainer::default();
        trainer.fit(&train).unwrap();
        let preds = trainer.predict(&train).unwrap();
        assert_eq!(preds, vec![105.0, 105.0]);
    }
}
