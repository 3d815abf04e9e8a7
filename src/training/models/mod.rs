pub mod baseline;
pub mod gradient_boosting;
pub mod quantile;
pub mod random_forest;

use std::collections::HashMap;

use anyhow::Result;
use polars::prelude::*;

/// Frozen feature-vector ordering shared by every trainer (§4.8). Changing
/// the order is a breaking change for any persisted model artifact.
pub const FEATURE_COLUMNS: [&str; 15] = [
    "open",
    "high",
    "low",
    "close",
    "volume",
    "return_1",
    "return_5",
    "rolling_mean_10",
    "rolling_std_10",
    "volume_ma_10",
    "high_low_spread",
    "momentum_10",
    "ema_20",
    "is_gap_up",
    "is_gap_down",
];

#[derive(Debug, Clone)]
pub struct TrainOutput {
    pub model_name: String,
    pub metrics: HashMap<String, f64>,
    pub artifact: HashMap<String, String>,
}

/// Extracts `FEATURE_COLUMNS` (null-filled to 0.0) and the `close` target
/// from a silver-layer frame, in the frozen column order.
pub fn build_xy(df: &DataFrame) -> Result<(Vec<Vec<f64>>, Vec<f64>)> {
    let n = df.height();
    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(FEATURE_COLUMNS.len());
    for name in FEATURE_COLUMNS {
        let series = df.column(name)?.cast(&DataType::Float64)?;
        let f64_chunked = series.f64()?;
        columns.push(f64_chunked.into_iter().map(|v| v.unwrap_or(0.0)).collect());
    }

    let close = df.column("close")?.cast(&DataType::Float64)?;
    let y: Vec<f64> = close.f64()?.into_iter().map(|v| v.unwrap_or(0.0)).collect();

    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        rows.push(columns.iter().map(|c| c[i]).collect());
    }
    Ok((rows, y))
}

/// Shared evaluation logic: MAE, RMSE, MAPE, directional accuracy (§4.8,
/// grounded on the source's `ModelTrainer.evaluate`).
pub fn evaluate(actuals: &[f64], predictions: &[f64]) -> HashMap<String, f64> {
    let n = actuals.len().min(predictions.len());
    let errors: Vec<f64> = (0..n).map(|i| predictions[i] - actuals[i]).collect();

    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n as f64;
    let rmse = (errors.iter().map(|e| e.powi(2)).sum::<f64>() / n as f64).sqrt();
    let mape = errors
        .iter()
        .zip(actuals)
        .map(|(e, a)| (e / a.abs().max(1e-8)).abs())
        .sum::<f64>()
        / n as f64
        * 100.0;

    let sign = |d: f64| if d == 0.0 { 0.0 } else { d.signum() };
    let directional = if n >= 2 {
        let mut matches = 0usize;
        for i in 1..n {
            let pred_sign = sign(predictions[i] - predictions[i - 1]);
            let actual_sign = sign(actuals[i] - actuals[i - 1]);
            if pred_sign == actual_sign {
                matches += 1;
            }
        }
        matches as f64 / (n - 1) as f64 * 100.0
    } else {
        0.0
    };

    HashMap::from([
        ("mae".to_string(), mae),
        ("rmse".to_string(), rmse),
        ("mape".to_string(), mape),
        ("directional_accuracy".to_string(), directional),
    ])
}

/// Common trainer contract: fit on a train frame, predict on a test frame,
/// evaluate against the test frame's `close` column.
pub trait ModelTrainer {
    fn name(&self) -> &'static str;
    fn fit(&mut self, train_df: &DataFrame) -> Result<()>;
    fn predict(&self, test_df: &DataFrame) -> Result<Vec<f64>>;

    fn artifact_metadata(&self) -> HashMap<String, String> {
        HashMap::from([("trainer".to_string(), self.name().to_string())])
    }

    fn train_and_score(&mut self, train_df: &DataFrame, test_df: &DataFrame) -> Result<TrainOutput> {
        self.fit(train_df)?;
        let predictions = self.predict(test_df)?;
        let (_, actuals) = build_xy(test_df)?;
        let metrics = evaluate(&actuals, &predictions);
        Ok(TrainOutput {
            model_name: self.name().to_string(),
            metrics,
            artifact: self.artifact_metadata(),
        })
    }
}
