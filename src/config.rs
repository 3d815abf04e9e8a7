//! Typed runtime configuration, assembled from environment variables with
//! defaults and validated with `garde` at construction time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use garde::Validate;

/// Supported candle timeframes and their length in minutes.
pub fn timeframe_minutes() -> HashMap<&'static str, i64> {
    HashMap::from([
        ("1m", 1),
        ("5m", 5),
        ("15m", 15),
        ("30m", 30),
        ("1h", 60),
        ("4h", 240),
        ("1d", 1440),
        ("5d", 1440),
        ("1wk", 10_080),
        ("1mo", 43_200),
        ("3mo", 129_600),
    ])
}

#[derive(Debug, Clone, Validate)]
pub struct DataPipelineConfig {
    #[garde(skip)]
    pub data_root: PathBuf,
    #[garde(length(min = 1))]
    pub timezone: String,
    #[garde(length(min = 1))]
    pub dataset_namespace: String,
}

impl DataPipelineConfig {
    pub fn new(data_root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let cfg = Self {
            data_root: data_root.into(),
            timezone: "Asia/Kolkata".to_string(),
            dataset_namespace: "v1".to_string(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn raw_root(&self) -> PathBuf {
        self.data_root.join("raw")
    }

    pub fn bronze_root(&self) -> PathBuf {
        self.data_root.join("bronze")
    }

    pub fn silver_root(&self) -> PathBuf {
        self.data_root.join("silver")
    }

    pub fn experiments_root(&self) -> PathBuf {
        self.data_root.join("experiments")
    }

    pub fn registry_path(&self) -> PathBuf {
        self.data_root.join("registry.json")
    }
}

#[derive(Debug, Clone, Validate)]
pub struct TrainingConfig {
    #[garde(range(min = 1))]
    pub walk_forward_splits: usize,
    #[garde(range(min = 1))]
    pub min_rows: usize,
    #[garde(skip)]
    pub model_params: ModelHyperparameters,
}

#[derive(Debug, Clone)]
pub struct ModelHyperparameters {
    pub random_forest_n_estimators: usize,
    pub random_forest_max_depth: usize,
    pub gradient_boosting_n_estimators: usize,
    pub gradient_boosting_learning_rate: f64,
    pub quantile_alpha: f64,
}

impl Default for ModelHyperparameters {
    fn default() -> Self {
        Self {
            random_forest_n_estimators: 300,
            random_forest_max_depth: 6,
            gradient_boosting_n_estimators: 250,
            gradient_boosting_learning_rate: 0.05,
            quantile_alpha: 0.85,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            walk_forward_splits: 5,
            min_rows: 200,
            model_params: ModelHyperparameters::default(),
        }
    }
}

impl TrainingConfig {
    pub fn validated(self) -> anyhow::Result<Self> {
        self.validate()?;
        Ok(self)
    }
}

/// Indian-equity transaction cost rates (§4.12).
#[derive(Debug, Clone, Copy)]
pub struct CostRates {
    pub brokerage_rate: f64,
    pub min_brokerage: f64,
    pub stt_rate: f64,
    pub gst_rate: f64,
    pub exchange_rate: f64,
    pub sebi_rate: f64,
    pub stamp_duty_rate: f64,
}

impl Default for CostRates {
    fn default() -> Self {
        Self {
            brokerage_rate: 0.0003,
            min_brokerage: 20.0,
            stt_rate: 0.000_125,
            gst_rate: 0.18,
            exchange_rate: 0.000_003,
            sebi_rate: 0.000_001,
            stamp_duty_rate: 0.00003,
        }
    }
}

/// Slippage model parameters (§4.13). The source's `volatility_factor`
/// constructor argument is accepted but never multiplied into the
/// volatility term (it only scales `market_impact`); this struct keeps a
/// single `impact_factor` for that role and drops the dead parameter
/// (see DESIGN.md).
#[derive(Debug, Clone, Copy)]
pub struct SlippageRates {
    pub base_slippage_bps: f64,
    pub impact_factor: f64,
    pub limit_order_multiplier: f64,
    pub wrong_side_multiplier: f64,
    pub sell_multiplier: f64,
    pub impact_cap_bps: f64,
    pub missing_volume_impact_bps: f64,
}

impl Default for SlippageRates {
    fn default() -> Self {
        Self {
            base_slippage_bps: 5.0,
            impact_factor: 0.5,
            limit_order_multiplier: 0.3,
            wrong_side_multiplier: 0.5,
            sell_multiplier: 1.1,
            impact_cap_bps: 200.0,
            missing_volume_impact_bps: 50.0,
        }
    }
}

/// Top-level configuration bundle passed through construction to every
/// component rather than read from process-wide globals.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub data: DataPipelineConfig,
    pub training: TrainingConfig,
    pub cost: CostRates,
    pub slippage: SlippageRates,
    pub risk_free_rate: f64,
    /// Minimum candles a walk-forward test window must hold before the
    /// orchestrator trusts its predictions (§4.9); shorter splits are
    /// skipped with a warning rather than scored.
    pub min_candles_for_prediction: usize,
    pub default_horizon_minutes: i64,
}

impl CoreConfig {
    pub fn new(data_root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        Ok(Self {
            data: DataPipelineConfig::new(data_root)?,
            training: TrainingConfig::default().validated()?,
            cost: CostRates::default(),
            slippage: SlippageRates::default(),
            risk_free_rate: 0.06,
            min_candles_for_prediction: 50,
            default_horizon_minutes: 180,
        })
    }

    /// Reads overrides from the environment (`DATA_ROOT`, `DATASET_NAMESPACE`,
    /// `RISK_FREE_RATE`) the way the teacher's `from_env` constructors do,
    /// falling back to `./data` when unset.
    pub fn from_env() -> anyhow::Result<Self> {
        let data_root = std::env::var("DATA_ROOT").unwrap_or_else(|_| "data".to_string());
        let mut cfg = Self::new(Path::new(&data_root))?;
        if let Ok(ns) = std::env::var("DATASET_NAMESPACE") {
            cfg.data.dataset_namespace = ns;
        }
        if let Ok(rf) = std::env::var("RISK_FREE_RATE") {
            cfg.risk_free_rate = rf.parse().unwrap_or(cfg.risk_free_rate);
        }
        cfg.data.validate()?;
        Ok(cfg)
    }

    /// Derives the walk-forward forecast horizon (in candles) for `timeframe`
    /// from `default_horizon_minutes` (§4.9), e.g. 180 minutes on a 5-minute
    /// timeframe yields a 36-candle horizon. Unknown timeframes fall back to
    /// a 1-minute length. Always at least 1.
    pub fn forecast_horizon(&self, timeframe: &str) -> usize {
        let minutes = *timeframe_minutes().get(timeframe).unwrap_or(&1);
        ((self.default_horizon_minutes / minutes.max(1)) as usize).max(1)
    }
}

/// Installs the `tracing` subscriber used across binaries/tests that embed
/// this crate, honouring `RUST_LOG` the way the teacher's `main.rs` does.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
