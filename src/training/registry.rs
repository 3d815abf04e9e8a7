//! JSON-on-disk experiment registry (§4.10), grounded on the source's
//! `ExperimentRegistry`: one file per experiment, atomic write-temp+rename
//! (§9 correctness fix — the source writes directly without atomicity).

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub experiment_id: String,
    pub symbol: String,
    pub timeframe: String,
    pub families: Vec<String>,
    pub metrics: HashMap<String, HashMap<String, f64>>,
    pub artifacts: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

pub struct ExperimentRegistry {
    root: PathBuf,
}

impl ExperimentRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).with_context(|| format!("creating {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn log(&self, record: &ExperimentRecord) -> Result<PathBuf> {
        let final_path = self.root.join(format!("{}.json", record.experiment_id));
        let tmp_path = self.root.join(format!("{}.json.tmp", record.experiment_id));
        let contents = serde_json::to_string_pretty(record)?;
        std::fs::write(&tmp_path, contents)
            .with_context(|| format!("writing temp experiment {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &final_path).with_context(|| {
            format!(
                "renaming {} to {}",
                tmp_path.display(),
                final_path.display()
            )
        })?;
        Ok(final_path)
    }

    pub fn list(&self) -> Result<Vec<ExperimentRecord>> {
        let mut records = Vec::new();
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.root)
            .with_context(|| format!("reading {}", self.root.display()))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        paths.sort();
        for path in paths {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            records.push(serde_json::from_str(&contents)?);
        }
        Ok(records)
    }

    /// Returns the record whose family achieved the lowest `rmse` for
    /// `symbol`/`timeframe`, across all logged experiments.
    pub fn find_best(&self, symbol: &str, timeframe: &str) -> Result<Option<ExperimentRecord>> {
        let mut best: Option<(f64, ExperimentRecord)> = None;
        for record in self.list()? {
            if record.symbol != symbol || record.timeframe != timeframe {
                continue;
            }
            for metrics in record.metrics.values() {
                if let Some(&rmse) = metrics.get("rmse") {
                    let better = best.as_ref().map(|(b, _)| rmse < *b).unwrap_or(true);
                    if better {
                        best = Some((rmse, record.clone()));
                    }
                }
            }
        }
        Ok(best.map(|(_, r)| r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, rmse: f64) -> ExperimentRecord {
        let mut metrics = HashMap::new();
        metrics.insert("baseline".to_string(), HashMap::from([("rmse".to_string(), rmse)]));
        ExperimentRecord {
            experiment_id: id.to_string(),
            symbol: "RELIANCE.NS".to_string(),
            timeframe: "5m".to_string(),
            families: vec!["baseline".to_string()],
            metrics,
            artifacts: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn log_then_list_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = ExperimentRegistry::new(tmp.path()).unwrap();
        registry.log(&record("exp-1", 1.0)).unwrap();
        let records = registry.list().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].experiment_id, "exp-1");
    }

    #[test]
    fn find_best_picks_lowest_rmse() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = ExperimentRegistry::new(tmp.path()).unwrap();
        registry.log(&record("exp-1", 5.0)).unwrap();
        registry.log(&record("exp-2", 2.0)).unwrap();
        let best = registry.find_best("RELIANCE.NS", "5m").unwrap().unwrap();
        assert_eq!(best.experiment_id, "exp-2");
    }

    #[test]
    fn find_best_returns_none_for_unknown_symbol() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = ExperimentRegistry::new(tmp.path()).unwrap();
        registry.log(&record("exp-1", 5.0)).unwrap();
        assert!(registry.find_best("NOPE.NS", "5m").unwrap().is_none());
    }
}
