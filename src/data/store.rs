//! Persists and retrieves layered, versioned columnar frames (§4.3, §6).

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use polars::prelude::*;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Raw,
    Bronze,
    Silver,
}

impl Layer {
    pub fn as_str(self) -> &'static str {
        match self {
            Layer::Raw => "raw",
            Layer::Bronze => "bronze",
            Layer::Silver => "silver",
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Layer::Raw => "raw",
            Layer::Bronze => "bronze",
            Layer::Silver => "silver",
        }
    }

    pub fn parse(layer: &str) -> Result<Self, CoreError> {
        match layer {
            "raw" => Ok(Layer::Raw),
            "bronze" => Ok(Layer::Bronze),
            "silver" => Ok(Layer::Silver),
            other => Err(CoreError::UnsupportedLayer {
                layer: other.to_string(),
            }),
        }
    }
}

pub struct ParquetStore {
    root: PathBuf,
}

impl ParquetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn layer_root(&self, layer: Layer) -> PathBuf {
        self.root.join(layer.as_str())
    }

    fn dir_for(&self, layer: Layer, namespace: &str, symbol_safe: &str, timeframe: &str) -> PathBuf {
        self.layer_root(layer)
            .join(namespace)
            .join(symbol_safe)
            .join(timeframe)
    }

    fn filename(symbol_safe: &str, timeframe: &str, run_id: &str, suffix: &str) -> String {
        format!("{symbol_safe}_{timeframe}_{run_id}_{suffix}.parquet")
    }

    /// Writes atomically (write-temp + rename) under
    /// `<root>/<layer>/<namespace>/<symbol_safe>/<timeframe>/<file>` (§4.3, §6).
    /// Refuses to silently clobber an existing file for the same identity
    /// (§9's timestamp-collision note).
    pub fn write(
        &self,
        frame: &mut DataFrame,
        layer: Layer,
        symbol_safe: &str,
        timeframe: &str,
        namespace: &str,
        run_id: &str,
    ) -> Result<PathBuf> {
        let dir = self.dir_for(layer, namespace, symbol_safe, timeframe);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating directory {}", dir.display()))?;

        let filename = Self::filename(symbol_safe, timeframe, run_id, layer.suffix());
        let final_path = dir.join(&filename);
        if final_path.exists() {
            return Err(CoreError::VersionCollision {
                path: final_path.display().to_string(),
            }
            .into());
        }

        let tmp_path = dir.join(format!("{filename}.tmp"));
        {
            let file = File::create(&tmp_path)
                .with_context(|| format!("creating temp file {}", tmp_path.display()))?;
            ParquetWriter::new(file)
                .finish(frame)
                .with_context(|| format!("writing parquet to {}", tmp_path.display()))?;
        }
        std::fs::rename(&tmp_path, &final_path).with_context(|| {
            format!(
                "renaming {} to {}",
                tmp_path.display(),
                final_path.display()
            )
        })?;
        Ok(final_path)
    }

    /// Returns the newest file lexicographically (run_ids sort
    /// chronologically by construction), or the file whose name contains
    /// `run_id` as a substring if supplied. Returns `Ok(None)` when the
    /// directory is absent; never fails for a missing directory (§4.3).
    pub fn read_latest(
        &self,
        layer: Layer,
        symbol_safe: &str,
        timeframe: &str,
        namespace: &str,
        run_id: Option<&str>,
    ) -> Result<Option<DataFrame>> {
        let dir = self.dir_for(layer, namespace, symbol_safe, timeframe);
        if !dir.exists() {
            return Ok(None);
        }
        let mut files = list_parquet_files(&dir)?;
        files.sort();

        let chosen = if let Some(run_id) = run_id {
            files
                .iter()
                .rev()
                .find(|f| f.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.contains(run_id)))
                .cloned()
        } else {
            files.last().cloned()
        };

        match chosen {
            None => Ok(None),
            Some(path) => {
                let df = LazyFrame::scan_parquet(
                    path.to_string_lossy().as_ref().into(),
                    ScanArgsParquet::default(),
                )?
                .collect()
                .with_context(|| format!("reading parquet from {}", path.display()))?;
                Ok(Some(df))
            }
        }
    }

    /// Returns the run_id component of each file for this identity, in
    /// lexical (chronological) order.
    pub fn list_runs(
        &self,
        layer: Layer,
        symbol_safe: &str,
        timeframe: &str,
        namespace: &str,
    ) -> Result<Vec<String>> {
        let dir = self.dir_for(layer, namespace, symbol_safe, timeframe);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = list_parquet_files(&dir)?;
        files.sort();
        let suffix = layer.suffix();
        Ok(files
            .iter()
            .filter_map(|path| {
                let stem = path.file_stem()?.to_str()?;
                let marker = format!("_{suffix}");
                let without_suffix = stem.strip_suffix(&marker)?;
                let parts: Vec<&str> = without_suffix.rsplitn(2, '_').collect();
                parts.first().map(|s| s.to_string())
            })
            .collect())
    }
}

fn list_parquet_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading dir {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("parquet") {
            out.push(path);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> DataFrame {
        df! {
            "start_ts" => &[1i64, 2, 3],
            "close" => &[100.0, 101.0, 102.0],
        }
        .unwrap()
    }

    #[test]
    fn write_then_read_latest_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(tmp.path());
        let mut frame = sample_frame();
        store
            .write(&mut frame, Layer::Silver, "RELIANCE_NS", "5m", "v1", "20251105T091500")
            .unwrap();

        let read = store
            .read_latest(Layer::Silver, "RELIANCE_NS", "5m", "v1", None)
            .unwrap()
            .unwrap();
        assert_eq!(read.height(), 3);
    }

    #[test]
    fn read_latest_missing_directory_returns_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(tmp.path());
        let result = store
            .read_latest(Layer::Silver, "NOPE", "5m", "v1", None)
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn read_latest_picks_newest_run() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(tmp.path());
        store
            .write(&mut sample_frame(), Layer::Silver, "SYM", "5m", "v1", "20250101T000000")
            .unwrap();
        store
            .write(&mut sample_frame(), Layer::Silver, "SYM", "5m", "v1", "20250102T000000")
            .unwrap();

        let runs = store.list_runs(Layer::Silver, "SYM", "5m", "v1").unwrap();
        assert_eq!(runs, vec!["20250101T000000", "20250102T000000"]);
    }

    #[test]
    fn read_latest_by_explicit_run_id() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(tmp.path());
        store
            .write(&mut sample_frame(), Layer::Silver, "SYM", "5m", "v1", "20250101T000000")
            .unwrap();
        store
            .write(&mut sample_frame(), Layer::Silver, "SYM", "5m", "v1", "20250102T000000")
            .unwrap();

        let df = store
            .read_latest(Layer::Silver, "SYM", "5m", "v1", Some("20250101T000000"))
            .unwrap()
            .unwrap();
        assert_eq!(df.height(), 3);
    }

    #[test]
    fn write_refuses_to_clobber_existing_run() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(tmp.path());
        store
            .write(&mut sample_frame(), Layer::Silver, "SYM", "5m", "v1", "20250101T000000")
            .unwrap();
        let result = store.write(
            &mut sample_frame(),
            Layer::Silver,
            "SYM",
            "5m",
            "v1",
            "20250101T000000",
        );
        assert!(result.is_err());
    }

    #[test]
    fn unsupported_layer_is_rejected() {
        assert!(Layer::parse("platinum").is_err());
    }
}
