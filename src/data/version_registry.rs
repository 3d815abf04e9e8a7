//! JSON-backed overrides pinning a dataset identity to a specific run_id
//! (§4.11). Explicitly constructed and passed by callers rather than a
//! process-wide singleton (§9).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub run_id: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegistryFile {
    entries: HashMap<String, RegistryEntry>,
}

pub struct VersionRegistry {
    path: PathBuf,
    file: RegistryFile,
}

fn registry_key(namespace: &str, symbol_safe: &str, timeframe: &str) -> String {
    format!("{namespace}/{symbol_safe}/{timeframe}")
}

impl VersionRegistry {
    /// Loads the registry from `path`. A missing file starts empty. A
    /// present-but-unparseable file is logged at `warn` and treated as empty
    /// rather than failing the caller (§4.11).
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "corrupt version registry, starting empty");
                    RegistryFile::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => RegistryFile::default(),
            Err(err) => {
                return Err(err).with_context(|| format!("reading registry {}", path.display()))
            }
        };
        Ok(Self { path, file })
    }

    pub fn get(&self, namespace: &str, symbol_safe: &str, timeframe: &str) -> Option<&str> {
        self.file
            .entries
            .get(&registry_key(namespace, symbol_safe, timeframe))
            .map(|e| e.run_id.as_str())
    }

    /// Pins `run_id` for the identity and persists atomically (write-temp +
    /// rename, §9).
    pub fn set(&mut self, namespace: &str, symbol_safe: &str, timeframe: &str, run_id: &str) -> Result<()> {
        self.file.entries.insert(
            registry_key(namespace, symbol_safe, timeframe),
            RegistryEntry {
                run_id: run_id.to_string(),
                updated_at: Utc::now(),
            },
        );
        self.save()
    }

    pub fn remove(&mut self, namespace: &str, symbol_safe: &str, timeframe: &str) -> Result<()> {
        self.file
            .entries
            .remove(&registry_key(namespace, symbol_safe, timeframe));
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        let tmp_path = tmp_path_for(&self.path);
        let contents = serde_json::to_string_pretty(&self.file)?;
        std::fs::write(&tmp_path, contents)
            .with_context(|| format!("writing temp registry {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "renaming {} to {}",
                tmp_path.display(),
                self.path.display()
            )
        })?;
        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "registry.json".to_string());
    name.push_str(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_starts_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = VersionRegistry::load(tmp.path().join("registry.json")).unwrap();
        assert!(registry.get("v1", "SYM", "5m").is_none());
    }

    #[test]
    fn set_then_get_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("registry.json");
        let mut registry = VersionRegistry::load(&path).unwrap();
        registry.set("v1", "SYM", "5m", "20251105T091500").unwrap();

        let reloaded = VersionRegistry::load(&path).unwrap();
        assert_eq!(reloaded.get("v1", "SYM", "5m"), Some("20251105T091500"));
    }

    #[test]
    fn corrupt_file_recovers_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("registry.json");
        std::fs::write(&path, "{not valid json").unwrap();
        let registry = VersionRegistry::load(&path).unwrap();
        assert!(registry.get("v1", "SYM", "5m").is_none());
    }

    #[test]
    fn remove_clears_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("registry.json");
        let mut registry = VersionRegistry::load(&path).unwrap();
        registry.set("v1", "SYM", "5m", "run-a").unwrap();
        registry.remove("v1", "SYM", "5m").unwrap();
        assert!(registry.get("v1", "SYM", "5m").is_none());
    }
}
