//! Mints `(namespace, symbol_safe, timeframe, run_id)` identifiers (§4.4).

use chrono::Utc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetVersion {
    pub namespace: String,
    pub symbol_safe: String,
    pub timeframe: String,
    pub run_id: String,
}

impl DatasetVersion {
    pub fn version_string(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.namespace, self.symbol_safe, self.timeframe, self.run_id
        )
    }
}

pub fn safe_symbol(symbol: &str) -> String {
    symbol.replace('.', "_")
}

/// Builds a `DatasetVersion`. If `run_id` is omitted, mints
/// `strftime("%Y%m%dT%H%M%S")` in UTC. Two invocations within the same
/// second for the same symbol/timeframe may legitimately collide at this
/// granularity (§4.4); callers needing finer resolution must pass an
/// explicit `run_id`, optionally disambiguated by an appended monotonic
/// suffix (§9).
pub fn build_version(
    symbol: &str,
    timeframe: &str,
    explicit_namespace: Option<&str>,
    run_id: Option<String>,
    default_namespace: &str,
) -> DatasetVersion {
    let namespace = explicit_namespace.unwrap_or(default_namespace).to_string();
    let run_id = run_id.unwrap_or_else(|| Utc::now().format("%Y%m%dT%H%M%S").to_string());
    DatasetVersion {
        namespace,
        symbol_safe: safe_symbol(symbol),
        timeframe: timeframe.to_string(),
        run_id,
    }
}

/// Appends a monotonic disambiguator to a `run_id`, for callers that mint
/// multiple versions for the same symbol/timeframe within one second (§9).
pub fn disambiguate_run_id(run_id: &str, suffix: u32) -> String {
    format!("{run_id}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_symbol_replaces_dots() {
        assert_eq!(safe_symbol("RELIANCE.NS"), "RELIANCE_NS");
    }

    #[test]
    fn version_string_format() {
        let v = DatasetVersion {
            namespace: "v1".to_string(),
            symbol_safe: "RELIANCE_NS".to_string(),
            timeframe: "5m".to_string(),
            run_id: "20251105T091500".to_string(),
        };
        assert_eq!(v.version_string(), "v1-RELIANCE_NS-5m-20251105T091500");
    }

    #[test]
    fn build_version_uses_default_namespace_and_mints_run_id() {
        let v = build_version("RELIANCE.NS", "5m", None, None, "v1");
        assert_eq!(v.namespace, "v1");
        assert_eq!(v.symbol_safe, "RELIANCE_NS");
        assert_eq!(v.run_id.len(), "20251105T091500".len());
    }

    #[test]
    fn build_version_honours_explicit_run_id() {
        let v = build_version(
            "RELIANCE.NS",
            "5m",
            Some("experiment"),
            Some("20251105T091500".to_string()),
            "v1",
        );
        assert_eq!(v.namespace, "experiment");
        assert_eq!(v.run_id, "20251105T091500");
    }
}
