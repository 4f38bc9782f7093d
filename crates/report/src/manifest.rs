use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use common::{Error, Result};

/// Name of the manifest file inside the artifacts directory.
pub const MANIFEST_FILE: &str = "reports-info.json";
/// Report synthesized from the artifacts of the running commit.
pub const CURRENT: &str = "Current";
/// Report used as the comparison baseline when present.
pub const PREVIOUS: &str = "Previous";
/// Subdirectory of the artifacts root holding the current run's results.
pub const CURRENT_DIR: &str = "current";

/// One report location for one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportManifestEntry {
    pub exchange: String,
    /// "Current", "Previous" or any historical label.
    pub report_name: String,
    pub source_sha: String,
    /// Directory containing `<exchange>/<currency>/<strategy>/ci-results-*`.
    pub source_path: PathBuf,
}

/// Manifest file shape: exchange → report label → location.
#[derive(Debug, Deserialize)]
struct RawEntry {
    sha: String,
    path: PathBuf,
}

/// Parsed `reports-info.json` plus the synthesized "Current" entries.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    /// Entries per exchange, sorted by report name.
    exchanges: BTreeMap<String, Vec<ReportManifestEntry>>,
}

impl Manifest {
    /// Read `<artifacts_root>/reports-info.json` and add a "Current" report for
    /// every exchange, pointing at `<artifacts_root>/current`.
    pub fn load(artifacts_root: &Path, current_sha: &str) -> Result<Self> {
        if !artifacts_root.is_dir() {
            return Err(Error::Config(format!(
                "The directory where artifacts should have been extracted, {}, does not exist",
                artifacts_root.display()
            )));
        }
        let path = artifacts_root.join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(Error::Config(format!("The {}, does not exist", path.display())));
        }
        let text = std::fs::read_to_string(&path)?;
        Self::from_json(&text, artifacts_root, current_sha)
    }

    pub fn from_json(text: &str, artifacts_root: &Path, current_sha: &str) -> Result<Self> {
        let raw: BTreeMap<String, BTreeMap<String, RawEntry>> = serde_json::from_str(text)?;

        let mut exchanges = BTreeMap::new();
        for (exchange, reports) in raw {
            let mut entries: Vec<ReportManifestEntry> = reports
                .into_iter()
                .filter(|(name, _)| name != CURRENT)
                .map(|(name, entry)| ReportManifestEntry {
                    exchange: exchange.clone(),
                    report_name: name,
                    source_sha: entry.sha,
                    source_path: entry.path,
                })
                .collect();
            entries.push(ReportManifestEntry {
                exchange: exchange.clone(),
                report_name: CURRENT.to_string(),
                source_sha: current_sha.to_string(),
                source_path: artifacts_root.join(CURRENT_DIR),
            });
            entries.sort_by(|a, b| a.report_name.cmp(&b.report_name));
            exchanges.insert(exchange, entries);
        }
        Ok(Manifest { exchanges })
    }

    /// Exchanges in ascending order.
    pub fn exchanges(&self) -> impl Iterator<Item = &str> {
        self.exchanges.keys().map(String::as_str)
    }

    /// Reports declared for `exchange`, sorted by name.
    pub fn reports(&self, exchange: &str) -> &[ReportManifestEntry] {
        self.exchanges.get(exchange).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ReportManifestEntry])> {
        self.exchanges
            .iter()
            .map(|(exchange, entries)| (exchange.as_str(), entries.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "binance": {
            "Previous": {"sha": "aaa", "path": "/reports/previous"},
            "2022-01": {"sha": "bbb", "path": "/reports/2022-01"}
        },
        "kucoin": {
            "Previous": {"sha": "ccc", "path": "/reports/kucoin-previous"}
        }
    }"#;

    #[test]
    fn current_is_synthesized_for_every_exchange() {
        let manifest = Manifest::from_json(MANIFEST, Path::new("/artifacts"), "head").unwrap();
        for exchange in ["binance", "kucoin"] {
            let current = manifest
                .reports(exchange)
                .iter()
                .find(|e| e.report_name == CURRENT)
                .unwrap();
            assert_eq!(current.source_sha, "head");
            assert_eq!(current.source_path, PathBuf::from("/artifacts/current"));
            assert_eq!(current.exchange, exchange);
        }
    }

    #[test]
    fn reports_are_sorted_by_name() {
        let manifest = Manifest::from_json(MANIFEST, Path::new("/artifacts"), "head").unwrap();
        let names: Vec<_> = manifest
            .reports("binance")
            .iter()
            .map(|e| e.report_name.as_str())
            .collect();
        assert_eq!(names, vec!["2022-01", "Current", "Previous"]);
    }

    #[test]
    fn declared_current_is_replaced() {
        let text = r#"{"binance": {"Current": {"sha": "stale", "path": "/old"}}}"#;
        let manifest = Manifest::from_json(text, Path::new("/artifacts"), "head").unwrap();
        assert_eq!(manifest.reports("binance").len(), 1);
        assert_eq!(manifest.reports("binance")[0].source_sha, "head");
    }

    #[test]
    fn missing_artifacts_dir_is_config_error() {
        let err = Manifest::load(Path::new("/definitely/not/here"), "head").unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("does not exist")));
    }

    #[test]
    fn missing_manifest_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Manifest::load(dir.path(), "head").unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains(MANIFEST_FILE)));
    }

    #[test]
    fn unknown_exchange_has_no_reports() {
        let manifest = Manifest::from_json(MANIFEST, Path::new("/artifacts"), "head").unwrap();
        assert!(manifest.reports("kraken").is_empty());
    }
}
