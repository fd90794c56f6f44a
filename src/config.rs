//! Top-level settings, loadable from a JSON file.
//!
//! Every field has a default, so `{}` is a valid configuration file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::selector::SelectorConfig;
use crate::starcatalog::CatalogConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkyguideConfig {
    pub catalog: CatalogConfig,
    pub selector: SelectorConfig,
    /// JSON-lines file receiving one record per successful selection.
    /// Default: None (records are kept in memory only)
    pub observation_log: Option<PathBuf>,
}

impl SkyguideConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::SelectionStrategy;
    use std::io::Write;

    #[test]
    fn empty_object_gives_defaults() {
        let config = SkyguideConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SkyguideConfig::default());
        assert_eq!(config.selector.altitude_threshold_deg, 45.0);
        assert_eq!(config.catalog.max_magnitude, Some(5.0));
        assert!(config.observation_log.is_none());
    }

    #[test]
    fn partial_override() {
        let config = SkyguideConfig::from_json_str(
            r#"{
                "selector": { "altitude_threshold_deg": 30.0, "strategy": { "kind": "random", "seed": 42 } },
                "catalog": { "max_magnitude": null }
            }"#,
        )
        .unwrap();
        assert_eq!(config.selector.altitude_threshold_deg, 30.0);
        assert_eq!(config.selector.strategy, SelectionStrategy::Random { seed: Some(42) });
        assert_eq!(config.catalog.max_magnitude, None);
        assert_eq!(config.catalog.proper_motion_epoch_year, None);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"observation_log": "/tmp/skyguide.jsonl"}}"#).unwrap();
        let config = SkyguideConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.observation_log, Some(PathBuf::from("/tmp/skyguide.jsonl")));
    }

    #[test]
    fn reports_missing_file_and_bad_json() {
        assert!(SkyguideConfig::from_json_file("no/such/config.json").is_err());
        assert!(SkyguideConfig::from_json_str("{\"selector\": 3}").is_err());
    }
}
