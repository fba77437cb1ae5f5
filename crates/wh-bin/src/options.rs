//! `whittle.toml` defaults.
//!
//! The file supplies defaults for the reduction flags; command-line
//! arguments always win. Unknown fields are ignored so the file format
//! can grow without breaking older binaries. A missing file is not an
//! error unless an explicit `--config` path was given.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use core_strategy::SplitFactor;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct FileConfig {
    #[serde(default)]
    pub reduce: ReduceDefaults,
}

/// Accepts `granularity = 2` as well as `granularity = "max"`.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(untagged)]
pub enum GranularityValue {
    Count(usize),
    Name(SplitFactorName),
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum SplitFactorName {
    Max,
}

impl GranularityValue {
    pub fn to_factor(self) -> Result<SplitFactor> {
        match self {
            GranularityValue::Count(n) if n >= 2 => Ok(SplitFactor::Finite(n)),
            GranularityValue::Count(n) => {
                anyhow::bail!("granularity must be at least 2, got {n}")
            }
            GranularityValue::Name(SplitFactorName::Max) => Ok(SplitFactor::Max),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ReduceDefaults {
    pub cache: Option<String>,
    pub split: Option<String>,
    pub granularity: Option<GranularityValue>,
    pub subset_iterator: Option<String>,
    pub complement_iterator: Option<String>,
    pub parallel: Option<bool>,
    pub jobs: Option<usize>,
    pub atom: Option<String>,
}

/// Load the configuration file. With `path` set, the file must exist and
/// parse; otherwise `whittle.toml` in the working directory is used when
/// present and defaults apply when it is not.
pub fn load(path: Option<PathBuf>) -> Result<FileConfig> {
    let (path, required) = match path {
        Some(path) => (path, true),
        None => (PathBuf::from("whittle.toml"), false),
    };
    match fs::read_to_string(&path) {
        Ok(content) => {
            let config: FileConfig = toml::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            debug!(target: "reduce.config", file = %path.display(), "config loaded");
            Ok(config)
        }
        Err(err) if required => {
            Err(err).with_context(|| format!("reading {}", path.display()))
        }
        Err(_) => Ok(FileConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_file_is_an_error() {
        assert!(load(Some(PathBuf::from("/nonexistent/whittle.toml"))).is_err());
    }

    #[test]
    fn parses_reduce_table() {
        let config: FileConfig = toml::from_str(
            r#"
            [reduce]
            cache = "content"
            split = "balanced"
            granularity = 4
            parallel = true
            jobs = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.reduce.cache.as_deref(), Some("content"));
        assert_eq!(config.reduce.split.as_deref(), Some("balanced"));
        assert!(matches!(
            config.reduce.granularity,
            Some(GranularityValue::Count(4))
        ));
        assert_eq!(config.reduce.parallel, Some(true));
        assert_eq!(config.reduce.jobs, Some(2));
    }

    #[test]
    fn granularity_accepts_max_and_rejects_one() {
        let config: FileConfig = toml::from_str("[reduce]\ngranularity = \"max\"\n").unwrap();
        assert_eq!(
            config.reduce.granularity.unwrap().to_factor().unwrap(),
            SplitFactor::Max
        );
        let config: FileConfig = toml::from_str("[reduce]\ngranularity = 1\n").unwrap();
        assert!(config.reduce.granularity.unwrap().to_factor().is_err());
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let config: FileConfig =
            toml::from_str("[reduce]\nfuture_knob = \"x\"\n[other]\ny = 1\n").unwrap();
        assert!(config.reduce.cache.is_none());
    }
}
