//! Optional JSON configuration. Every section falls back to its defaults.

use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::index::IndexOptions;
use crate::normalize::{NormalizationTable, Normalizer};
use crate::resolver::MatchOptions;
use crate::scoring::ScoringConfig;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Extra folds on top of the built-in table, e.g. `{"ł": "l"}`.
    pub extra_folds: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub normalization: NormalizationConfig,
    pub index: IndexOptions,
    pub scoring: ScoringConfig,
    pub matching: MatchOptions,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.scoring.validate()?;
        self.matching.validate()?;
        self.normalizer()?;
        Ok(())
    }

    fn fold_pairs(&self) -> Result<Vec<(char, String)>> {
        self.normalization
            .extra_folds
            .iter()
            .map(|(from, to)| {
                let mut chars = from.chars();
                let (Some(c), None) = (chars.next(), chars.next()) else {
                    return Err(Error::InvalidConfig(format!(
                        "fold source must be a single character, got {from:?}"
                    )));
                };
                // Replacements must already be in normalized form
                if !to.chars().all(|r| r.is_ascii_alphanumeric()) {
                    return Err(Error::InvalidConfig(format!(
                        "fold replacement for {from:?} must be ASCII letters or digits, got {to:?}"
                    )));
                }
                Ok((c, to.clone()))
            })
            .collect()
    }

    /// The normalizer for this configuration: default folds plus extras.
    pub fn normalizer(&self) -> Result<Normalizer> {
        let table = NormalizationTable::default().extended(self.fold_pairs()?)?;
        Ok(Normalizer::new(table))
    }
}
