use crate::error::{AggError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What the runner does when a post-aggregate divides by zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroDenominatorPolicy {
    /// Record `inf`/`NaN` as computed
    #[default]
    Propagate,
    /// Fail the run with `NonFinite`
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggConfig {
    /// Source tag whose aggregates are run
    #[serde(default = "default_source")]
    pub source: String,

    /// Use the chunked path for aggregates that support it
    #[serde(default)]
    pub chunked: bool,

    #[serde(default)]
    pub zero_denominator: ZeroDenominatorPolicy,
}

fn default_source() -> String {
    crate::aggs::xrootd::SOURCE_NAME.to_string()
}

impl Default for AggConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            chunked: false,
            zero_denominator: ZeroDenominatorPolicy::default(),
        }
    }
}

impl AggConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AggError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| AggError::Config(format!("Invalid config: {}", e)))
    }
}
