use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,
    pub busy_timeout_ms: Option<u64>,
    pub stage_timeout_secs: Option<u64>,

    // Feature configs
    pub validation: Option<ValidationConfig>,
    pub derivation: Option<DerivationFileConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ValidationConfig {
    /// Upper bound for a single purchase amount.
    pub max_amount: Option<f64>,
    /// Purchases timestamped before this date (`YYYY-MM-DD`) are rejected.
    pub min_valid_date: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct DerivationFileConfig {
    /// Ascending price boundaries for the tier bands.
    pub price_tier_thresholds: Option<Vec<f64>>,
    /// Reference year for product age categories. Defaults to the
    /// current year.
    pub reference_year: Option<i32>,
    pub segment_high_value_spend: Option<f64>,
    pub segment_high_value_purchases: Option<i64>,
    pub segment_regular_spend: Option<f64>,
    pub segment_regular_purchases: Option<i64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
