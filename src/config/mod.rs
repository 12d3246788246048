mod file_config;

pub use file_config::{DerivationFileConfig, FileConfig, ValidationConfig};

use crate::pipeline::transformer::{DerivationConfig, SegmentThresholds};
use crate::pipeline::validator::Validator;
use anyhow::{bail, Result};
use chrono::NaiveDate;
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
    pub stage_timeout_secs: u64,
    pub max_amount: f64,
    pub min_valid_date: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            busy_timeout_ms: 5_000,
            stage_timeout_secs: 300,
            max_amount: 10_000.0,
            min_valid_date: "2000-01-01".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub busy_timeout_ms: u64,
    /// Zero disables the per-stage deadline.
    pub stage_timeout_secs: u64,
    pub max_amount: f64,
    pub min_valid_date: NaiveDate,
    pub derivation: DerivationConfig,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_path must be specified via --db-path or in config file")
            })?;
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                bail!("Database directory does not exist: {:?}", parent);
            }
        }

        let busy_timeout_ms = file.busy_timeout_ms.unwrap_or(cli.busy_timeout_ms);
        let stage_timeout_secs = file.stage_timeout_secs.unwrap_or(cli.stage_timeout_secs);

        let validation = file.validation.unwrap_or_default();
        let max_amount = validation.max_amount.unwrap_or(cli.max_amount);
        if max_amount <= 0.0 {
            bail!("max_amount must be positive, got {}", max_amount);
        }
        let min_valid_date_str = validation
            .min_valid_date
            .unwrap_or_else(|| cli.min_valid_date.clone());
        let min_valid_date = NaiveDate::parse_from_str(&min_valid_date_str, "%Y-%m-%d")
            .map_err(|_| anyhow::anyhow!("Invalid min_valid_date: {}", min_valid_date_str))?;

        let derivation_file = file.derivation.unwrap_or_default();
        let defaults = DerivationConfig::default();
        let price_tier_thresholds = derivation_file
            .price_tier_thresholds
            .unwrap_or(defaults.price_tier_thresholds);
        if price_tier_thresholds.is_empty() {
            bail!("price_tier_thresholds must not be empty");
        }
        if !price_tier_thresholds.windows(2).all(|w| w[0] < w[1]) {
            bail!(
                "price_tier_thresholds must be strictly ascending: {:?}",
                price_tier_thresholds
            );
        }
        let segment_defaults = SegmentThresholds::default();
        let derivation = DerivationConfig {
            price_tier_thresholds,
            reference_year: derivation_file
                .reference_year
                .unwrap_or(defaults.reference_year),
            segments: SegmentThresholds {
                high_value_spend: derivation_file
                    .segment_high_value_spend
                    .unwrap_or(segment_defaults.high_value_spend),
                high_value_purchases: derivation_file
                    .segment_high_value_purchases
                    .unwrap_or(segment_defaults.high_value_purchases),
                regular_spend: derivation_file
                    .segment_regular_spend
                    .unwrap_or(segment_defaults.regular_spend),
                regular_purchases: derivation_file
                    .segment_regular_purchases
                    .unwrap_or(segment_defaults.regular_purchases),
            },
        };

        Ok(Self {
            db_path,
            busy_timeout_ms,
            stage_timeout_secs,
            max_amount,
            min_valid_date,
            derivation,
        })
    }

    pub fn validator(&self) -> Validator {
        Validator {
            max_amount: self.max_amount,
            min_valid_date: self.min_valid_date,
            // Allow forthcoming titles announced for next year.
            max_publication_year: self.derivation.reference_year + 1,
        }
    }

    pub fn stage_timeout(&self) -> Option<std::time::Duration> {
        if self.stage_timeout_secs == 0 {
            None
        } else {
            Some(std::time::Duration::from_secs(self.stage_timeout_secs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_requires_db_path() {
        let cli = CliConfig::default();
        assert!(AppConfig::resolve(&cli, None).is_err());
    }

    #[test]
    fn test_file_overrides_cli() {
        let cli = CliConfig {
            db_path: Some(PathBuf::from("cli.db")),
            stage_timeout_secs: 300,
            ..Default::default()
        };
        let file: FileConfig = toml::from_str(
            r#"
            db_path = "file.db"
            stage_timeout_secs = 60

            [validation]
            max_amount = 2500.0
            min_valid_date = "2010-01-01"

            [derivation]
            price_tier_thresholds = [10.0, 50.0]
            reference_year = 2026
            segment_regular_purchases = 5
            "#,
        )
        .unwrap();

        let config = AppConfig::resolve(&cli, Some(file)).unwrap();
        assert_eq!(config.db_path, PathBuf::from("file.db"));
        assert_eq!(config.stage_timeout_secs, 60);
        assert_eq!(config.max_amount, 2500.0);
        assert_eq!(
            config.min_valid_date,
            NaiveDate::from_ymd_opt(2010, 1, 1).unwrap()
        );
        assert_eq!(config.derivation.price_tier_thresholds, vec![10.0, 50.0]);
        assert_eq!(config.derivation.reference_year, 2026);
        assert_eq!(config.derivation.segments.regular_purchases, 5);
        // Untouched segment fields keep their defaults.
        assert_eq!(config.derivation.segments.high_value_spend, 500.0);
    }

    #[test]
    fn test_cli_values_used_without_file() {
        let cli = CliConfig {
            db_path: Some(PathBuf::from("cli.db")),
            max_amount: 100.0,
            ..Default::default()
        };
        let config = AppConfig::resolve(&cli, None).unwrap();
        assert_eq!(config.db_path, PathBuf::from("cli.db"));
        assert_eq!(config.max_amount, 100.0);
        assert_eq!(config.derivation.price_tier_thresholds, vec![10.0, 25.0, 50.0]);
    }

    #[test]
    fn test_unordered_thresholds_rejected() {
        let cli = CliConfig {
            db_path: Some(PathBuf::from("cli.db")),
            ..Default::default()
        };
        let file: FileConfig = toml::from_str(
            r#"
            [derivation]
            price_tier_thresholds = [50.0, 10.0]
            "#,
        )
        .unwrap();
        assert!(AppConfig::resolve(&cli, Some(file)).is_err());
    }
}
