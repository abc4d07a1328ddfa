//! Report configuration.
//!
//! Everything that used to be a literal in the report (target currency,
//! conversion rates, the "Won" label, date order) lives here. Loaded from a
//! JSON file named by `--config` or `OPPREPORT_CONFIG`, falling back to the
//! built-in defaults.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV_VAR: &str = "OPPREPORT_CONFIG";

/// Source units per one GBP.
pub const DEFAULT_USD_RATE: f64 = 1.27;

static CURRENCY_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{3}$").expect("valid regex"));

/// What to do with rows whose cells cannot be typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RowErrorPolicy {
    /// Collect every issue and fail with an itemized error.
    #[default]
    Fail,
    /// Drop the offending rows with a warning.
    Skip,
}

/// Handling of currency codes that are neither the target nor in the rate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum UnknownCurrencyPolicy {
    /// Fail with an unsupported-currency error.
    Reject,
    /// Convert with the rate of `source`, as if the row were in that currency.
    Fallback { source: String },
}

impl Default for UnknownCurrencyPolicy {
    fn default() -> Self {
        UnknownCurrencyPolicy::Fallback {
            source: "USD".to_string(),
        }
    }
}

/// Currency conversion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CurrencyConfig {
    /// Currency every value is reported in.
    pub target: String,
    /// Source-currency units per one target unit; values are divided by it.
    pub rates: BTreeMap<String, f64>,
    pub unknown_currency: UnknownCurrencyPolicy,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        let mut rates = BTreeMap::new();
        rates.insert("USD".to_string(), DEFAULT_USD_RATE);
        Self {
            target: "GBP".to_string(),
            rates,
            unknown_currency: UnknownCurrencyPolicy::default(),
        }
    }
}

/// Full report configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReportConfig {
    pub currency: CurrencyConfig,
    /// Milestone value counted as a win (exact, case-sensitive).
    pub won_milestone: String,
    pub row_errors: RowErrorPolicy,
    /// Read `01/02/2024` as 1 February instead of 2 January.
    pub day_first: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            currency: CurrencyConfig::default(),
            won_milestone: "Won".to_string(),
            row_errors: RowErrorPolicy::default(),
            day_first: false,
        }
    }
}

impl ReportConfig {
    /// Resolve the configuration: explicit path, then `OPPREPORT_CONFIG`, then defaults.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        // Try loading .env file
        let _ = dotenvy::dotenv();

        match path {
            Some(p) => Self::from_file(p),
            None => match env::var(CONFIG_ENV_VAR) {
                Ok(p) if !p.trim().is_empty() => Self::from_file(Path::new(p.trim())),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Read and validate a JSON config file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: ReportConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check codes, rates and labels.
    pub fn validate(&self) -> ConfigResult<()> {
        let currency = &self.currency;

        if !CURRENCY_CODE.is_match(&currency.target) {
            return Err(ConfigError::Invalid(format!(
                "target currency '{}' must be a 3-letter uppercase code",
                currency.target
            )));
        }

        for (code, rate) in &currency.rates {
            if !CURRENCY_CODE.is_match(code) {
                return Err(ConfigError::Invalid(format!(
                    "currency code '{}' must be a 3-letter uppercase code",
                    code
                )));
            }
            if !rate.is_finite() || *rate <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "rate for {} must be a positive number, got {}",
                    code, rate
                )));
            }
        }

        if let UnknownCurrencyPolicy::Fallback { source } = &currency.unknown_currency {
            if !currency.rates.contains_key(source) {
                return Err(ConfigError::Invalid(format!(
                    "fallback currency '{}' has no rate",
                    source
                )));
            }
        }

        if self.won_milestone.trim().is_empty() {
            return Err(ConfigError::Invalid("wonMilestone must not be empty".to_string()));
        }

        Ok(())
    }

    /// Column header for converted values, e.g. `Value in GBP`.
    pub fn value_column(&self) -> String {
        format!("Value in {}", self.currency.target)
    }
}
