//! Currency normalizer.
//!
//! Converts every estimated value into the target currency:
//! unchanged when the code equals the target, otherwise divided by the rate
//! for that code. Codes without a rate follow [`UnknownCurrencyPolicy`].

use std::collections::BTreeSet;

use crate::api::logs::{log_success, log_warning, Stage};
use crate::config::{CurrencyConfig, UnknownCurrencyPolicy};
use crate::error::{CurrencyError, CurrencyResult};
use crate::models::{OpportunityRecord, ValuedOpportunity};

/// How a currency code resolved against the configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conversion {
    /// Already in the target currency.
    Identity,
    /// Divide by the rate from the table.
    Rate(f64),
    /// Unknown code, divided by the fallback currency's rate.
    Fallback(f64),
}

impl Conversion {
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Conversion::Identity => value,
            Conversion::Rate(rate) | Conversion::Fallback(rate) => value / rate,
        }
    }
}

/// Rate lookup over a validated [`CurrencyConfig`].
#[derive(Debug, Clone)]
pub struct CurrencyConverter<'a> {
    config: &'a CurrencyConfig,
}

impl<'a> CurrencyConverter<'a> {
    pub fn new(config: &'a CurrencyConfig) -> Self {
        Self { config }
    }

    pub fn target(&self) -> &str {
        &self.config.target
    }

    /// Resolve a code, or `None` when it is unknown and the policy rejects it.
    pub fn resolve(&self, code: &str) -> Option<Conversion> {
        if code == self.config.target {
            return Some(Conversion::Identity);
        }
        if let Some(rate) = self.config.rates.get(code) {
            return Some(Conversion::Rate(*rate));
        }
        match &self.config.unknown_currency {
            UnknownCurrencyPolicy::Reject => None,
            UnknownCurrencyPolicy::Fallback { source } => {
                self.config.rates.get(source).copied().map(Conversion::Fallback)
            }
        }
    }

    /// Resolve the code of the record at `row`, failing for rejected codes.
    pub fn conversion(&self, code: &str, row: usize) -> CurrencyResult<Conversion> {
        self.resolve(code).ok_or_else(|| CurrencyError::Unsupported {
            code: code.to_string(),
            row,
        })
    }
}

/// Attach the target-currency value to every record.
pub fn normalize_currency(
    records: Vec<OpportunityRecord>,
    config: &CurrencyConfig,
) -> CurrencyResult<Vec<ValuedOpportunity>> {
    let converter = CurrencyConverter::new(config);
    let mut warned: BTreeSet<String> = BTreeSet::new();
    let mut valued = Vec::with_capacity(records.len());

    for record in records {
        let conversion = converter.conversion(&record.currency, record.row)?;

        if let (Conversion::Fallback(rate), UnknownCurrencyPolicy::Fallback { source }) =
            (conversion, &config.unknown_currency)
        {
            if warned.insert(record.currency.clone()) {
                log_warning(
                    Stage::Currency,
                    format!(
                        "No rate for {}; converting as {} (rate {})",
                        record.currency, source, rate
                    ),
                );
            }
        }

        let target_value = conversion.apply(record.estimated_value);
        valued.push(ValuedOpportunity {
            record,
            target_value,
        });
    }

    log_success(
        Stage::Currency,
        format!("{} values converted to {}", valued.len(), converter.target()),
    );
    Ok(valued)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(row: usize, value: f64, currency: &str) -> OpportunityRecord {
        OpportunityRecord {
            row,
            opportunity_name: "Opp".into(),
            contact_name: "Ann".into(),
            close_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            milestone: "Open".into(),
            estimated_value: value,
            currency: currency.into(),
        }
    }

    #[test]
    fn test_target_currency_unchanged() {
        let config = CurrencyConfig::default();
        let out = normalize_currency(vec![record(2, 123.45, "GBP")], &config).unwrap();
        assert_eq!(out[0].target_value, 123.45);
    }

    #[test]
    fn test_usd_divided_by_rate() {
        let config = CurrencyConfig::default();
        let out = normalize_currency(vec![record(2, 127.0, "USD"), record(3, 50.0, "USD")], &config).unwrap();
        assert!((out[0].target_value - 100.0).abs() < 1e-9);
        assert!((out[1].target_value - 50.0 / 1.27).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_code_matches_usd_branch_by_default() {
        let config = CurrencyConfig::default();
        let out = normalize_currency(vec![record(2, 80.0, "EUR"), record(3, 80.0, "USD")], &config).unwrap();
        assert_eq!(out[0].target_value, out[1].target_value);
    }

    #[test]
    fn test_unknown_code_rejected() {
        let config = CurrencyConfig {
            unknown_currency: UnknownCurrencyPolicy::Reject,
            ..CurrencyConfig::default()
        };
        let err = normalize_currency(vec![record(2, 1.0, "GBP"), record(7, 1.0, "EUR")], &config).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported currency 'EUR' at row 7");
    }

    #[test]
    fn test_multi_currency_table() {
        let mut config = CurrencyConfig::default();
        config.rates.insert("EUR".into(), 1.17);
        let converter = CurrencyConverter::new(&config);

        assert_eq!(converter.resolve("GBP"), Some(Conversion::Identity));
        assert_eq!(converter.resolve("EUR"), Some(Conversion::Rate(1.17)));
        assert_eq!(converter.resolve("JPY"), Some(Conversion::Fallback(1.27)));
        let eur = converter.conversion("EUR", 2).unwrap();
        assert!((eur.apply(117.0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejected_conversion_names_row() {
        let config = CurrencyConfig {
            unknown_currency: UnknownCurrencyPolicy::Reject,
            ..CurrencyConfig::default()
        };
        let converter = CurrencyConverter::new(&config);

        assert_eq!(converter.conversion("GBP", 2).unwrap(), Conversion::Identity);
        match converter.conversion("EUR", 9) {
            Err(CurrencyError::Unsupported { code, row }) => {
                assert_eq!(code, "EUR");
                assert_eq!(row, 9);
            }
            other => panic!("expected unsupported currency, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_input() {
        let out = normalize_currency(Vec::new(), &CurrencyConfig::default()).unwrap();
        assert!(out.is_empty());
    }
}
