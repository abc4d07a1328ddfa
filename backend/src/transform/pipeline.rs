//! High-level pipeline API: spreadsheet in, report out.
//!
//! Combines every stage in order: loading, date normalization, the count
//! pivot, the win cumulator, currency normalization, the value pivot, the
//! value cumulator and the chart builder.
//!
//! # Example
//!
//! ```rust,ignore
//! use oppreport::config::ReportConfig;
//! use oppreport::transform::pipeline::build_report_from_path;
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let report = build_report_from_path(Path::new("opportunities.xlsx"), &ReportConfig::default())?;
//!     println!("{}", report.count_pivot);
//!     Ok(())
//! }
//! ```

use serde::Serialize;
use std::path::Path;

use super::cumulative::{cumulative_values, cumulative_wins, CumulativePoint};
use super::currency::normalize_currency;
use super::normalize::{normalize, Normalized};
use super::pivot::{count_pivot, monthly_totals, value_pivot, Pivot};
use crate::api::logs::{log_info, log_info_indent, log_success, log_warning, Stage};
use crate::charts::{build_charts, Chart};
use crate::config::ReportConfig;
use crate::error::{ReportResult, RowIssue};
use crate::models::OpportunityRecord;
use crate::parser::{load_bytes, load_file, RawTable, SourceInfo, SourceFormat};

/// Everything produced by one pass over a spreadsheet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub source: SourceInfo,
    /// Records that made it through normalization.
    pub record_count: usize,
    pub target_currency: String,
    /// Name of the derived value column, e.g. "Value in GBP".
    pub value_column: String,
    pub count_pivot: Pivot<u64>,
    pub value_pivot: Pivot<f64>,
    pub cumulative_wins: Vec<CumulativePoint<u64>>,
    pub monthly_values: Vec<CumulativePoint<f64>>,
    /// Rows dropped under the `skip` row-error policy.
    pub skipped_rows: Vec<RowIssue>,
    pub charts: Vec<Chart>,
}

impl Report {
    /// Final running total of the converted values, zero when empty.
    pub fn total_value(&self) -> f64 {
        self.monthly_values.last().map(|p| p.cumulative).unwrap_or(0.0)
    }

    /// Final running total of won records, zero when none.
    pub fn total_wins(&self) -> u64 {
        self.cumulative_wins.last().map(|p| p.cumulative).unwrap_or(0)
    }
}

/// Typed records without any aggregation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedRecords {
    pub source: SourceInfo,
    pub records: Vec<OpportunityRecord>,
    pub skipped_rows: Vec<RowIssue>,
}

/// Build a report from a spreadsheet file on disk.
pub fn build_report_from_path(path: &Path, config: &ReportConfig) -> ReportResult<Report> {
    log_info(Stage::Load, format!("Reading {}", path.display()));
    let table = load_file(path)?;
    build_report_from_table(table, config)
}

/// Build a report from raw spreadsheet bytes (XLSX, XLS or CSV).
pub fn build_report(bytes: &[u8], config: &ReportConfig) -> ReportResult<Report> {
    log_info(Stage::Load, format!("Reading upload ({} bytes)", bytes.len()));
    let table = load_bytes(bytes)?;
    build_report_from_table(table, config)
}

/// Run every stage after loading.
pub fn build_report_from_table(table: RawTable, config: &ReportConfig) -> ReportResult<Report> {
    log_source(&table.source);

    log_info(Stage::Normalize, "Typing close dates and values...");
    let Normalized { records, skipped } = normalize(&table, config)?;
    if records.is_empty() {
        log_warning(Stage::Normalize, "No records; pivots and charts will be empty");
    }

    log_info(Stage::Counts, "Counting opportunities per month...");
    let counts = count_pivot(&records);
    log_success(
        Stage::Counts,
        format!("{} opportunities × {} months", counts.rows.len(), counts.months.len()),
    );

    log_info(Stage::Wins, format!("Accumulating '{}' rows...", config.won_milestone));
    let wins = cumulative_wins(&records, &config.won_milestone);
    match wins.last() {
        Some(last) => log_success(Stage::Wins, format!("{} wins over {} months", last.cumulative, wins.len())),
        None => log_warning(Stage::Wins, format!("No rows with milestone '{}'", config.won_milestone)),
    }

    log_info(Stage::Currency, format!("Converting values to {}...", config.currency.target));
    let record_count = records.len();
    let valued = normalize_currency(records, &config.currency)?;

    log_info(Stage::Values, "Summing values per opportunity and contact...");
    let values = value_pivot(&valued);
    let monthly_values = cumulative_values(monthly_totals(&valued));
    log_success(
        Stage::Values,
        format!("{} (opportunity, contact) pairs × {} months", values.rows.len(), values.months.len()),
    );

    let charts = build_charts(&wins, &monthly_values, &config.currency.target);
    let empty = charts.iter().filter(|c| c.is_empty()).count();
    if empty > 0 {
        log_warning(Stage::Charts, format!("{} of {} charts have no data", empty, charts.len()));
    } else {
        log_success(Stage::Charts, format!("{} charts ready", charts.len()));
    }

    Ok(Report {
        source: table.source,
        record_count,
        target_currency: config.currency.target.clone(),
        value_column: config.value_column(),
        count_pivot: counts,
        value_pivot: values,
        cumulative_wins: wins,
        monthly_values,
        skipped_rows: skipped,
        charts,
    })
}

/// Load and type a file without aggregating it.
pub fn load_records(path: &Path, config: &ReportConfig) -> ReportResult<LoadedRecords> {
    log_info(Stage::Load, format!("Reading {}", path.display()));
    let table = load_file(path)?;
    log_source(&table.source);

    let Normalized { records, skipped } = normalize(&table, config)?;
    Ok(LoadedRecords {
        source: table.source,
        records,
        skipped_rows: skipped,
    })
}

fn log_source(source: &SourceInfo) {
    match source.format {
        SourceFormat::Csv => {
            log_success(
                Stage::Load,
                format!(
                    "CSV, encoding {}, separator '{}'",
                    source.encoding.as_deref().unwrap_or("?"),
                    format_delimiter(source.delimiter.unwrap_or(','))
                ),
            );
        }
        SourceFormat::Xlsx | SourceFormat::Xls => {
            log_success(
                Stage::Load,
                format!(
                    "Workbook ({:?}), sheet '{}'",
                    source.format,
                    source.sheet.as_deref().unwrap_or("?")
                ),
            );
        }
    }
    log_success(Stage::Load, format!("Read {} rows", source.row_count));
    for (i, col) in source.headers.iter().enumerate() {
        log_info_indent(Stage::Load, format!("[{:2}] {}", i + 1, col), 1);
    }
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::NO_DATA;
    use crate::config::{RowErrorPolicy, UnknownCurrencyPolicy};
    use crate::error::ReportError;
    use crate::models::MonthKey;
    use crate::parser::workbook::fixtures::{build_xlsx, header_row, XCell};

    const HEADER: &str = "Opportunity Name,Contact Name,Close Date,Milestone,Estimated Value,Currency";

    fn month(s: &str) -> MonthKey {
        s.parse().unwrap()
    }

    fn scenario_csv() -> String {
        format!(
            "{}\n\
             Opp A,Ann,2024-01-05,Won,100,GBP\n\
             Opp A,Ann,2024-02-10,Open,50,USD\n\
             Opp B,Bob,2024-02-15,Won,127,USD\n",
            HEADER
        )
    }

    #[test]
    fn test_three_row_scenario() {
        let report = build_report(scenario_csv().as_bytes(), &ReportConfig::default()).unwrap();

        assert_eq!(report.record_count, 3);
        assert_eq!(report.value_column, "Value in GBP");

        let counts = &report.count_pivot;
        assert_eq!(counts.get(&["Opp A"], month("2024-01")), Some(1));
        assert_eq!(counts.get(&["Opp A"], month("2024-02")), Some(1));
        assert_eq!(counts.get(&["Opp B"], month("2024-01")), Some(0));
        assert_eq!(counts.get(&["Opp B"], month("2024-02")), Some(1));
        assert_eq!(counts.total(), 3);

        let wins: Vec<(String, u64)> = report
            .cumulative_wins
            .iter()
            .map(|p| (p.month.to_string(), p.cumulative))
            .collect();
        assert_eq!(wins, vec![("2024-01".to_string(), 1), ("2024-02".to_string(), 2)]);

        let values = &report.value_pivot;
        assert_eq!(values.get(&["Opp A", "Ann"], month("2024-01")), Some(100.0));
        let row2 = values.get(&["Opp A", "Ann"], month("2024-02")).unwrap();
        assert!((row2 - 50.0 / 1.27).abs() < 1e-9);
        let row3 = values.get(&["Opp B", "Bob"], month("2024-02")).unwrap();
        assert!((row3 - 100.0).abs() < 1e-9);

        assert_eq!(report.monthly_values.len(), 2);
        assert_eq!(report.monthly_values[0].cumulative, 100.0);
        assert!((report.total_value() - 239.37).abs() < 0.01);
        assert_eq!(report.total_wins(), 2);
    }

    #[test]
    fn test_final_cumulative_equals_value_sum() {
        let report = build_report(scenario_csv().as_bytes(), &ReportConfig::default()).unwrap();
        assert!((report.total_value() - report.value_pivot.total()).abs() < 1e-9);
    }

    #[test]
    fn test_zero_rows_is_not_an_error() {
        let report = build_report(HEADER.as_bytes(), &ReportConfig::default()).unwrap();

        assert_eq!(report.record_count, 0);
        assert!(report.count_pivot.is_empty());
        assert!(report.value_pivot.is_empty());
        assert!(report.cumulative_wins.is_empty());
        assert!(report.monthly_values.is_empty());
        assert_eq!(report.charts.len(), 3);
        assert!(report.charts.iter().all(|c| c.is_empty()));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["charts"][0]["placeholder"], NO_DATA);
    }

    #[test]
    fn test_no_wins_only_wins_chart_empty() {
        let csv = format!("{}\nOpp A,Ann,2024-01-05,Open,100,GBP\n", HEADER);
        let report = build_report(csv.as_bytes(), &ReportConfig::default()).unwrap();

        assert!(report.cumulative_wins.is_empty());
        assert!(report.charts[0].is_empty());
        assert!(!report.charts[1].is_empty());
        assert!(!report.charts[2].is_empty());
    }

    #[test]
    fn test_missing_column_is_client_error() {
        let csv = "Opportunity Name,Close Date\nOpp A,2024-01-05\n";
        let err = build_report(csv.as_bytes(), &ReportConfig::default()).unwrap_err();

        assert!(matches!(err, ReportError::Load(_)));
        assert!(err.is_client_error());
        assert!(err.to_string().contains("Contact Name"));
    }

    #[test]
    fn test_bad_rows_fail_or_skip() {
        let csv = format!(
            "{}\nOpp A,Ann,2024-01-05,Won,100,GBP\nOpp B,Bob,not a date,Won,abc,GBP\n",
            HEADER
        );

        let err = build_report(csv.as_bytes(), &ReportConfig::default()).unwrap_err();
        assert!(matches!(err, ReportError::Normalize(_)));
        assert!(err.to_string().contains("Row 3"));

        let config = ReportConfig {
            row_errors: RowErrorPolicy::Skip,
            ..ReportConfig::default()
        };
        let report = build_report(csv.as_bytes(), &config).unwrap();
        assert_eq!(report.record_count, 1);
        assert_eq!(report.skipped_rows.len(), 2);
        assert!(report.skipped_rows.iter().all(|i| i.row == 3));
    }

    #[test]
    fn test_eur_matches_usd_by_default() {
        let csv = format!(
            "{}\nOpp A,Ann,2024-01-05,Won,80,EUR\nOpp B,Bob,2024-01-05,Won,80,USD\n",
            HEADER
        );
        let report = build_report(csv.as_bytes(), &ReportConfig::default()).unwrap();
        let eur = report.value_pivot.get(&["Opp A", "Ann"], month("2024-01"));
        let usd = report.value_pivot.get(&["Opp B", "Bob"], month("2024-01"));
        assert_eq!(eur, usd);
    }

    #[test]
    fn test_eur_rejected_when_configured() {
        let csv = format!("{}\nOpp A,Ann,2024-01-05,Won,80,EUR\n", HEADER);
        let mut config = ReportConfig::default();
        config.currency.unknown_currency = UnknownCurrencyPolicy::Reject;

        let err = build_report(csv.as_bytes(), &config).unwrap_err();
        assert!(matches!(err, ReportError::Currency(_)));
        assert!(err.to_string().contains("'EUR' at row 2"));
    }

    #[test]
    fn test_xlsx_end_to_end() {
        let bytes = build_xlsx(&[
            header_row(),
            vec![
                XCell::Str("Opp A"),
                XCell::Str("Ann"),
                XCell::Num(45296.0),
                XCell::Str("Won"),
                XCell::Num(100.0),
                XCell::Str("GBP"),
            ],
            vec![
                XCell::Str("Opp B"),
                XCell::Blank,
                XCell::Str("2024-02-15"),
                XCell::Str("Won"),
                XCell::Num(127.0),
                XCell::Str("usd"),
            ],
        ]);

        let report = build_report(&bytes, &ReportConfig::default()).unwrap();

        assert_eq!(report.source.format, SourceFormat::Xlsx);
        assert_eq!(report.count_pivot.months, vec![month("2024-01"), month("2024-02")]);
        let opp_b = report.value_pivot.get(&["Opp B", ""], month("2024-02")).unwrap();
        assert!((opp_b - 100.0).abs() < 1e-9);
        assert_eq!(report.total_wins(), 2);
    }

    #[test]
    fn test_load_records_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opportunities.csv");
        std::fs::write(&path, scenario_csv()).unwrap();

        let loaded = load_records(&path, &ReportConfig::default()).unwrap();
        assert_eq!(loaded.records.len(), 3);
        assert_eq!(loaded.records[2].currency, "USD");
        assert_eq!(loaded.source.row_count, 3);

        let json = serde_json::to_value(&loaded).unwrap();
        assert_eq!(json["records"][0]["closeDate"], "2024-01-05");
    }
}
