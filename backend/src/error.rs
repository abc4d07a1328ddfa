//! Error types for the opportunity report pipeline.
//!
//! One enum per concern, mirroring the pipeline stages:
//!
//! - [`LoadError`] - file format and schema errors
//! - [`NormalizeError`] - per-row date/number problems
//! - [`CurrencyError`] - currency conversion errors
//! - [`ConfigError`] - configuration loading and validation
//! - [`ExportError`] - CSV export failures
//! - [`ReportError`] - top-level pipeline error
//! - [`ServerError`] - HTTP layer errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

// =============================================================================
// Load Errors
// =============================================================================

/// Errors while reading the uploaded file into a raw table.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// The bytes look like a workbook but cannot be opened.
    #[error("Cannot read spreadsheet: {0}")]
    Workbook(String),

    /// The workbook has no worksheet at all.
    #[error("Spreadsheet has no worksheet")]
    NoWorksheet,

    /// CSV text could not be decoded.
    #[error("Failed to decode text: {0}")]
    Encoding(String),

    /// Malformed CSV line.
    #[error("Invalid CSV at line {line}: {message}")]
    Csv { line: usize, message: String },

    /// Zero bytes or no header row.
    #[error("File is empty")]
    EmptyFile,

    /// One or more required columns are absent from the header row.
    #[error("Missing column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

// =============================================================================
// Normalization Errors
// =============================================================================

/// What went wrong with a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueKind {
    /// Value cannot be interpreted as a date.
    DateParse,
    /// Value cannot be interpreted as a number.
    NumberParse,
    /// Required value is empty.
    MissingValue,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::DateParse => write!(f, "date parse error"),
            IssueKind::NumberParse => write!(f, "number parse error"),
            IssueKind::MissingValue => write!(f, "missing value"),
        }
    }
}

/// A problem found in one row, with enough context to find it in the sheet.
///
/// `row` is the 1-based sheet row (the header is row 1).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowIssue {
    pub row: usize,
    pub column: String,
    pub value: String,
    pub kind: IssueKind,
}

impl RowIssue {
    pub fn new(row: usize, column: impl Into<String>, kind: IssueKind) -> Self {
        Self {
            row,
            column: column.into(),
            value: String::new(),
            kind,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_empty() {
            write!(f, "Row {}, column '{}': {}", self.row, self.column, self.kind)
        } else {
            write!(
                f,
                "Row {}, column '{}' (value '{}'): {}",
                self.row, self.column, self.value, self.kind
            )
        }
    }
}

/// Errors while typing raw cells into opportunity records.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// Itemized list of every offending row.
    #[error("{} invalid row(s): {}", .0.len(), format_issues(.0))]
    InvalidRows(Vec<RowIssue>),
}

fn format_issues(issues: &[RowIssue]) -> String {
    const SHOWN: usize = 10;
    let mut text = issues
        .iter()
        .take(SHOWN)
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    if issues.len() > SHOWN {
        text.push_str(&format!("; ... +{} more", issues.len() - SHOWN));
    }
    text
}

// =============================================================================
// Currency Errors
// =============================================================================

/// Errors from the currency normalizer.
#[derive(Debug, Error)]
pub enum CurrencyError {
    /// Currency code has no rate and the policy rejects unknown codes.
    #[error("Unsupported currency '{code}' at row {row}")]
    Unsupported { code: String, row: usize },
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading or validating [`crate::config::ReportConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file unreadable.
    #[error("Cannot read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON for the expected shape.
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Semantically invalid value.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while writing CSV exports.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Export IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

// =============================================================================
// Report Errors (top-level)
// =============================================================================

/// Top-level pipeline error.
///
/// This is the error returned by [`crate::transform::pipeline::build_report`].
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Normalize error: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Currency error: {0}")]
    Currency(#[from] CurrencyError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

impl ReportError {
    /// True when the error was caused by the uploaded file rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ReportError::Load(_) | ReportError::Normalize(_) | ReportError::Currency(_)
        )
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type LoadResult<T> = Result<T, LoadError>;

pub type NormalizeResult<T> = Result<T, NormalizeError>;

pub type CurrencyResult<T> = Result<T, CurrencyError>;

pub type ConfigResult<T> = Result<T, ConfigError>;

pub type ExportResult<T> = Result<T, ExportError>;

pub type ReportResult<T> = Result<T, ReportError>;

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let load_err = LoadError::EmptyFile;
        let report_err: ReportError = load_err.into();
        assert!(report_err.to_string().contains("empty"));
        assert!(report_err.is_client_error());

        let missing = LoadError::MissingColumns(vec!["Close Date".into(), "Currency".into()]);
        let report_err: ReportError = missing.into();
        assert!(report_err
            .to_string()
            .contains("Missing column(s): Close Date, Currency"));
    }

    #[test]
    fn test_row_issue_format() {
        let issue = RowIssue::new(5, "Close Date", IssueKind::DateParse).with_value("soon");
        let msg = issue.to_string();
        assert!(msg.contains("Row 5"));
        assert!(msg.contains("column 'Close Date'"));
        assert!(msg.contains("value 'soon'"));
        assert!(msg.contains("date parse"));
    }

    #[test]
    fn test_invalid_rows_truncated() {
        let issues: Vec<RowIssue> = (2..20)
            .map(|r| RowIssue::new(r, "Estimated Value", IssueKind::NumberParse))
            .collect();
        let msg = NormalizeError::InvalidRows(issues).to_string();
        assert!(msg.starts_with("18 invalid row(s)"));
        assert!(msg.contains("+8 more"));
    }

    #[test]
    fn test_config_error_is_not_client_error() {
        let err: ReportError = ConfigError::Invalid("bad rate".into()).into();
        assert!(!err.is_client_error());
    }
}
