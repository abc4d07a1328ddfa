//! Date normalizer: raw cells to typed [`OpportunityRecord`]s.
//!
//! Close dates are coerced to calendar dates (the month key is derived from
//! them on demand), values to numbers and currency codes to upper case.
//! Rows that cannot be typed are either itemized into one error or skipped,
//! depending on [`RowErrorPolicy`].

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::api::logs::{log_success, log_warning, Stage};
use crate::config::{ReportConfig, RowErrorPolicy};
use crate::error::{IssueKind, NormalizeError, NormalizeResult, RowIssue};
use crate::models::{Column, OpportunityRecord};
use crate::parser::workbook::excel_serial_to_datetime;
use crate::parser::{Cell, RawTable};

/// Typed records plus the rows dropped under [`RowErrorPolicy::Skip`].
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub records: Vec<OpportunityRecord>,
    pub skipped: Vec<RowIssue>,
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const FIXED_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"];

const MONTH_FIRST_FORMATS: &[&str] = &["%m/%d/%Y", "%m-%d-%Y", "%m/%d/%y", "%m-%d-%y"];

const DAY_FIRST_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d/%m/%y", "%d-%m-%y"];

const NAMED_MONTH_FORMATS: &[&str] = &[
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d-%b-%Y",
    "%d-%b-%y",
    "%d %b %y",
];

/// Amounts with comma thousands groups, e.g. `1,250.50`.
static THOUSANDS_GROUPED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?\d{1,3}(,\d{3})+(\.\d+)?$").expect("valid regex"));

/// Type every row of the table.
pub fn normalize(table: &RawTable, config: &ReportConfig) -> NormalizeResult<Normalized> {
    let mut out = Normalized::default();
    let mut issues = Vec::new();

    for (row, cells) in &table.rows {
        match parse_row(table, *row, cells, config.day_first) {
            Ok(record) => out.records.push(record),
            Err(row_issues) => issues.extend(row_issues),
        }
    }

    if issues.is_empty() {
        log_success(Stage::Normalize, format!("{} records typed", out.records.len()));
        return Ok(out);
    }

    match config.row_errors {
        RowErrorPolicy::Fail => Err(NormalizeError::InvalidRows(issues)),
        RowErrorPolicy::Skip => {
            for issue in &issues {
                log_warning(Stage::Normalize, format!("Skipping: {}", issue));
            }
            log_success(
                Stage::Normalize,
                format!("{} records typed, {} issue(s) skipped", out.records.len(), issues.len()),
            );
            out.skipped = issues;
            Ok(out)
        }
    }
}

/// Type one row, returning every issue found in it.
fn parse_row(
    table: &RawTable,
    row: usize,
    cells: &[Cell],
    day_first: bool,
) -> Result<OpportunityRecord, Vec<RowIssue>> {
    let mut issues = Vec::new();

    let opportunity_name = table.cell(cells, Column::OpportunityName).as_text().trim().to_string();
    if opportunity_name.is_empty() {
        issues.push(RowIssue::new(row, Column::OpportunityName.header(), IssueKind::MissingValue));
    }

    let contact_name = table.cell(cells, Column::ContactName).as_text().trim().to_string();
    // Matched exactly against the won label, padding included.
    let milestone = table.cell(cells, Column::Milestone).as_text();

    let date_cell = table.cell(cells, Column::CloseDate);
    let close_date = match date_cell {
        Cell::Empty => {
            issues.push(RowIssue::new(row, Column::CloseDate.header(), IssueKind::MissingValue));
            None
        }
        cell => {
            let parsed = parse_close_date(cell, day_first);
            if parsed.is_none() {
                issues.push(
                    RowIssue::new(row, Column::CloseDate.header(), IssueKind::DateParse)
                        .with_value(cell.as_text()),
                );
            }
            parsed
        }
    };

    let value_cell = table.cell(cells, Column::EstimatedValue);
    let estimated_value = match parse_amount(value_cell) {
        Ok(v) => Some(v),
        Err(kind) => {
            issues.push(
                RowIssue::new(row, Column::EstimatedValue.header(), kind).with_value(value_cell.as_text()),
            );
            None
        }
    };

    let currency = table.cell(cells, Column::Currency).as_text().trim().to_uppercase();
    if currency.is_empty() {
        issues.push(RowIssue::new(row, Column::Currency.header(), IssueKind::MissingValue));
    }

    match (close_date, estimated_value) {
        (Some(close_date), Some(estimated_value)) if issues.is_empty() => Ok(OpportunityRecord {
            row,
            opportunity_name,
            contact_name,
            close_date,
            milestone,
            estimated_value,
            currency,
        }),
        _ => Err(issues),
    }
}

/// Coerce a close-date cell to a calendar date.
///
/// Numbers are Excel serial days.
pub fn parse_close_date(cell: &Cell, day_first: bool) -> Option<NaiveDate> {
    match cell {
        Cell::Empty => None,
        Cell::DateTime(dt) => Some(dt.date()),
        Cell::Number(n) => excel_serial_to_datetime(*n).map(|dt| dt.date()),
        Cell::Text(s) => parse_date_text(s, day_first),
    }
}

/// Parse a date written as text.
pub fn parse_date_text(s: &str, day_first: bool) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            if has_full_year(dt.date()) {
                return Some(dt.date());
            }
        }
    }

    let numeric = if day_first {
        DAY_FIRST_FORMATS
    } else {
        MONTH_FIRST_FORMATS
    };

    let candidates = FIXED_DATE_FORMATS
        .iter()
        .chain(numeric.iter())
        .chain(NAMED_MONTH_FORMATS.iter());

    if let Some(d) = candidates
        .clone()
        .filter_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .find(|d| has_full_year(*d))
    {
        return Some(d);
    }

    // "05/01/2024 00:00" and similar: retry on the date part alone.
    let (date_part, _) = s.split_once(' ')?;
    candidates
        .take(FIXED_DATE_FORMATS.len() + numeric.len())
        .filter_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
        .find(|d| has_full_year(*d))
}

/// `%Y` accepts one to four digits, so "1/5/24" would otherwise land in year 1.
/// Short years must come from a `%y` format instead.
fn has_full_year(date: NaiveDate) -> bool {
    (1000..=9999).contains(&date.year())
}

/// Parse an estimated value cell.
pub fn parse_amount(cell: &Cell) -> Result<f64, IssueKind> {
    match cell {
        Cell::Empty => Err(IssueKind::MissingValue),
        Cell::Number(n) if n.is_finite() => Ok(*n),
        Cell::Number(_) | Cell::DateTime(_) => Err(IssueKind::NumberParse),
        Cell::Text(s) => {
            let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
            // Any other comma is a decimal comma or a typo; neither is guessed at.
            let cleaned = if !compact.contains(',') {
                compact
            } else if THOUSANDS_GROUPED.is_match(&compact) {
                compact.replace(',', "")
            } else {
                return Err(IssueKind::NumberParse);
            };
            match cleaned.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(v),
                _ => Err(IssueKind::NumberParse),
            }
        }
    }
}
