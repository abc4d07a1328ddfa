//! Domain models for the opportunity report pipeline.
//!
//! - [`Column`] - the required input columns, shared by every stage
//! - [`MonthKey`] - `YYYY-MM` bucket derived from a close date
//! - [`OpportunityRecord`] - one typed row of the input sheet
//! - [`ValuedOpportunity`] - a record plus its value in the target currency

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Column schema
// =============================================================================

/// Required columns of the opportunity sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    OpportunityName,
    ContactName,
    CloseDate,
    Milestone,
    EstimatedValue,
    Currency,
}

impl Column {
    /// Every required column, in the order missing columns are reported.
    pub const ALL: [Column; 6] = [
        Column::OpportunityName,
        Column::ContactName,
        Column::CloseDate,
        Column::Milestone,
        Column::EstimatedValue,
        Column::Currency,
    ];

    /// Header text as it appears in the sheet.
    pub fn header(self) -> &'static str {
        match self {
            Column::OpportunityName => "Opportunity Name",
            Column::ContactName => "Contact Name",
            Column::CloseDate => "Close Date",
            Column::Milestone => "Milestone",
            Column::EstimatedValue => "Estimated Value",
            Column::Currency => "Currency",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// Positions of the required columns inside a header row.
///
/// Built once at load time; later stages index cells through it instead of
/// repeating header literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnIndex {
    positions: [usize; 6],
}

impl ColumnIndex {
    /// Resolve every required column, collecting all the missing ones.
    pub fn resolve(headers: &[String]) -> Result<Self, Vec<String>> {
        let mut positions = [0usize; 6];
        let mut missing = Vec::new();

        for column in Column::ALL {
            match headers.iter().position(|h| h.trim() == column.header()) {
                Some(idx) => positions[column as usize] = idx,
                None => missing.push(column.header().to_string()),
            }
        }

        if missing.is_empty() {
            Ok(Self { positions })
        } else {
            Err(missing)
        }
    }

    pub fn position(&self, column: Column) -> usize {
        // Discriminants follow the order of `Column::ALL`.
        self.positions[column as usize]
    }
}

// =============================================================================
// Month key
// =============================================================================

/// Calendar month bucket, displayed as `YYYY-MM`.
///
/// Field order makes the derived `Ord` chronological, which also matches the
/// lexicographic order of the string form for four-digit years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// The only way month keys are derived from dates.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("invalid month key '{}'", s))?;
        let year = y.parse::<i32>().map_err(|e| format!("invalid year in '{}': {}", s, e))?;
        let month = m.parse::<u32>().map_err(|e| format!("invalid month in '{}': {}", s, e))?;
        MonthKey::new(year, month).ok_or_else(|| format!("month out of range in '{}'", s))
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Records
// =============================================================================

/// One typed row of the opportunity sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityRecord {
    /// 1-based sheet row this record came from.
    pub row: usize,
    pub opportunity_name: String,
    pub contact_name: String,
    pub close_date: NaiveDate,
    pub milestone: String,
    pub estimated_value: f64,
    /// Upper-cased currency code.
    pub currency: String,
}

impl OpportunityRecord {
    /// Month bucket, recomputed from the close date on every call.
    pub fn month(&self) -> MonthKey {
        MonthKey::from_date(self.close_date)
    }

    pub fn is_won(&self, won_label: &str) -> bool {
        self.milestone == won_label
    }
}

/// A record together with its value converted to the target currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuedOpportunity {
    #[serde(flatten)]
    pub record: OpportunityRecord,
    pub target_value: f64,
}
