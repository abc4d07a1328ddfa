//! Count and value aggregators.
//!
//! Groups records by an index key and month into a dense 2-D pivot:
//!
//! ```text
//! records                          →  pivot
//! ┌──────────────────────────┐       ┌──────────┬─────────┬─────────┐
//! │ Opp A, 2024-01-05        │       │          │ 2024-01 │ 2024-02 │
//! │ Opp A, 2024-02-10        │  →    │ Opp A    │    1    │    1    │
//! │ Opp B, 2024-02-15        │       │ Opp B    │    0    │    1    │
//! └──────────────────────────┘       └──────────┴─────────┴─────────┘
//! ```
//!
//! Rows are sorted by key and columns ascending by month. Every cell is
//! present; combinations with no records hold zero.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::AddAssign;

use crate::models::{Column, MonthKey, OpportunityRecord, ValuedOpportunity};

/// Values that can sit in a pivot cell.
pub trait PivotValue: Copy + Default + AddAssign + Serialize {
    /// Text for on-screen tables.
    fn render(&self) -> String;
    /// Text for CSV exports.
    fn export(&self) -> String;
}

impl PivotValue for u64 {
    fn render(&self) -> String {
        self.to_string()
    }

    fn export(&self) -> String {
        self.to_string()
    }
}

impl PivotValue for f64 {
    fn render(&self) -> String {
        format!("{:.2}", self)
    }

    fn export(&self) -> String {
        self.to_string()
    }
}

/// One pivot row: its index key and one cell per month column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotRow<V> {
    pub key: Vec<String>,
    pub cells: Vec<V>,
}

/// Dense (key × month) table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pivot<V> {
    /// Names of the index columns, e.g. `["Opportunity Name"]`.
    pub index: Vec<String>,
    pub months: Vec<MonthKey>,
    pub rows: Vec<PivotRow<V>>,
}

impl<V: PivotValue> Pivot<V> {
    /// Sum `(key, month, value)` entries into a filled pivot.
    pub fn from_entries<I>(index: Vec<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (Vec<String>, MonthKey, V)>,
    {
        let mut groups: BTreeMap<Vec<String>, BTreeMap<MonthKey, V>> = BTreeMap::new();
        let mut months: BTreeSet<MonthKey> = BTreeSet::new();

        for (key, month, value) in entries {
            months.insert(month);
            *groups.entry(key).or_default().entry(month).or_default() += value;
        }

        let months: Vec<MonthKey> = months.into_iter().collect();
        let rows = groups
            .into_iter()
            .map(|(key, by_month)| PivotRow {
                cells: months
                    .iter()
                    .map(|m| by_month.get(m).copied().unwrap_or_default())
                    .collect(),
                key,
            })
            .collect();

        Self { index, months, rows }
    }

    /// Cell for `key` and `month`.
    ///
    /// Zero when both exist in the pivot but never met; `None` when either
    /// is not part of the pivot at all.
    pub fn get(&self, key: &[&str], month: MonthKey) -> Option<V> {
        let col = self.months.iter().position(|m| *m == month)?;
        let row = self
            .rows
            .iter()
            .find(|r| r.key.iter().map(String::as_str).eq(key.iter().copied()))?;
        row.cells.get(col).copied()
    }

    /// Sum of every cell.
    pub fn total(&self) -> V {
        let mut total = V::default();
        for row in &self.rows {
            for cell in &row.cells {
                total += *cell;
            }
        }
        total
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header row: index names followed by month keys.
    pub fn header(&self) -> Vec<String> {
        self.index
            .iter()
            .cloned()
            .chain(self.months.iter().map(ToString::to_string))
            .collect()
    }
}

impl<V: PivotValue> fmt::Display for Pivot<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "(no rows)");
        }

        let header = self.header();
        let body: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|r| {
                r.key
                    .iter()
                    .cloned()
                    .chain(r.cells.iter().map(PivotValue::render))
                    .collect()
            })
            .collect();

        let widths: Vec<usize> = (0..header.len())
            .map(|c| {
                body.iter()
                    .map(|row| row[c].chars().count())
                    .chain(std::iter::once(header[c].chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let key_cols = self.index.len();
        let write_line = |f: &mut fmt::Formatter<'_>, cells: &[String]| -> fmt::Result {
            let line: Vec<String> = cells
                .iter()
                .enumerate()
                .map(|(c, text)| {
                    if c < key_cols {
                        format!("{:<width$}", text, width = widths[c])
                    } else {
                        format!("{:>width$}", text, width = widths[c])
                    }
                })
                .collect();
            writeln!(f, "{}", line.join("  ").trim_end())
        };

        write_line(f, &header)?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "{}", rule.join("  "))?;
        for row in &body {
            write_line(f, row)?;
        }
        Ok(())
    }
}

/// Opportunity name × month → number of records.
pub fn count_pivot(records: &[OpportunityRecord]) -> Pivot<u64> {
    Pivot::from_entries(
        vec![Column::OpportunityName.header().to_string()],
        records
            .iter()
            .map(|r| (vec![r.opportunity_name.clone()], r.month(), 1u64)),
    )
}

/// (Opportunity name, contact name) × month → summed target-currency value.
pub fn value_pivot(records: &[ValuedOpportunity]) -> Pivot<f64> {
    Pivot::from_entries(
        vec![
            Column::OpportunityName.header().to_string(),
            Column::ContactName.header().to_string(),
        ],
        records.iter().map(|v| {
            (
                vec![v.record.opportunity_name.clone(), v.record.contact_name.clone()],
                v.record.month(),
                v.target_value,
            )
        }),
    )
}

/// Month → summed target-currency value over all records, ascending.
pub fn monthly_totals(records: &[ValuedOpportunity]) -> Vec<(MonthKey, f64)> {
    let mut totals: BTreeMap<MonthKey, f64> = BTreeMap::new();
    for v in records {
        *totals.entry(v.record.month()).or_default() += v.target_value;
    }
    totals.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn month(s: &str) -> MonthKey {
        s.parse().unwrap()
    }

    fn record(name: &str, contact: &str, date: (i32, u32, u32), value: f64) -> ValuedOpportunity {
        ValuedOpportunity {
            record: OpportunityRecord {
                row: 0,
                opportunity_name: name.into(),
                contact_name: contact.into(),
                close_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
                milestone: "Open".into(),
                estimated_value: value,
                currency: "GBP".into(),
            },
            target_value: value,
        }
    }

    fn sample() -> Vec<ValuedOpportunity> {
        vec![
            record("Opp B", "Bob", (2024, 2, 15), 100.0),
            record("Opp A", "Ann", (2024, 1, 5), 100.0),
            record("Opp A", "Ann", (2024, 2, 10), 39.5),
            record("Opp A", "Al", (2024, 2, 11), 10.0),
            record("Opp A", "Ann", (2024, 2, 20), 0.5),
        ]
    }

    fn plain(records: &[ValuedOpportunity]) -> Vec<OpportunityRecord> {
        records.iter().map(|v| v.record.clone()).collect()
    }

    #[test]
    fn test_count_pivot_shape() {
        let pivot = count_pivot(&plain(&sample()));

        assert_eq!(pivot.index, vec!["Opportunity Name"]);
        assert_eq!(pivot.months, vec![month("2024-01"), month("2024-02")]);
        assert_eq!(pivot.rows.len(), 2);
        assert_eq!(pivot.rows[0].key, vec!["Opp A"]);
        assert_eq!(pivot.rows[0].cells, vec![1, 3]);
        assert_eq!(pivot.rows[1].cells, vec![0, 1]);
    }

    #[test]
    fn test_count_total_equals_rows() {
        let records = plain(&sample());
        assert_eq!(count_pivot(&records).total(), records.len() as u64);
    }

    #[test]
    fn test_absent_combination_is_zero() {
        let pivot = count_pivot(&plain(&sample()));
        assert_eq!(pivot.get(&["Opp B"], month("2024-01")), Some(0));
        assert_eq!(pivot.get(&["Opp B"], month("2024-02")), Some(1));
        assert_eq!(pivot.get(&["Opp C"], month("2024-01")), None);
        assert_eq!(pivot.get(&["Opp A"], month("2023-12")), None);
    }

    #[test]
    fn test_value_pivot_by_contact() {
        let pivot = value_pivot(&sample());

        assert_eq!(pivot.index, vec!["Opportunity Name", "Contact Name"]);
        let keys: Vec<Vec<String>> = pivot.rows.iter().map(|r| r.key.clone()).collect();
        assert_eq!(
            keys,
            vec![
                vec!["Opp A".to_string(), "Al".to_string()],
                vec!["Opp A".to_string(), "Ann".to_string()],
                vec!["Opp B".to_string(), "Bob".to_string()],
            ]
        );
        assert_eq!(pivot.get(&["Opp A", "Ann"], month("2024-02")), Some(40.0));
        assert_eq!(pivot.get(&["Opp A", "Al"], month("2024-01")), Some(0.0));
        assert_eq!(pivot.total(), 250.0);
    }

    #[test]
    fn test_monthly_totals_sorted() {
        let totals = monthly_totals(&sample());
        assert_eq!(totals, vec![(month("2024-01"), 100.0), (month("2024-02"), 150.0)]);
    }

    #[test]
    fn test_empty_pivot() {
        let pivot = count_pivot(&[]);
        assert!(pivot.is_empty());
        assert!(pivot.months.is_empty());
        assert_eq!(pivot.total(), 0);
        assert_eq!(pivot.to_string(), "(no rows)\n");
    }

    #[test]
    fn test_display_table() {
        let pivot = count_pivot(&plain(&sample()));
        let text = pivot.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Opportunity Name  2024-01  2024-02");
        assert!(lines[1].starts_with("----------------"));
        assert_eq!(lines[2], "Opp A                   1        3");
        assert_eq!(lines[3], "Opp B                   0        1");
    }

    #[test]
    fn test_serialize_months_as_strings() {
        let pivot = count_pivot(&plain(&sample()));
        let json = serde_json::to_value(&pivot).unwrap();
        assert_eq!(json["months"][0], "2024-01");
        assert_eq!(json["rows"][0]["key"][0], "Opp A");
        assert_eq!(json["rows"][1]["cells"][0], 0);
    }
}
