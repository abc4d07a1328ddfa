//! CSV exports of the two pivots.
//!
//! Each export has a header of index column names followed by month keys,
//! then one row per pivot row. Nothing is written to disk unless asked.

use csv::Writer;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::logs::{log_info_indent, log_success, Stage};
use crate::error::ExportResult;
use crate::transform::pipeline::Report;
use crate::transform::pivot::{Pivot, PivotValue};

pub const COUNTS_FILE_NAME: &str = "monthly_opportunity_counts.csv";
pub const VALUES_FILE_NAME: &str = "monthly_opportunity_values.csv";
pub const CSV_MIME_TYPE: &str = "text/csv";

/// A named export, ready to hand to a browser.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Download {
    pub file_name: String,
    pub mime_type: String,
    pub content: String,
}

/// Serialize a pivot as UTF-8 comma-separated text.
pub fn pivot_to_csv<V: PivotValue>(pivot: &Pivot<V>) -> ExportResult<String> {
    let mut wtr = Writer::from_writer(Vec::new());

    wtr.write_record(pivot.header())?;
    for row in &pivot.rows {
        let record = row
            .key
            .iter()
            .cloned()
            .chain(row.cells.iter().map(PivotValue::export));
        wtr.write_record(record)?;
    }

    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

pub fn counts_csv(report: &Report) -> ExportResult<String> {
    pivot_to_csv(&report.count_pivot)
}

pub fn values_csv(report: &Report) -> ExportResult<String> {
    pivot_to_csv(&report.value_pivot)
}

/// Both exports as in-memory downloads.
pub fn downloads(report: &Report) -> ExportResult<Vec<Download>> {
    Ok(vec![
        Download {
            file_name: COUNTS_FILE_NAME.to_string(),
            mime_type: CSV_MIME_TYPE.to_string(),
            content: counts_csv(report)?,
        },
        Download {
            file_name: VALUES_FILE_NAME.to_string(),
            mime_type: CSV_MIME_TYPE.to_string(),
            content: values_csv(report)?,
        },
    ])
}

/// Write both exports into `dir`, creating it if needed.
pub fn write_exports(report: &Report, dir: &Path) -> ExportResult<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    for download in downloads(report)? {
        let path = dir.join(&download.file_name);
        fs::write(&path, download.content)?;
        log_info_indent(Stage::Export, path.display().to_string(), 1);
        written.push(path);
    }

    log_success(Stage::Export, format!("{} files written", written.len()));
    Ok(written)
}
