//! REST API types for the report endpoints.

use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::charts::Chart;
use crate::error::{ExportResult, RowIssue};
use crate::export::{downloads, Download};
use crate::parser::SourceInfo;
use crate::transform::cumulative::CumulativePoint;
use crate::transform::pipeline::Report;
use crate::transform::pivot::Pivot;

/// Response sent after a spreadsheet upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    /// Unique report identifier
    pub report_id: String,

    /// Status: "ready", or "warning" when rows were skipped
    pub status: String,

    pub source: SourceInfo,

    pub summary: ReportSummary,

    pub count_pivot: Pivot<u64>,

    pub value_pivot: Pivot<f64>,

    pub cumulative_wins: Vec<CumulativePoint<u64>>,

    pub monthly_values: Vec<CumulativePoint<f64>>,

    pub charts: Vec<Chart>,

    pub skipped_rows: Vec<RowIssue>,

    /// Both CSV exports inline
    pub downloads: Vec<Download>,
}

/// Headline numbers for the report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub record_count: usize,
    pub target_currency: String,
    pub value_column: String,
    pub total_wins: u64,
    pub total_value: f64,
}

impl ReportResponse {
    pub fn from_report(report: Report) -> ExportResult<Self> {
        let downloads = downloads(&report)?;
        let status = if report.skipped_rows.is_empty() { "ready" } else { "warning" };

        Ok(ReportResponse {
            report_id: Uuid::new_v4().to_string(),
            status: status.to_string(),
            summary: ReportSummary {
                record_count: report.record_count,
                total_wins: report.total_wins(),
                total_value: report.total_value(),
                target_currency: report.target_currency,
                value_column: report.value_column,
            },
            source: report.source,
            count_pivot: report.count_pivot,
            value_pivot: report.value_pivot,
            cumulative_wins: report.cumulative_wins,
            monthly_values: report.monthly_values,
            charts: report.charts,
            skipped_rows: report.skipped_rows,
            downloads,
        })
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "reportId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "charts": [],
        "downloads": []
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ReportConfig, RowErrorPolicy};
    use crate::transform::pipeline::build_report;

    const CSV: &str = "Opportunity Name,Contact Name,Close Date,Milestone,Estimated Value,Currency\n\
                       Opp A,Ann,2024-01-05,Won,100,GBP\n\
                       Opp B,Bob,bad date,Won,10,GBP\n";

    #[test]
    fn test_response_shape() {
        let config = ReportConfig {
            row_errors: RowErrorPolicy::Skip,
            ..ReportConfig::default()
        };
        let report = build_report(CSV.as_bytes(), &config).unwrap();
        let response = ReportResponse::from_report(report).unwrap();

        assert_eq!(response.status, "warning");
        assert!(Uuid::parse_str(&response.report_id).is_ok());

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["summary"]["recordCount"], 1);
        assert_eq!(json["summary"]["valueColumn"], "Value in GBP");
        assert_eq!(json["summary"]["totalValue"], 100.0);
        assert_eq!(json["source"]["format"], "csv");
        assert_eq!(json["countPivot"]["months"][0], "2024-01");
        assert_eq!(json["skippedRows"][0]["row"], 3);
        assert_eq!(json["charts"].as_array().unwrap().len(), 3);
        assert_eq!(json["downloads"][1]["fileName"], "monthly_opportunity_values.csv");
    }

    #[test]
    fn test_error_response() {
        let body = error_response("Missing column(s): Currency");
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "Missing column(s): Currency");
        assert!(body["reportId"].is_string());
    }
}
