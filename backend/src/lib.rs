//! # Oppreport - monthly opportunity pivots, cumulative series and charts
//!
//! Oppreport reads an opportunity spreadsheet (XLSX, XLS or CSV) and reports
//! per-month counts and values, cumulative wins and values, and three charts.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Spreadsheet │────▶│   Parser    │────▶│  Transform  │────▶│   Report    │
//! │ (xlsx/csv)  │     │ (first sheet│     │ (pivots,    │     │ (tables,    │
//! │             │     │  + schema)  │     │  currency)  │     │  charts,CSV)│
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use oppreport::{build_report_from_path, ReportConfig};
//! use std::path::Path;
//!
//! fn main() {
//!     let config = ReportConfig::default();
//!     let report = build_report_from_path(Path::new("opportunities.xlsx"), &config).unwrap();
//!     println!("{}", report.count_pivot);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per stage
//! - [`config`] - Currency table and run options
//! - [`models`] - Column schema, month keys, typed records
//! - [`parser`] - Workbook and CSV loading
//! - [`transform`] - Normalization, pivots, cumulators, pipeline
//! - [`charts`] - Chart descriptions with empty placeholders
//! - [`export`] - CSV exports
//! - [`api`] - HTTP API server and log broadcaster

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Loading
pub mod parser;

// Transformation
pub mod transform;

// Output
pub mod charts;
pub mod export;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError,
    CurrencyError,
    ExportError,
    IssueKind,
    LoadError,
    NormalizeError,
    ReportError,
    ReportResult,
    RowIssue,
    ServerError,
};

// =============================================================================
// Re-exports - Config
// =============================================================================

pub use config::{CurrencyConfig, ReportConfig, RowErrorPolicy, UnknownCurrencyPolicy};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Column, MonthKey, OpportunityRecord, ValuedOpportunity};

// =============================================================================
// Re-exports - Loading
// =============================================================================

pub use parser::{
    detect_delimiter,
    detect_encoding,
    detect_format,
    load_bytes,
    load_file,
    Cell,
    RawTable,
    SourceFormat,
    SourceInfo,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    build_report,
    build_report_from_path,
    build_report_from_table,
    load_records,
    LoadedRecords,
    Report,
};

pub use transform::{CumulativePoint, Pivot};

// =============================================================================
// Re-exports - Output
// =============================================================================

pub use charts::{Chart, ChartData, ChartKind};
pub use export::{write_exports, Download, COUNTS_FILE_NAME, VALUES_FILE_NAME};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
