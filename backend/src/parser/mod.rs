//! Loader: uploaded bytes to an in-memory table.
//!
//! Workbooks (XLSX/XLS, first worksheet) go through [`workbook`]; anything
//! else is treated as delimited text with encoding and delimiter
//! auto-detection. Either way the result is a [`RawTable`] whose header row
//! has already been checked against the required [`Column`]s.

pub mod workbook;

use chrono::NaiveDateTime;
use serde::Serialize;
use std::path::Path;

use crate::error::{LoadError, LoadResult};
use crate::models::{Column, ColumnIndex};

/// A single untyped cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Build a cell from text, mapping blank strings to [`Cell::Empty`].
    ///
    /// Content is kept verbatim; columns that tolerate padding trim it later.
    pub fn text(s: &str) -> Self {
        if s.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Display form, used in error messages and for text columns.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => n.to_string(),
            Cell::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Kind of file the table was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Xlsx,
    Xls,
    Csv,
}

/// Metadata about the loaded file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub format: SourceFormat,
    /// Worksheet name for workbooks.
    pub sheet: Option<String>,
    /// Detected encoding for CSV.
    pub encoding: Option<String>,
    /// Detected delimiter for CSV.
    pub delimiter: Option<char>,
    pub headers: Vec<String>,
    pub row_count: usize,
}

/// Loaded table with validated headers.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub headers: Vec<String>,
    /// Data rows, header excluded. Each entry keeps its 1-based sheet row.
    pub rows: Vec<(usize, Vec<Cell>)>,
    pub columns: ColumnIndex,
    pub source: SourceInfo,
}

impl RawTable {
    /// Check the header row and drop fully blank rows.
    pub fn new(
        headers: Vec<String>,
        rows: Vec<(usize, Vec<Cell>)>,
        mut source: SourceInfo,
    ) -> LoadResult<Self> {
        let columns = ColumnIndex::resolve(&headers).map_err(LoadError::MissingColumns)?;

        let rows: Vec<(usize, Vec<Cell>)> = rows
            .into_iter()
            .filter(|(_, cells)| cells.iter().any(|c| !c.is_empty()))
            .collect();

        source.headers = headers.clone();
        source.row_count = rows.len();

        Ok(Self {
            headers,
            rows,
            columns,
            source,
        })
    }

    /// Cell of a required column in a row; short rows read as empty.
    pub fn cell<'a>(&self, cells: &'a [Cell], column: Column) -> &'a Cell {
        const EMPTY: &Cell = &Cell::Empty;
        cells.get(self.columns.position(column)).unwrap_or(EMPTY)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

/// Sniff the file format from its leading bytes.
pub fn detect_format(bytes: &[u8]) -> SourceFormat {
    if bytes.starts_with(ZIP_MAGIC) {
        SourceFormat::Xlsx
    } else if bytes.starts_with(OLE_MAGIC) {
        SourceFormat::Xls
    } else {
        SourceFormat::Csv
    }
}

/// Load a file from disk, reading it fully before parsing.
pub fn load_file<P: AsRef<Path>>(path: P) -> LoadResult<RawTable> {
    let bytes = std::fs::read(path.as_ref())?;
    load_bytes(&bytes)
}

/// Load uploaded bytes of any supported format.
pub fn load_bytes(bytes: &[u8]) -> LoadResult<RawTable> {
    if bytes.is_empty() {
        return Err(LoadError::EmptyFile);
    }

    match detect_format(bytes) {
        SourceFormat::Xlsx => workbook::load_xlsx(bytes),
        SourceFormat::Xls => workbook::load_xls(bytes),
        SourceFormat::Csv => load_csv_bytes(bytes),
    }
}

// =============================================================================
// Delimited text
// =============================================================================

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> LoadResult<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => match std::str::from_utf8(bytes) {
            Ok(s) => Ok(s.to_string()),
            Err(e) => Err(LoadError::Encoding(format!("invalid UTF-8: {}", e))),
        },
        "iso-8859-1" | "latin-1" | "latin1" => {
            Ok(encoding_rs::ISO_8859_15.decode(bytes).0.to_string())
        }
        "windows-1252" | "cp1252" => Ok(encoding_rs::WINDOWS_1252.decode(bytes).0.to_string()),
        // Fallback: try UTF-8 with lossy conversion
        _ => Ok(String::from_utf8_lossy(bytes).to_string()),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn load_csv_bytes(bytes: &[u8]) -> LoadResult<RawTable> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);
    load_csv_str(&content, delimiter, encoding)
}

/// Parse CSV text with an explicit delimiter.
pub fn load_csv_str(content: &str, delimiter: char, encoding: String) -> LoadResult<RawTable> {
    if content.trim().is_empty() {
        return Err(LoadError::EmptyFile);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| LoadError::Csv {
            line: 1,
            message: e.to_string(),
        })?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| LoadError::Csv {
            line: e.position().map(|p| p.line() as usize).unwrap_or(idx + 2),
            message: e.to_string(),
        })?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(idx + 2);
        rows.push((line, record.iter().map(Cell::text).collect()));
    }

    let source = SourceInfo {
        format: SourceFormat::Csv,
        sheet: None,
        encoding: Some(encoding),
        delimiter: Some(delimiter),
        headers: Vec::new(),
        row_count: 0,
    };

    RawTable::new(headers, rows, source)
}
