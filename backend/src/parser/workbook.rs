//! Workbook loading with calamine.
//!
//! Only the first worksheet is read and its first row is the header.

use calamine::{Data, Range, Reader, Xls, Xlsx};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::fmt::Display;
use std::io::{Cursor, Read, Seek};

use super::{Cell, RawTable, SourceFormat, SourceInfo};
use crate::error::{LoadError, LoadResult};

/// Largest serial Excel can represent (9999-12-31).
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

pub fn load_xlsx(bytes: &[u8]) -> LoadResult<RawTable> {
    let workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec()))
        .map_err(|e| LoadError::Workbook(e.to_string()))?;
    read_first_sheet(workbook, SourceFormat::Xlsx)
}

pub fn load_xls(bytes: &[u8]) -> LoadResult<RawTable> {
    let workbook: Xls<_> = Xls::new(Cursor::new(bytes.to_vec()))
        .map_err(|e| LoadError::Workbook(e.to_string()))?;
    read_first_sheet(workbook, SourceFormat::Xls)
}

fn read_first_sheet<RS, R>(mut workbook: R, format: SourceFormat) -> LoadResult<RawTable>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: Display,
{
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(LoadError::NoWorksheet)?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| LoadError::Workbook(format!("sheet '{}': {}", sheet_name, e)))?;

    let (headers, rows) = split_header(&range)?;

    let source = SourceInfo {
        format,
        sheet: Some(sheet_name),
        encoding: None,
        delimiter: None,
        headers: Vec::new(),
        row_count: 0,
    };

    RawTable::new(headers, rows, source)
}

/// First row becomes the header; remaining rows keep their sheet row number.
fn split_header(range: &Range<Data>) -> LoadResult<(Vec<String>, Vec<(usize, Vec<Cell>)>)> {
    // Ranges start at the first used cell, not necessarily A1.
    let first_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);
    let mut rows = range.rows();

    let header_row = rows.next().ok_or(LoadError::EmptyFile)?;
    let headers: Vec<String> = header_row
        .iter()
        .map(|c| cell_from_data(c).as_text().trim().to_string())
        .collect();

    let data = rows
        .enumerate()
        .map(|(idx, row)| {
            let sheet_row = first_row + idx + 2;
            (sheet_row, row.iter().map(cell_from_data).collect())
        })
        .collect();

    Ok((headers, data))
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::text(s),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::DateTime(dt) => match excel_serial_to_datetime(dt.as_f64()) {
            Some(value) => Cell::DateTime(value),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::text(s),
        other => Cell::text(&other.to_string()),
    }
}

/// Excel serial date conversion using the 1899-12-30 base.
///
/// The fractional part is the time of day.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(0.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    base.checked_add_signed(Duration::milliseconds(millis))
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Minimal in-memory XLSX builder for tests.

    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    pub enum XCell<'a> {
        Str(&'a str),
        Num(f64),
        Blank,
    }

    const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
</Types>"#;

    const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="Opportunities" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#;

    const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#;

    fn column_letter(idx: usize) -> char {
        (b'A' + idx as u8) as char
    }

    fn sheet_xml(rows: &[Vec<XCell>]) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
        );
        for (r, row) in rows.iter().enumerate() {
            xml.push_str(&format!(r#"<row r="{}">"#, r + 1));
            for (c, cell) in row.iter().enumerate() {
                let reference = format!("{}{}", column_letter(c), r + 1);
                match cell {
                    XCell::Str(s) => xml.push_str(&format!(
                        r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                        reference, s
                    )),
                    XCell::Num(n) => {
                        xml.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, reference, n))
                    }
                    XCell::Blank => {}
                }
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData></worksheet>");
        xml
    }

    pub fn build_xlsx(rows: &[Vec<XCell>]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        let sheet = sheet_xml(rows);
        let parts: [(&str, &str); 5] = [
            ("[Content_Types].xml", CONTENT_TYPES),
            ("_rels/.rels", ROOT_RELS),
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
            ("xl/worksheets/sheet1.xml", &sheet),
        ];
        for (name, content) in parts {
            zip.start_file(name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    /// Header row of the opportunity sheet.
    pub fn header_row() -> Vec<XCell<'static>> {
        [
            "Opportunity Name",
            "Contact Name",
            "Close Date",
            "Milestone",
            "Estimated Value",
            "Currency",
        ]
        .into_iter()
        .map(XCell::Str)
        .collect()
    }
}
