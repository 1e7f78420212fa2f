#![allow(dead_code)]

use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::NaiveDate;
use sales_report::error::{ReportError, Result};
use sales_report::fetch::{FetchedBody, Fetcher};
use sales_report::service::ReportService;
use sales_report::store::MemoryStore;
use tempfile::{TempDir, tempdir};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Processing date pinned for every test that relies on date defaults.
pub fn processing_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).expect("valid date")
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// In-process stand-in for remote sources. Unknown URLs fail like a 404.
#[derive(Default)]
pub struct StubFetcher {
    bodies: HashMap<String, (Option<String>, Vec<u8>)>,
    requested: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, content_type: Option<&str>, body: &str) -> Self {
        self.bodies.insert(
            url.to_string(),
            (content_type.map(str::to_string), body.as_bytes().to_vec()),
        );
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().expect("requested lock").clone()
    }
}

impl Fetcher for StubFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedBody> {
        self.requested
            .lock()
            .expect("requested lock")
            .push(url.to_string());
        let (content_type, bytes) = self
            .bodies
            .get(url)
            .ok_or_else(|| ReportError::fetch(url, "HTTP status 404 Not Found"))?;
        Ok(FetchedBody {
            bytes: bytes.clone(),
            content_type: content_type.clone(),
        })
    }
}

pub fn memory_service(fetcher: StubFetcher) -> ReportService<MemoryStore, StubFetcher> {
    ReportService::new(MemoryStore::new(), fetcher).with_processing_date(processing_date())
}

/// Cell of a generated workbook.
pub enum XlsxCell {
    Text(&'static str),
    Number(f64),
    /// Stored as a serial number with a built-in date format, the way
    /// spreadsheet applications write dates.
    Date(NaiveDate),
    Empty,
}

const SPREADSHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIP_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn excel_serial(date: NaiveDate) -> i64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).expect("excel epoch");
    (date - epoch).num_days()
}

fn sheet_xml(rows: &[Vec<XlsxCell>], shared: &mut Vec<String>) -> String {
    let mut xml = format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="{SPREADSHEET_NS}"><sheetData>"#);
    for (row_idx, row) in rows.iter().enumerate() {
        let row_no = row_idx + 1;
        xml.push_str(&format!(r#"<row r="{row_no}">"#));
        for (col_idx, cell) in row.iter().enumerate() {
            let reference = format!("{}{row_no}", char::from(b'A' + col_idx as u8));
            match cell {
                XlsxCell::Text(text) => {
                    shared.push(text.to_string());
                    xml.push_str(&format!(r#"<c r="{reference}" t="s"><v>{}</v></c>"#, shared.len() - 1));
                }
                XlsxCell::Number(value) => {
                    xml.push_str(&format!(r#"<c r="{reference}"><v>{value}</v></c>"#));
                }
                XlsxCell::Date(date) => {
                    xml.push_str(&format!(r#"<c r="{reference}" s="1"><v>{}</v></c>"#, excel_serial(*date)));
                }
                XlsxCell::Empty => {}
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Builds a minimal `.xlsx` package holding `sheets` in order.
pub fn xlsx_workbook(sheets: &[(&str, Vec<Vec<XlsxCell>>)]) -> Vec<u8> {
    let mut shared = Vec::new();
    let mut parts = Vec::new();
    let mut sheet_entries = String::new();
    let mut sheet_rels = String::new();
    let mut sheet_types = String::new();
    for (idx, (name, rows)) in sheets.iter().enumerate() {
        let n = idx + 1;
        parts.push((format!("xl/worksheets/sheet{n}.xml"), sheet_xml(rows, &mut shared)));
        sheet_entries.push_str(&format!(
            r#"<sheet name="{}" sheetId="{n}" r:id="rId{n}"/>"#,
            xml_escape(name)
        ));
        sheet_rels.push_str(&format!(
            r#"<Relationship Id="rId{n}" Type="{RELATIONSHIP_NS}/worksheet" Target="worksheets/sheet{n}.xml"/>"#
        ));
        sheet_types.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
    }
    let styles_id = sheets.len() + 1;
    let strings_id = sheets.len() + 2;

    let strings = shared
        .iter()
        .map(|s| format!("<si><t>{}</t></si>", xml_escape(s)))
        .collect::<String>();
    parts.push((
        "xl/sharedStrings.xml".to_string(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><sst xmlns="{SPREADSHEET_NS}" count="{0}" uniqueCount="{0}">{strings}</sst>"#,
            shared.len()
        ),
    ));
    parts.push((
        "xl/styles.xml".to_string(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><styleSheet xmlns="{SPREADSHEET_NS}"><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs></styleSheet>"#
        ),
    ));
    parts.push((
        "xl/workbook.xml".to_string(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="{SPREADSHEET_NS}" xmlns:r="{RELATIONSHIP_NS}"><sheets>{sheet_entries}</sheets></workbook>"#
        ),
    ));
    parts.push((
        "xl/_rels/workbook.xml.rels".to_string(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{sheet_rels}<Relationship Id="rId{styles_id}" Type="{RELATIONSHIP_NS}/styles" Target="styles.xml"/><Relationship Id="rId{strings_id}" Type="{RELATIONSHIP_NS}/sharedStrings" Target="sharedStrings.xml"/></Relationships>"#
        ),
    ));
    parts.push((
        "_rels/.rels".to_string(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{RELATIONSHIP_NS}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
        ),
    ));
    parts.push((
        "[Content_Types].xml".to_string(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>{sheet_types}<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/></Types>"#
        ),
    ));

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (path, body) in parts {
        zip.start_file(path, options).expect("start workbook part");
        zip.write_all(body.as_bytes()).expect("write workbook part");
    }
    zip.finish().expect("finish workbook").into_inner()
}
