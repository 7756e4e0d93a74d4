//! Table reader and writer with encoding and delimiter auto-detection.
//!
//! Reads CSV (any of `;`, `,`, tab, `|`) and XLSX files into a [`Table`]: a
//! header line plus records of trimmed string cells. Writes tables back out
//! as an XLSX workbook or comma-separated CSV. No data model logic here.

use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Reader, Xlsx};
use rust_xlsxwriter::{Format, Workbook};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TableError, TableResult};
use crate::models::TABLE_COLUMNS;
use crate::transform::row::Row;

/// Leading bytes of a ZIP archive, which is what an XLSX file is.
const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";

/// Candidate delimiters, in tie-break order.
const DELIMITERS: [char; 4] = [';', ',', '\t', '|'];

// =============================================================================
// Table
// =============================================================================

/// One data record with its 1-based line in the source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub line: usize,
    pub cells: Vec<String>,
}

/// A rectangular grid of string cells under a header line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub records: Vec<Record>,
}

impl Table {
    /// Canonical table for a list of rows, columns in output order.
    pub fn from_rows(rows: &[Row]) -> Self {
        Self {
            headers: TABLE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            records: rows
                .iter()
                .enumerate()
                .map(|(i, row)| Record {
                    line: i + 2,
                    cells: row.to_cells(),
                })
                .collect(),
        }
    }

    /// Records as typed rows. Unknown columns are dropped.
    pub fn rows(&self) -> Vec<Row> {
        self.records
            .iter()
            .map(|record| Row::from_cells(record.line, &self.headers, &record.cells))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the table as comma-separated CSV, header first.
    pub fn to_csv(&self) -> TableResult<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for record in &self.records {
            writer.write_record(&record.cells)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| TableError::IoError(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| TableError::EncodingError(e.to_string()))
    }

    /// Write the table as a single-sheet XLSX workbook, bold header first.
    /// Empty cells are left blank.
    pub fn to_xlsx(&self) -> TableResult<Vec<u8>> {
        let mut workbook = Workbook::new();
        let bold = Format::new().set_bold();
        let sheet = workbook.add_worksheet();

        for (col, header) in self.headers.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, header, &bold)?;
        }
        for (row, record) in self.records.iter().enumerate() {
            for (col, cell) in record.cells.iter().enumerate() {
                if !cell.is_empty() {
                    sheet.write_string(row as u32 + 1, col as u16, cell)?;
                }
            }
        }

        Ok(workbook.save_to_buffer()?)
    }

    /// Encode the table in `format`.
    pub fn encode(&self, format: OutputFormat) -> TableResult<Vec<u8>> {
        match format {
            OutputFormat::Xlsx => self.to_xlsx(),
            OutputFormat::Csv => self.to_csv().map(String::into_bytes),
        }
    }
}

/// File format a table is written in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Xlsx,
    Csv,
}

impl OutputFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Csv => "text/csv; charset=utf-8",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }

    /// Format implied by a file name's extension, if any.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" => Some(Self::Xlsx),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// How a table was read.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceFormat {
    Csv { encoding: String, delimiter: char },
    Xlsx { sheet: String },
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Csv {
                encoding,
                delimiter,
            } => write!(
                f,
                "CSV ({encoding}, separator '{}')",
                format_delimiter(*delimiter)
            ),
            Self::Xlsx { sheet } => write!(f, "XLSX (sheet '{sheet}')"),
        }
    }
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub table: Table,
    pub format: SourceFormat,
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}

// =============================================================================
// Encoding and Delimiter Detection
// =============================================================================

/// Detect the encoding of raw bytes using chardet. Valid UTF-8 is always
/// reported as such.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }

    let charset = chardet::detect(bytes).0;
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string using the specified encoding. A leading byte
/// order mark is dropped.
pub fn decode_content(bytes: &[u8], encoding: &str) -> TableResult<String> {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8(bytes.to_vec())
            .map_err(|e| TableError::EncodingError(format!("{encoding}: {e}")))?,
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(encoding) => encoding.decode(bytes).0.into_owned(),
            None => String::from_utf8_lossy(bytes).into_owned(),
        },
    };

    Ok(match decoded.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => decoded,
    })
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best_sep = DELIMITERS[0];
    let mut best_count = 0;
    for sep in DELIMITERS {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }
    best_sep
}

// =============================================================================
// CSV
// =============================================================================

/// Parse CSV content with an explicit delimiter.
///
/// Quoted fields may contain the delimiter. Cells are trimmed, blank lines
/// skipped and short records padded to the header width.
///
/// # Example
/// ```rust
/// use cde_datamodel::parser::parse_csv;
///
/// let table = parse_csv("code;type\nage;integer\n", ';').unwrap();
/// assert_eq!(table.headers, vec!["code", "type"]);
/// assert_eq!(table.records[0].cells, vec!["age", "integer"]);
/// assert_eq!(table.records[0].line, 2);
/// ```
pub fn parse_csv(content: &str, delimiter: char) -> TableResult<Table> {
    if !delimiter.is_ascii() {
        return Err(TableError::EncodingError(format!(
            "delimiter '{delimiter}' is not ASCII"
        )));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let headers: Vec<String> = match records.next() {
        Some(header) => header?.iter().map(str::to_string).collect(),
        None => return Err(TableError::EmptyFile),
    };
    if headers.iter().all(String::is_empty) {
        return Err(TableError::NoHeaders);
    }

    let mut table = Table {
        headers,
        records: Vec::new(),
    };
    for result in records {
        let record = result?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let line = record.position().map_or(0, |p| p.line() as usize);
        table.records.push(Record {
            line,
            cells: pad(record.iter().map(str::to_string).collect(), table.headers.len()),
        });
    }
    Ok(table)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> TableResult<ParseResult> {
    if bytes.is_empty() {
        return Err(TableError::EmptyFile);
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);
    debug!(%encoding, delimiter = format_delimiter(delimiter), "detected CSV layout");

    Ok(ParseResult {
        table: parse_csv(&content, delimiter)?,
        format: SourceFormat::Csv {
            encoding,
            delimiter,
        },
    })
}

fn pad(mut cells: Vec<String>, width: usize) -> Vec<String> {
    if cells.len() < width {
        cells.resize(width, String::new());
    }
    cells
}

// =============================================================================
// XLSX
// =============================================================================

/// Parse the first worksheet of an XLSX workbook.
pub fn parse_xlsx(bytes: &[u8]) -> TableResult<ParseResult> {
    let mut workbook = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| TableError::SpreadsheetError(e.to_string()))?;

    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(TableError::EmptyFile)?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| TableError::SpreadsheetError(e.to_string()))?;

    let start_row = range.start().map_or(0, |(row, _)| row as usize);
    let mut rows = range.rows().enumerate();

    let headers: Vec<String> = match rows.next() {
        Some((_, cells)) => cells.iter().map(cell_text).collect(),
        None => return Err(TableError::EmptyFile),
    };
    if headers.iter().all(String::is_empty) {
        return Err(TableError::NoHeaders);
    }

    let records = rows
        .map(|(offset, cells)| Record {
            line: start_row + offset + 1,
            cells: pad(cells.iter().map(cell_text).collect(), headers.len()),
        })
        .filter(|record| record.cells.iter().any(|c| !c.is_empty()))
        .collect();

    Ok(ParseResult {
        table: Table { headers, records },
        format: SourceFormat::Xlsx { sheet },
    })
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Whether a file should be read as a workbook: by extension when a name is
/// known, by content otherwise.
pub fn is_xlsx(bytes: &[u8], filename: Option<&str>) -> bool {
    let by_name = filename.map(|name| {
        let name = name.to_lowercase();
        name.ends_with(".xlsx") || name.ends_with(".xlsm")
    });
    by_name.unwrap_or(false) || bytes.starts_with(ZIP_SIGNATURE)
}

/// Parse an uploaded table, CSV or XLSX.
pub fn parse_table_bytes(bytes: &[u8], filename: Option<&str>) -> TableResult<ParseResult> {
    if is_xlsx(bytes, filename) {
        parse_xlsx(bytes)
    } else {
        parse_bytes_auto(bytes)
    }
}

/// Parse a table file, CSV or XLSX.
pub fn parse_table_file<P: AsRef<Path>>(path: P) -> TableResult<ParseResult> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    parse_table_bytes(&bytes, path.file_name().and_then(|n| n.to_str()))
}
