// 📄 Raw spreadsheet access - grids of string cells
//
// Everything downstream works on untyped string cells. A source can hand out a
// sheet as a bare grid (no header interpretation) or re-read it with an
// assumed header row, which is what the column resolver probes with.

use crate::error::{IndicatorError, Result};
use crate::numeric::format_decimal_comma;
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;

// ============================================================================
// CORE TYPES
// ============================================================================

/// Rows × columns of raw cells; rows may have different lengths
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Grid { rows }
    }

    pub fn from_strs(rows: &[&[&str]]) -> Self {
        Grid::new(
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col).map(|s| s.as_str())
    }

    /// First-column values, trimmed; missing cells are ""
    pub fn first_column(&self) -> Vec<&str> {
        self.rows
            .iter()
            .map(|r| r.first().map(|s| s.trim()).unwrap_or(""))
            .collect()
    }
}

/// A sheet re-read with one row taken as the header
#[derive(Debug, Clone, PartialEq)]
pub struct NamedTable {
    pub header_row: usize,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl NamedTable {
    /// Take `header_row` as column names; the rows after it are data
    ///
    /// Blank header cells become `Unnamed: {index}` and repeated names get a
    /// `.1`, `.2` suffix so every column stays addressable by name.
    pub fn from_grid(grid: &Grid, header_row: usize) -> std::result::Result<Self, String> {
        let header = grid.rows().get(header_row).ok_or_else(|| {
            format!(
                "header row {} is past the last row ({} rows)",
                header_row,
                grid.len()
            )
        })?;

        let width = grid.width();
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut columns = Vec::with_capacity(width);

        for idx in 0..width {
            let raw = header.get(idx).map(|s| s.trim()).unwrap_or("");
            let base = if raw.is_empty() {
                format!("Unnamed: {}", idx)
            } else {
                raw.to_string()
            };

            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base.clone()
            } else {
                format!("{}.{}", base, count)
            };
            *count += 1;
            columns.push(name);
        }

        let rows = grid.rows()[header_row + 1..]
            .iter()
            .map(|r| {
                let mut row = r.clone();
                row.resize(width, String::new());
                row
            })
            .collect();

        Ok(NamedTable {
            header_row,
            columns,
            rows,
        })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col).map(|s| s.as_str())
    }
}

// ============================================================================
// SHEET SOURCE TRAIT
// ============================================================================

/// Anything that can hand out named sheets as raw grids
pub trait SheetSource {
    /// File name or other label used in reports
    fn label(&self) -> &str;

    fn sheet_names(&self) -> Vec<String>;

    /// The sheet as-is, no header interpretation
    fn read_grid(&self, sheet: &str) -> Result<Grid>;

    /// The sheet with `header_row` as its column names
    fn read_with_header(&self, sheet: &str, header_row: usize) -> Result<NamedTable> {
        let grid = self.read_grid(sheet)?;
        NamedTable::from_grid(&grid, header_row).map_err(|reason| IndicatorError::SheetRead {
            sheet: sheet.to_string(),
            reason,
        })
    }

    /// Hex SHA-256 of the underlying bytes, when there are bytes
    fn content_sha256(&self) -> Option<&str> {
        None
    }
}

// ============================================================================
// IN-MEMORY SHEETS
// ============================================================================

#[derive(Debug, Clone)]
enum SheetCells {
    Loaded(Grid),
    Failed(String),
}

/// Named grids held in memory, in insertion order
#[derive(Debug, Clone)]
pub struct MemorySheets {
    label: String,
    sheets: Vec<(String, SheetCells)>,
}

impl MemorySheets {
    pub fn new(label: &str) -> Self {
        MemorySheets {
            label: label.to_string(),
            sheets: Vec::new(),
        }
    }

    /// Builder pattern: add a sheet
    pub fn with_sheet(mut self, name: &str, grid: Grid) -> Self {
        self.insert(name, grid);
        self
    }

    pub fn insert(&mut self, name: &str, grid: Grid) {
        self.sheets.push((name.to_string(), SheetCells::Loaded(grid)));
    }

    fn insert_failed(&mut self, name: &str, reason: String) {
        self.sheets.push((name.to_string(), SheetCells::Failed(reason)));
    }
}

impl SheetSource for MemorySheets {
    fn label(&self) -> &str {
        &self.label
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.clone()).collect()
    }

    fn read_grid(&self, sheet: &str) -> Result<Grid> {
        match self.sheets.iter().find(|(name, _)| name == sheet) {
            Some((_, SheetCells::Loaded(grid))) => Ok(grid.clone()),
            Some((_, SheetCells::Failed(reason))) => Err(IndicatorError::SheetRead {
                sheet: sheet.to_string(),
                reason: reason.clone(),
            }),
            None => Err(IndicatorError::SheetNotFound {
                sheet: sheet.to_string(),
                available: self.sheet_names(),
            }),
        }
    }
}

// ============================================================================
// WORKBOOK (xlsx / xls / ods)
// ============================================================================

/// A spreadsheet file loaded fully into memory
///
/// Sheets are decoded once at open time. A sheet that fails to decode does
/// not fail the whole workbook; reading it later reports the failure.
#[derive(Debug, Clone)]
pub struct Workbook {
    sheets: MemorySheets,
    sha256: String,
}

impl Workbook {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(IndicatorError::FileNotFound(path.display().to_string()));
        }
        let bytes = std::fs::read(path)?;
        let label = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown.xlsx")
            .to_string();
        Workbook::from_bytes(&label, bytes)
    }

    /// Uploaded content; only `.xlsx` names are accepted
    pub fn from_upload(filename: &str, bytes: Vec<u8>) -> Result<Self> {
        if !filename.to_lowercase().ends_with(".xlsx") {
            return Err(IndicatorError::UnsupportedFile(format!(
                "expected an .xlsx file, got '{}'",
                filename
            )));
        }
        Workbook::from_bytes(filename, bytes)
    }

    pub fn from_bytes(label: &str, bytes: Vec<u8>) -> Result<Self> {
        let sha256 = sha256_hex(&bytes);
        let mut book = open_workbook_auto_from_rs(Cursor::new(bytes))?;

        let mut sheets = MemorySheets::new(label);
        for name in book.sheet_names() {
            match book.worksheet_range(&name) {
                Ok(range) => sheets.insert(&name, grid_from_range(&range)),
                Err(e) => sheets.insert_failed(&name, e.to_string()),
            }
        }

        tracing::debug!(file = label, sheets = sheets.sheets.len(), "workbook loaded");
        Ok(Workbook { sheets, sha256 })
    }
}

impl SheetSource for Workbook {
    fn label(&self) -> &str {
        self.sheets.label()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.sheet_names()
    }

    fn read_grid(&self, sheet: &str) -> Result<Grid> {
        self.sheets.read_grid(sheet)
    }

    fn content_sha256(&self) -> Option<&str> {
        Some(&self.sha256)
    }
}

/// Cells addressed from A1: leading empty rows/columns are kept
fn grid_from_range(range: &Range<Data>) -> Grid {
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut rows: Vec<Vec<String>> = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells = vec![String::new(); col_offset];
        cells.extend(row.iter().map(cell_to_string));
        rows.push(cells);
    }
    Grid::new(rows)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::Float(f) => format_decimal_comma(*f),
        Data::Int(i) => i.to_string(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// CSV (single sheet)
// ============================================================================

/// A CSV file read without any header assumption
#[derive(Debug, Clone)]
pub struct CsvSheet {
    sheets: MemorySheets,
    sha256: String,
}

impl CsvSheet {
    /// Sheet name is the file stem ("censo.csv" → "censo")
    pub fn open(path: &Path, delimiter: u8) -> Result<Self> {
        if !path.exists() {
            return Err(IndicatorError::FileNotFound(path.display().to_string()));
        }
        let label = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown.csv")
            .to_string();
        let sheet = path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or("Sheet1")
            .to_string();
        let file = std::fs::File::open(path)?;
        CsvSheet::from_reader(&label, &sheet, file, delimiter)
    }

    pub fn from_reader<R: Read>(label: &str, sheet: &str, mut reader: R, delimiter: u8) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let sha256 = sha256_hex(&bytes);

        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(bytes.as_slice());

        let mut rows = Vec::new();
        for (line_num, result) in csv_reader.records().enumerate() {
            let record = result.map_err(|e| IndicatorError::SheetRead {
                sheet: sheet.to_string(),
                reason: format!("line {}: {}", line_num + 1, e),
            })?;
            rows.push(record.iter().map(|c| c.to_string()).collect());
        }

        Ok(CsvSheet {
            sheets: MemorySheets::new(label).with_sheet(sheet, Grid::new(rows)),
            sha256,
        })
    }
}

impl SheetSource for CsvSheet {
    fn label(&self) -> &str {
        self.sheets.label()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.sheet_names()
    }

    fn read_grid(&self, sheet: &str) -> Result<Grid> {
        self.sheets.read_grid(sheet)
    }

    fn content_sha256(&self) -> Option<&str> {
        Some(&self.sha256)
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
