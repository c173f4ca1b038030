//! Reading source tables (CSV and spreadsheet workbooks) into raw rows.

use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use csv::{ReaderBuilder, Trim};
use glob::{glob, Pattern};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::clean::header_key;
use crate::error::EtlError;

/// One raw cell value as read from the source file.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(trimmed.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }
}

static EMPTY_CELL: Cell = Cell::Empty;

/// A header row plus data rows, in file order.
#[derive(Debug, Clone)]
pub struct Table {
    pub path: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// Borrowed view of one data row keyed by the table's headers.
#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    headers: &'a [String],
    cells: &'a [Cell],
}

impl<'a> RawRecord<'a> {
    /// Cell at a resolved column index; short rows read as empty.
    pub fn at(&self, index: usize) -> &'a Cell {
        self.cells.get(index).unwrap_or(&EMPTY_CELL)
    }

    pub fn get(&self, column: &str) -> &'a Cell {
        match find_column(self.headers, column) {
            Some(index) => self.at(index),
            None => &EMPTY_CELL,
        }
    }
}

impl Table {
    pub fn column(&self, name: &str) -> Option<usize> {
        find_column(&self.headers, name)
    }

    pub fn records(&self) -> impl Iterator<Item = RawRecord<'_>> {
        self.rows.iter().map(move |cells| RawRecord {
            headers: &self.headers,
            cells,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Exact header match first, then an accent/case/punctuation-insensitive one.
pub fn find_column(headers: &[String], name: &str) -> Option<usize> {
    if let Some(index) = headers.iter().position(|h| h == name) {
        return Some(index);
    }
    let wanted = header_key(name);
    if wanted.is_empty() {
        return None;
    }
    headers.iter().position(|h| header_key(h) == wanted)
}

/// Reads a `.csv` or `.xlsx`/`.xls`/`.ods` file based on its extension.
pub fn read_table(path: &Path) -> Result<Table> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let table = match extension.as_str() {
        "csv" | "txt" => read_csv(path)?,
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => read_workbook(path)?,
        _ => return Err(EtlError::UnsupportedFormat(path.to_path_buf()).into()),
    };
    info!(
        "Read {} rows x {} columns from {}",
        table.len(),
        table.headers.len(),
        path.display()
    );
    Ok(table)
}

pub fn read_csv(path: &Path) -> Result<Table> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to open input file: {}", path.display()))?;
    let text = decode_text(&bytes);
    let text = text.strip_prefix('\u{feff}').unwrap_or(text.as_str());
    let delimiter = detect_delimiter(text);
    debug!("Using delimiter {:?} for {}", delimiter as char, path.display());

    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr
        .headers()
        .with_context(|| format!("Failed to read header row of {}", path.display()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = match result {
            Ok(rec) => rec,
            Err(e) => {
                warn!("Error reading row {} of {}: {}. Skipping.", i + 2, path.display(), e);
                continue;
            }
        };
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(Cell::from_text).collect());
    }

    Ok(Table {
        path: path.to_path_buf(),
        headers,
        rows,
    })
}

/// First worksheet, first row as header. A first sheet without a header row
/// is an [`EtlError::EmptyWorkbook`].
pub fn read_workbook(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook: {}", path.display()))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| EtlError::EmptyWorkbook(path.to_path_buf()))?;
    debug!("Reading worksheet '{}' of {}", sheet, path.display());
    let range = workbook
        .worksheet_range(&sheet)
        .with_context(|| format!("Failed to read worksheet '{}' of {}", sheet, path.display()))?;

    let mut row_iter = range.rows();
    let headers: Vec<String> = match row_iter.next() {
        Some(header_row) => header_row.iter().map(header_text).collect(),
        None => return Err(EtlError::EmptyWorkbook(path.to_path_buf()).into()),
    };
    let rows = row_iter
        .map(|row| row.iter().map(data_to_cell).collect::<Vec<_>>())
        .filter(|cells: &Vec<Cell>| !cells.iter().all(Cell::is_empty))
        .collect();

    Ok(Table {
        path: path.to_path_buf(),
        headers,
        rows,
    })
}

fn data_to_cell(d: &Data) -> Cell {
    match d {
        Data::String(s) => Cell::from_text(s),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => Cell::Text(dt.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::from_text(s),
        Data::Error(_) | Data::Empty => Cell::Empty,
    }
}

fn header_text(d: &Data) -> String {
    match data_to_cell(d) {
        Cell::Empty => String::new(),
        Cell::Text(s) => s,
        Cell::Number(n) => crate::clean::format_number(n),
    }
}

/// Government exports arrive as UTF-8 or Windows-1252/Latin-1.
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn detect_delimiter(text: &str) -> u8 {
    let header_line = text.lines().next().unwrap_or("");
    let semicolons = header_line.matches(';').count();
    let commas = header_line.matches(',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

/// Finds the first existing file among `patterns` (globs relative to `dir`).
/// When a pattern matches several files the lexicographically last one wins,
/// so dated exports like `concesiones_2024.csv` beat `concesiones_2023.csv`.
pub fn locate_input(dir: &Path, patterns: &[&str]) -> Option<PathBuf> {
    for pattern in patterns {
        let pattern_str = format!(
            "{}/{}",
            Pattern::escape(&dir.to_string_lossy()),
            pattern
        );
        let mut matches: Vec<PathBuf> = match glob(&pattern_str) {
            Ok(paths) => paths
                .filter_map(Result::ok)
                .filter(|p| p.is_file() && !is_scratch_file(p))
                .collect(),
            Err(e) => {
                warn!("Invalid input pattern '{}': {}", pattern_str, e);
                continue;
            }
        };
        matches.sort();
        if let Some(found) = matches.pop() {
            return Some(found);
        }
    }
    None
}

// Editor lock files (`~$libro.xlsx`) and hidden files.
fn is_scratch_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.') || n.starts_with('~') || n.ends_with('~'))
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use tempfile::tempdir;

    #[test]
    fn csv_respects_quoted_commas_and_bom() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("datos.csv");
        fs::write(
            &path,
            "\u{feff}REGIÓN,SUPERFICIE (ha)\n\"Madre de Dios, sector norte\",\"1,250.5\"\n,\n",
        )
        .unwrap();

        let table = read_csv(&path).unwrap();
        assert_eq!(table.headers, vec!["REGIÓN", "SUPERFICIE (ha)"]);
        assert_eq!(table.len(), 1);
        let record = table.records().next().unwrap();
        assert_eq!(record.get("REGIÓN"), &Cell::Text("Madre de Dios, sector norte".into()));
        assert_eq!(record.get("SUPERFICIE (ha)"), &Cell::Text("1,250.5".into()));
    }

    #[test]
    fn semicolon_files_and_latin1_are_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin.csv");
        // "AÑO;VALOR" in Latin-1
        let mut bytes = b"A\xd1O;VALOR\n2023;10\n".to_vec();
        bytes.extend_from_slice(b"2024;12\n");
        fs::write(&path, bytes).unwrap();

        let table = read_csv(&path).unwrap();
        assert_eq!(table.headers, vec!["AÑO", "VALOR"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.column("Año"), Some(0));
    }

    #[test]
    fn missing_columns_read_as_empty() {
        let headers = vec!["ENTIDAD".to_string()];
        let cells = vec![Cell::Text("SERFOR".into())];
        let record = RawRecord { headers: &headers, cells: &cells };
        assert_eq!(record.get("ENLACE"), &Cell::Empty);
        assert_eq!(record.at(5), &Cell::Empty);
    }

    #[test]
    fn locate_prefers_latest_named_file_and_skips_lock_files() {
        let dir = tempdir().unwrap();
        for name in ["concesiones_2023.csv", "concesiones_2024.csv", "~concesiones_2025.csv"] {
            fs::write(dir.path().join(name), "A\n1\n").unwrap();
        }
        let found = locate_input(dir.path(), &["concesiones*.xlsx", "*concesiones*.csv"]).unwrap();
        assert_eq!(found.file_name().unwrap(), "concesiones_2024.csv");
        assert!(locate_input(dir.path(), &["plantaciones*.csv"]).is_none());
    }

    #[test]
    fn workbook_keeps_numeric_cells_as_numbers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("exportaciones_2024.xlsx");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, header) in ["AÑO", "PRODUCTO", "VALOR FOB (US$)"].iter().enumerate() {
            sheet.write_string(0, col as u16, *header).unwrap();
        }
        sheet.write_number(1, 0, 2023.0).unwrap();
        sheet.write_string(1, 1, "Pisos de madera").unwrap();
        sheet.write_number(1, 2, 1500.5).unwrap();
        sheet.write_string(3, 1, "Madera aserrada").unwrap();
        sheet.write_string(3, 2, "No Aplica").unwrap();
        workbook.save(&path).unwrap();

        let table = read_table(&path).unwrap();
        assert_eq!(table.headers, vec!["AÑO", "PRODUCTO", "VALOR FOB (US$)"]);
        // The blank third row is dropped.
        assert_eq!(table.len(), 2);
        let first = table.records().next().unwrap();
        assert_eq!(first.get("AÑO"), &Cell::Number(2023.0));
        assert_eq!(first.get("VALOR FOB (US$)"), &Cell::Number(1500.5));
        assert_eq!(first.get("PRODUCTO"), &Cell::Text("Pisos de madera".into()));
        let second = table.records().nth(1).unwrap();
        assert_eq!(second.get("AÑO"), &Cell::Empty);
        assert_eq!(second.get("VALOR FOB (US$)"), &Cell::Text("No Aplica".into()));
    }

    #[test]
    fn workbook_with_empty_first_sheet_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vacio.xlsx");
        let mut workbook = Workbook::new();
        workbook.add_worksheet();
        workbook.save(&path).unwrap();

        let err = read_table(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EtlError>(),
            Some(EtlError::EmptyWorkbook(_))
        ));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = read_table(Path::new("datos.json")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EtlError>(),
            Some(EtlError::UnsupportedFormat(_))
        ));
    }
}
