//! Canonical in-memory table built from a sheet's CSV export.
//!
//! Column 0 is always the record date. Rows keep their source order
//! (oldest first) and rows that are empty in every column are removed
//! before anything addresses columns by position.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::LoadError;

pub mod csv;
pub mod date;

pub use date::parse_lenient;

/// Index of the date/timestamp column.
pub const DATE_COLUMN: usize = 0;

/// One scalar cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        match parse_number(trimmed) {
            Some(n) => Cell::Number(n),
            None => Cell::Text(trimmed.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(n) => n.to_string(),
            Cell::Text(s) => s.clone(),
        }
    }
}

/// Numbers as a sheet displays them: optional trailing `%`, optional
/// thousands separators in their grouping positions.
fn parse_number(s: &str) -> Option<f64> {
    let s = s.strip_suffix('%').unwrap_or(s).trim();
    let value = if s.contains(',') {
        if !is_grouped(s) {
            return None;
        }
        s.replace(',', "").parse::<f64>().ok()?
    } else {
        s.parse::<f64>().ok()?
    };
    Some(value).filter(|v| v.is_finite())
}

/// `[-+]d{1,3}(,ddd)+(.d+)?`
fn is_grouped(s: &str) -> bool {
    let unsigned = s.strip_prefix(&['-', '+'][..]).unwrap_or(s);
    let (int, frac) = match unsigned.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (unsigned, None),
    };
    let all_digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
    if let Some(frac) = frac {
        if !all_digits(frac) {
            return false;
        }
    }
    let mut groups = int.split(',');
    let lead_ok = groups
        .next()
        .map_or(false, |g| all_digits(g) && g.len() <= 3);
    lead_ok && groups.all(|g| g.len() == 3 && all_digits(g))
}

/// A timestamped measurement snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    /// Parsed column 0; `None` when the cell is not a recognizable date.
    pub date: Option<NaiveDate>,
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(Cell::is_empty)
    }

    pub fn cell(&self, column: usize) -> Option<&Cell> {
        self.cells.get(column)
    }

    pub fn number(&self, column: usize) -> Option<f64> {
        self.cell(column).and_then(Cell::as_f64)
    }

    /// Short date label: the parsed date, else the first token of the raw cell.
    pub fn date_label(&self) -> Option<String> {
        if let Some(d) = self.date {
            return Some(d.format("%Y-%m-%d").to_string());
        }
        self.cell(DATE_COLUMN)
            .map(Cell::display)
            .and_then(|raw| raw.split_whitespace().next().map(str::to_string))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Self {
        Self { headers, rows }
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn latest(&self) -> Option<&Row> {
        self.rows.last()
    }

    pub fn previous(&self) -> Option<&Row> {
        self.rows.len().checked_sub(2).and_then(|i| self.rows.get(i))
    }

    pub fn header(&self, column: usize) -> Option<&str> {
        self.headers.get(column).map(String::as_str)
    }

    /// First column whose header contains `needle`, case-insensitively.
    pub fn column_containing(&self, needle: &str) -> Option<usize> {
        let needle = needle.to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.headers
            .iter()
            .position(|h| h.to_lowercase().contains(&needle))
    }

    /// Exact (trimmed) header match.
    pub fn column_named(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.headers.iter().position(|h| h.trim() == name)
    }

    /// Latest dated record, if any row carries a date.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.rows.iter().filter_map(|r| r.date).max()
    }

    /// Drop rows that are empty in every column. Idempotent.
    pub fn pruned(self) -> (Table, usize) {
        let before = self.rows.len();
        let rows: Vec<Row> = self.rows.into_iter().filter(|r| !r.is_blank()).collect();
        let removed = before - rows.len();
        (
            Table {
                headers: self.headers,
                rows,
            },
            removed,
        )
    }
}

/// Quality summary of one ingested sheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableReport {
    pub rows: usize,
    pub columns: Vec<String>,
    pub pruned_rows: usize,
    pub undated_rows: usize,
    pub ragged_rows: usize,
    pub date_min: Option<NaiveDate>,
    pub date_max: Option<NaiveDate>,
    pub hash_sha256: String,
    pub warnings: Vec<String>,
}

/// Parse a CSV export into a pruned table plus its quality report.
///
/// Rejects bodies that are not tabular (HTML login pages, empty bodies).
/// Row-level problems never fail the parse: short rows are padded, long
/// rows truncated, and bad dates become `None`.
pub fn parse_table(text: &str) -> Result<(Table, TableReport), LoadError> {
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    if trimmed.starts_with('<') {
        return Err(LoadError::NotTabular("markup instead of csv".to_string()));
    }

    let mut records = csv::parse_records(text)
        .into_iter()
        .skip_while(|r| r.iter().all(|f| f.trim().is_empty()));
    let headers: Vec<String> = match records.next() {
        Some(h) => h.into_iter().map(|s| s.trim().to_string()).collect(),
        None => return Err(LoadError::NotTabular("no header row".to_string())),
    };
    let width = headers.len();

    let mut warnings = Vec::new();
    let mut ragged_rows = 0usize;
    let mut rows = Vec::new();
    for (i, record) in records.enumerate() {
        if record.len() > width && record[width..].iter().any(|f| !f.trim().is_empty()) {
            ragged_rows += 1;
            warnings.push(format!("ragged_row: line {} has {} fields", i + 2, record.len()));
        }
        let mut cells: Vec<Cell> = record.iter().take(width).map(|f| Cell::parse(f)).collect();
        cells.resize(width, Cell::Empty);
        let date = record.first().and_then(|raw| parse_lenient(raw));
        rows.push(Row { date, cells });
    }

    let (table, pruned_rows) = Table::new(headers, rows).pruned();
    let undated_rows = table.rows.iter().filter(|r| r.date.is_none()).count();
    if undated_rows > 0 {
        warnings.push(format!("undated_rows: {}", undated_rows));
    }

    let report = TableReport {
        rows: table.len(),
        columns: table.headers.clone(),
        pruned_rows,
        undated_rows,
        ragged_rows,
        date_min: table.rows.iter().filter_map(|r| r.date).min(),
        date_max: table.latest_date(),
        hash_sha256: sha256_hex(text.as_bytes()),
        warnings,
    };
    Ok((table, report))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Report for a CSV export saved on disk.
pub fn analyze_file(path: &Path) -> Result<TableReport, String> {
    let text = fs::read_to_string(path).map_err(|e| e.to_string())?;
    parse_table(&text)
        .map(|(_, report)| report)
        .map_err(|e| e.to_string())
}

pub fn default_report_path(csv_path: &Path) -> PathBuf {
    let mut p = csv_path.to_path_buf();
    let fname = csv_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("sheet.csv");
    p.set_file_name(format!("{}.report.json", fname));
    p
}
