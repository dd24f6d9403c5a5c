// 🏗️ Raw Parser - CSV export → tagged raw cells
// Every coercion here is total: malformed input degrades, it never fails

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Columns that hold JSON-encoded arrays in the export
pub const JSON_ARRAY_COLUMNS: [&str; 8] = [
    "specialties",
    "phone_numbers",
    "websites",
    "procedure",
    "equipment",
    "capability",
    "affiliationTypeIds",
    "countries",
];

// ============================================================================
// RAW CELL
// ============================================================================

/// RawCell - one cell of the source export before any normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawCell {
    Missing,
    Text(String),
    Number(f64),
    List(Vec<String>),
}

impl RawCell {
    /// Build a cell from CSV text (empty → Missing)
    pub fn from_csv(field: &str) -> Self {
        if field.is_empty() {
            RawCell::Missing
        } else {
            RawCell::Text(field.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, RawCell::Missing)
    }

    /// Filled = list non-empty, text non-blank, number finite
    pub fn is_filled(&self) -> bool {
        match self {
            RawCell::Missing => false,
            RawCell::Text(s) => !s.trim().is_empty(),
            RawCell::Number(n) => n.is_finite(),
            RawCell::List(items) => !items.is_empty(),
        }
    }

    /// String representation used when picking the most informative duplicate
    pub fn display(&self) -> Option<String> {
        match self {
            RawCell::Missing => None,
            RawCell::Text(s) => Some(s.clone()),
            RawCell::Number(n) => Some(n.to_string()),
            RawCell::List(items) => serde_json::to_string(items).ok(),
        }
    }
}

impl Default for RawCell {
    fn default() -> Self {
        RawCell::Missing
    }
}

// ============================================================================
// COERCIONS
// ============================================================================

/// Decode an array-valued cell permissively
///
/// Missing/blank/`[]` → empty; a list passes through; JSON arrays are
/// stringified element by element; any other JSON value or undecodable
/// text becomes a single element.
pub fn parse_list(cell: &RawCell) -> Vec<String> {
    match cell {
        RawCell::Missing => Vec::new(),
        RawCell::List(items) => items.clone(),
        RawCell::Number(n) => vec![n.to_string()],
        RawCell::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed == "[]" {
                return Vec::new();
            }

            match serde_json::from_str::<serde_json::Value>(trimmed) {
                Ok(serde_json::Value::Array(values)) => values
                    .into_iter()
                    .filter(|v| !v.is_null())
                    .map(json_to_string)
                    .collect(),
                Ok(other) => vec![json_to_string(other)],
                Err(_) => vec![text.clone()],
            }
        }
    }
}

fn json_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Trimmed, non-blank text
pub fn as_text(cell: &RawCell) -> Option<String> {
    let text = match cell {
        RawCell::Missing => return None,
        RawCell::Text(s) => s.trim().to_string(),
        RawCell::Number(n) if n.is_finite() => n.to_string(),
        RawCell::Number(_) => return None,
        RawCell::List(items) => items.join(", "),
    };

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Finite float, from a number or numeric text
pub fn as_float(cell: &RawCell) -> Option<f64> {
    let value = match cell {
        RawCell::Number(n) => *n,
        RawCell::Text(s) => s.trim().parse::<f64>().ok()?,
        RawCell::Missing | RawCell::List(_) => return None,
    };

    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

/// Integer via float parsing ("1998.0" → 1998), truncated toward zero
pub fn as_int(cell: &RawCell) -> Option<i64> {
    let value = as_float(cell)?;
    if value.abs() > i64::MAX as f64 {
        return None;
    }
    Some(value.trunc() as i64)
}

// ============================================================================
// RAW TABLE
// ============================================================================

/// RawRecord - one source row keyed by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    /// 1-based data row number in the source file (header excluded)
    pub row_number: usize,
    cells: HashMap<String, RawCell>,
}

impl RawRecord {
    pub fn new(row_number: usize) -> Self {
        RawRecord {
            row_number,
            cells: HashMap::new(),
        }
    }

    /// Builder pattern: set a cell
    pub fn with(mut self, column: &str, cell: RawCell) -> Self {
        self.set(column, cell);
        self
    }

    pub fn set(&mut self, column: &str, cell: RawCell) {
        self.cells.insert(column.to_string(), cell);
    }

    /// Cell for a column; absent columns read as Missing
    pub fn get(&self, column: &str) -> &RawCell {
        const MISSING: &RawCell = &RawCell::Missing;
        self.cells.get(column).unwrap_or(MISSING)
    }

    pub fn text(&self, column: &str) -> Option<String> {
        as_text(self.get(column))
    }

    pub fn list(&self, column: &str) -> Vec<String> {
        parse_list(self.get(column))
    }

    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.cells.keys()
    }

    /// Replace each present column's cell with its decoded list
    pub fn decode_lists(&mut self, columns: &[&str]) {
        for column in columns {
            if let Some(cell) = self.cells.get_mut(*column) {
                *cell = RawCell::List(parse_list(cell));
            }
        }
    }
}

/// RawTable - header + rows of the source export
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<RawRecord>,
}

impl RawTable {
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())
            .with_context(|| format!("Failed to open CSV: {:?}", path.as_ref()))?;
        Self::from_csv_reader(file)
            .with_context(|| format!("Failed to parse CSV: {:?}", path.as_ref()))
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let columns: Vec<String> = rdr
            .headers()
            .context("Failed to read CSV header")?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for (i, result) in rdr.records().enumerate() {
            let record = result.with_context(|| format!("Failed to read CSV row {}", i + 1))?;

            let mut row = RawRecord::new(i + 1);
            for (col_idx, column) in columns.iter().enumerate() {
                // Short rows pad with Missing
                let cell = record
                    .get(col_idx)
                    .map(RawCell::from_csv)
                    .unwrap_or_default();
                row.set(column, cell);
            }
            rows.push(row);
        }

        Ok(RawTable { columns, rows })
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
