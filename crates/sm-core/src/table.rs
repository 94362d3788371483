//! Core table types for customer extracts and the mapped output

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An in-memory table, either loaded from a CSV file or produced by a stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Column definitions
    pub columns: Vec<Column>,
    /// Row data, in source order
    pub rows: Vec<Row>,
    /// Source file path, or a stage label for derived tables
    pub source_path: PathBuf,
}

impl Table {
    /// Create an empty table with the given column names
    pub fn with_columns<I, S>(source_path: PathBuf, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Column::new(name.into(), i))
            .collect();
        Self {
            columns,
            rows: Vec::new(),
            source_path,
        }
    }

    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Find a column by name
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Index of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.find_column(name).map(|c| c.index)
    }

    /// Index of a column that a stage cannot run without
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| Error::MissingColumn {
            column: name.to_string(),
            table: self.source_path.display().to_string(),
        })
    }

    /// Column names in order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Remove a column and its cells. Returns false if the column was absent.
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(index) = self.column_index(name) else {
            return false;
        };

        self.columns.remove(index);
        for (i, col) in self.columns.iter_mut().enumerate() {
            col.index = i;
        }
        for row in &mut self.rows {
            if index < row.cells.len() {
                row.cells.remove(index);
            }
        }
        true
    }

    /// Get a cell by row index and column name
    pub fn value(&self, row: usize, column: &str) -> Option<&CellValue> {
        let index = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(index))
    }
}

/// A column definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name as it appears in the header
    pub name: String,
    /// Column index (0-based)
    pub index: usize,
}

impl Column {
    /// Create a new column
    pub fn new(name: String, index: usize) -> Self {
        Self { name, index }
    }
}

/// A row of data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Cell values for each column
    pub cells: Vec<CellValue>,
}

impl Row {
    /// Create a new row
    pub fn new(cells: Vec<CellValue>) -> Self {
        Self { cells }
    }

    /// Get a cell value by column index
    pub fn get(&self, index: usize) -> Option<&CellValue> {
        self.cells.get(index)
    }
}

/// A cell value with type detection
///
/// `Empty` is the no-data marker and serializes as an empty CSV field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    /// Integer value
    Integer(i64),
    /// Floating-point value
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// Text value
    Text(String),
    /// Empty/null cell
    Empty,
}

impl CellValue {
    /// Parse a string into a CellValue, detecting the type.
    ///
    /// Text is kept exactly as read, surrounding whitespace included. A field
    /// that is blank after trimming is `Empty`. Numbers are only detected when
    /// they render back to the same text, so ids like `007`, amounts like
    /// `2.50` and padded values like ` 42` stay text and export unchanged.
    pub fn parse(s: &str) -> Self {
        if s.trim().is_empty() {
            return CellValue::Empty;
        }

        if let Ok(i) = s.parse::<i64>() {
            if i.to_string() == s {
                return CellValue::Integer(i);
            }
        }

        if let Ok(f) = s.parse::<f64>() {
            if f.is_finite() && f.to_string() == s {
                return CellValue::Float(f);
            }
        }

        CellValue::Text(s.to_string())
    }

    /// Check if the cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Text content, if this is a text cell
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to a display string
    pub fn to_string_value(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Integer(i) => write!(f, "{}", i),
            CellValue::Float(fl) => write!(f, "{}", fl),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Empty => Ok(()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut table = Table::with_columns(PathBuf::from("t.csv"), ["id", "name", "pets"]);
        table.rows.push(Row::new(vec![
            CellValue::Integer(1),
            CellValue::from("Ann"),
            CellValue::from("cat"),
        ]));
        table.rows.push(Row::new(vec![
            CellValue::Integer(2),
            CellValue::from("Bob"),
            CellValue::Empty,
        ]));
        table
    }

    #[test]
    fn test_cell_value_parse_integer() {
        assert_eq!(CellValue::parse("42"), CellValue::Integer(42));
        assert_eq!(CellValue::parse("-123"), CellValue::Integer(-123));
        assert_eq!(CellValue::parse("0"), CellValue::Integer(0));
    }

    #[test]
    fn test_cell_value_parse_float() {
        assert_eq!(CellValue::parse("3.14"), CellValue::Float(3.14));
        assert_eq!(CellValue::parse("-2.5"), CellValue::Float(-2.5));
    }

    #[test]
    fn test_cell_value_parse_keeps_lossy_numbers_as_text() {
        assert_eq!(CellValue::parse("007"), CellValue::from("007"));
        assert_eq!(CellValue::parse("2.50"), CellValue::from("2.50"));
        assert_eq!(CellValue::parse("+1"), CellValue::from("+1"));
        assert_eq!(CellValue::parse("NaN"), CellValue::from("NaN"));
    }

    #[test]
    fn test_cell_value_parse_string() {
        assert_eq!(CellValue::parse("4903x34"), CellValue::from("4903x34"));
        assert_eq!(CellValue::parse("  Lee "), CellValue::from("  Lee "));
    }

    #[test]
    fn test_cell_value_parse_keeps_padded_numbers_as_text() {
        assert_eq!(CellValue::parse(" 42"), CellValue::from(" 42"));
        assert_eq!(CellValue::parse("1 "), CellValue::from("1 "));
        assert_eq!(CellValue::parse(" 42").to_string_value(), " 42");
    }

    #[test]
    fn test_cell_value_parse_empty() {
        assert_eq!(CellValue::parse(""), CellValue::Empty);
        assert_eq!(CellValue::parse("   "), CellValue::Empty);
    }

    #[test]
    fn test_cell_value_display() {
        assert_eq!(CellValue::Bool(true).to_string_value(), "true");
        assert_eq!(CellValue::Empty.to_string_value(), "");
        assert_eq!(CellValue::Integer(7).to_string_value(), "7");
    }

    #[test]
    fn test_drop_column_reindexes() {
        let mut table = sample();
        assert!(table.drop_column("name"));
        assert!(!table.drop_column("name"));

        assert_eq!(table.column_names(), vec!["id", "pets"]);
        assert_eq!(table.column_index("pets"), Some(1));
        assert_eq!(table.rows[0].cells.len(), 2);
        assert_eq!(table.value(0, "pets"), Some(&CellValue::from("cat")));
    }

    #[test]
    fn test_require_column_reports_table() {
        let table = sample();
        assert_eq!(table.require_column("name").unwrap(), 1);

        let err = table.require_column("email").unwrap_err();
        match err {
            Error::MissingColumn { column, table } => {
                assert_eq!(column, "email");
                assert_eq!(table, "t.csv");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
