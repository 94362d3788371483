//! CSV loader for the two customer extracts

use crate::error::{Error, Result};
use crate::table::{CellValue, Column, Row, Table};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Load both extracts, failing with `SourceNotFound` on the first one that is
/// missing or cannot be opened for reading.
///
/// Both files are opened before either is parsed.
pub fn load_sources<P: AsRef<Path>, Q: AsRef<Path>>(source1: P, source2: Q) -> Result<(Table, Table)> {
    let (source1, source2) = (source1.as_ref(), source2.as_ref());

    let file1 = open_source(source1)?;
    let file2 = open_source(source2)?;

    let first = parse_file(file1, source1)?;
    let second = parse_file(file2, source2)?;
    Ok((first, second))
}

/// Parse a CSV file into a Table
pub fn parse_csv<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_file(file, path)
}

fn open_source(path: &Path) -> Result<File> {
    if !path.is_file() {
        return Err(Error::SourceNotFound {
            path: path.to_path_buf(),
        });
    }
    File::open(path).map_err(|e| {
        warn!(path = %path.display(), error = %e, "source file exists but cannot be opened");
        Error::SourceNotFound {
            path: path.to_path_buf(),
        }
    })
}

fn parse_file(file: File, path: &Path) -> Result<Table> {
    let table = read_table(BufReader::new(file), path.to_path_buf())?;
    info!(
        path = %path.display(),
        rows = table.row_count(),
        columns = table.column_count(),
        "loaded source table"
    );
    Ok(table)
}

/// Parse CSV from a string (useful for testing)
pub fn parse_csv_str(content: &str, source_name: &str) -> Result<Table> {
    read_table(content.as_bytes(), PathBuf::from(source_name))
}

fn read_table<R: Read>(reader: R, path: PathBuf) -> Result<Table> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // Allow varying number of fields
        .from_reader(reader);

    let headers = csv_reader.headers().map_err(|e| Error::Csv {
        path: path.clone(),
        source: e,
    })?;

    let columns: Vec<Column> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| Column::new(name.to_string(), i))
        .collect();

    if columns.iter().all(|c| c.name.trim().is_empty()) {
        return Err(Error::CsvParse {
            path,
            message: "no columns found in CSV".to_string(),
        });
    }

    let mut rows = Vec::new();
    for (row_idx, result) in csv_reader.records().enumerate() {
        let record = result.map_err(|e| Error::Csv {
            path: path.clone(),
            source: e,
        })?;

        let mut cells: Vec<CellValue> = record.iter().map(CellValue::parse).collect();

        // Pad with empty cells if row is shorter than header
        if cells.len() < columns.len() {
            cells.resize(columns.len(), CellValue::Empty);
        }

        if cells.len() > columns.len() {
            warn!(
                row = row_idx + 1,
                path = %path.display(),
                "row has more cells than columns, truncating"
            );
            cells.truncate(columns.len());
        }

        rows.push(Row::new(cells));
    }

    Ok(Table {
        columns,
        rows,
        source_path: path,
    })
}
