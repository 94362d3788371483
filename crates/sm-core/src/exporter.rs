//! CSV export of the validated output table

use crate::error::{Error, Result};
use crate::table::Table;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

/// Default name of the combined output file
pub const DEFAULT_OUTPUT: &str = "Combined_Customer_data.csv";

/// Write the table as CSV to any writer: header row, comma-delimited,
/// no row-index column, empty fields for missing values
pub fn export_to_writer<W: Write>(table: &Table, writer: W) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(b',')
        .has_headers(false)
        .from_writer(writer);

    csv_writer.write_record(table.columns.iter().map(|c| c.name.as_str()))?;
    for row in &table.rows {
        csv_writer.write_record(row.cells.iter().map(|c| c.to_string_value()))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Render the table in memory, write it to a temporary file next to `path`,
/// then rename it into place. A failed write never leaves a partial file at
/// `path`.
///
/// A destination that cannot be created or written is `OutputUnavailable`.
pub fn export_csv<P: AsRef<Path>>(table: &Table, path: P) -> Result<()> {
    let path = path.as_ref();

    let mut buffer = Vec::new();
    export_to_writer(table, &mut buffer)?;

    let unavailable = |source: std::io::Error| Error::OutputUnavailable {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = NamedTempFile::new_in(dir).map_err(unavailable)?;
    staged.write_all(&buffer).map_err(unavailable)?;
    staged.as_file().sync_all().map_err(unavailable)?;
    staged.persist(path).map_err(|e| unavailable(e.error))?;

    info!(path = %path.display(), rows = table.row_count(), bytes = buffer.len(), "exported combined customer data");
    Ok(())
}
