//! Reconciliation of the two extracts: key deduplication and outer join

use crate::error::Result;
use crate::table::{CellValue, Column, Row, Table};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing::info;

/// Join key shared by both extracts
pub const KEY_COLUMN: &str = "id";

/// Synthetic id that every repeated key in the first extract collapses into
pub const DEFAULT_SENTINEL: &str = "4903x34";

/// Suffix for non-key columns present in both extracts, first extract side
pub const LEFT_SUFFIX: &str = "_x";

/// Suffix for non-key columns present in both extracts, second extract side
pub const RIGHT_SUFFIX: &str = "_y";

/// How a repeated key in the first extract is rewritten
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollisionStrategy {
    /// Every repeat gets the same fixed id, so all of them join as one customer
    Sentinel(String),
    /// The n-th repeat of `X` becomes `X_n`, skipping ids already taken
    RegenerateUnique,
}

impl Default for CollisionStrategy {
    fn default() -> Self {
        CollisionStrategy::Sentinel(DEFAULT_SENTINEL.to_string())
    }
}

/// Outcome of deduplication
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupReport {
    /// Original key of each rewritten row, in row order
    pub rewritten: Vec<String>,
}

impl DedupReport {
    /// Number of rows whose id was rewritten
    pub fn count(&self) -> usize {
        self.rewritten.len()
    }
}

/// Rewrite every repeat of a key in `table`. The first occurrence keeps its id.
pub fn deduplicate(table: &mut Table, strategy: &CollisionStrategy) -> Result<DedupReport> {
    let key_idx = table.require_column(KEY_COLUMN)?;

    let mut taken: HashSet<String> = table
        .rows
        .iter()
        .map(|r| key_of(r, key_idx))
        .collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut repeats: HashMap<String, usize> = HashMap::new();
    let mut report = DedupReport::default();

    for row in &mut table.rows {
        let key = key_of(row, key_idx);
        if seen.insert(key.clone()) {
            continue;
        }

        let replacement = match strategy {
            CollisionStrategy::Sentinel(sentinel) => CellValue::Text(sentinel.clone()),
            CollisionStrategy::RegenerateUnique => {
                let n = repeats.entry(key.clone()).or_insert(0);
                let fresh = loop {
                    *n += 1;
                    let candidate = format!("{}_{}", key, n);
                    if !taken.contains(&candidate) {
                        break candidate;
                    }
                };
                taken.insert(fresh.clone());
                CellValue::Text(fresh)
            }
        };

        row.cells[key_idx] = replacement;
        report.rewritten.push(key);
    }

    info!(rewritten = report.count(), "deduplicated first source ids");
    Ok(report)
}

/// Full outer join of `left` and `right` on the key column.
///
/// Output columns are the key, the remaining left columns, then the remaining
/// right columns; names present on both sides get `_x`/`_y` suffixes. Rows are
/// each left row with its matches (in right order), then unmatched right rows.
pub fn outer_join(left: &Table, right: &Table) -> Result<Table> {
    let left_key = left.require_column(KEY_COLUMN)?;
    let right_key = right.require_column(KEY_COLUMN)?;

    let left_names: HashSet<&str> = left.columns.iter().map(|c| c.name.as_str()).collect();
    let right_names: HashSet<&str> = right.columns.iter().map(|c| c.name.as_str()).collect();

    let mut names: Vec<String> = vec![KEY_COLUMN.to_string()];
    let mut left_map: Vec<(usize, usize)> = Vec::new();
    let mut right_map: Vec<(usize, usize)> = Vec::new();

    for col in left.columns.iter().filter(|c| c.index != left_key) {
        let name = if right_names.contains(col.name.as_str()) {
            format!("{}{}", col.name, LEFT_SUFFIX)
        } else {
            col.name.clone()
        };
        left_map.push((col.index, names.len()));
        names.push(name);
    }
    for col in right.columns.iter().filter(|c| c.index != right_key) {
        let name = if left_names.contains(col.name.as_str()) {
            format!("{}{}", col.name, RIGHT_SUFFIX)
        } else {
            col.name.clone()
        };
        right_map.push((col.index, names.len()));
        names.push(name);
    }

    let columns: Vec<Column> = names
        .into_iter()
        .enumerate()
        .map(|(i, name)| Column::new(name, i))
        .collect();

    // Key -> right row indices, in right order
    let mut right_by_key: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, row) in right.rows.iter().enumerate() {
        right_by_key.entry(key_of(row, right_key)).or_default().push(i);
    }

    let width = columns.len();
    let mut matched_right = vec![false; right.rows.len()];
    let mut rows: Vec<Row> = Vec::new();

    for left_row in &left.rows {
        let key = key_of(left_row, left_key);
        let matches = right_by_key.get(&key).map(Vec::as_slice).unwrap_or(&[]);

        if matches.is_empty() {
            let mut cells = vec![CellValue::Empty; width];
            fill(&mut cells, left_row, left_key, &left_map);
            rows.push(Row::new(cells));
            continue;
        }

        for &ri in matches {
            matched_right[ri] = true;
            let mut cells = vec![CellValue::Empty; width];
            fill(&mut cells, left_row, left_key, &left_map);
            fill_values(&mut cells, &right.rows[ri], &right_map);
            rows.push(Row::new(cells));
        }
    }

    for (ri, right_row) in right.rows.iter().enumerate() {
        if matched_right[ri] {
            continue;
        }
        let mut cells = vec![CellValue::Empty; width];
        fill(&mut cells, right_row, right_key, &right_map);
        rows.push(Row::new(cells));
    }

    info!(
        left_rows = left.row_count(),
        right_rows = right.row_count(),
        merged_rows = rows.len(),
        columns = width,
        "outer joined sources"
    );

    Ok(Table {
        columns,
        rows,
        source_path: PathBuf::from("merged"),
    })
}

/// Deduplicate `first` with `strategy`, then outer join it with `second`
pub fn reconcile(
    mut first: Table,
    second: &Table,
    strategy: &CollisionStrategy,
) -> Result<(Table, DedupReport)> {
    let report = deduplicate(&mut first, strategy)?;
    let merged = outer_join(&first, second)?;
    Ok((merged, report))
}

fn key_of(row: &Row, key_idx: usize) -> String {
    row.get(key_idx).map(CellValue::to_string_value).unwrap_or_default()
}

fn fill(cells: &mut [CellValue], row: &Row, key_idx: usize, map: &[(usize, usize)]) {
    cells[0] = row.get(key_idx).cloned().unwrap_or(CellValue::Empty);
    fill_values(cells, row, map);
}

fn fill_values(cells: &mut [CellValue], row: &Row, map: &[(usize, usize)]) {
    for &(from, to) in map {
        if let Some(cell) = row.get(from) {
            cells[to] = cell.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::loader::parse_csv_str;

    fn ids(table: &Table) -> Vec<String> {
        let idx = table.column_index(KEY_COLUMN).unwrap();
        table.rows.iter().map(|r| r.cells[idx].to_string_value()).collect()
    }

    #[test]
    fn test_dedup_rewrites_second_occurrence_to_sentinel() {
        let mut table = parse_csv_str("id,first_name\nA,Ann\nA,Amy\nB,Bob\n", "c1.csv").unwrap();

        let report = deduplicate(&mut table, &CollisionStrategy::default()).unwrap();

        assert_eq!(ids(&table), vec!["A", DEFAULT_SENTINEL, "B"]);
        assert_eq!(report.rewritten, vec!["A".to_string()]);
    }

    #[test]
    fn test_dedup_collapses_all_repeats_into_one_sentinel() {
        let mut table = parse_csv_str("id,n\nA,1\nA,2\nB,3\nB,4\nA,5\n", "c1.csv").unwrap();

        let report = deduplicate(&mut table, &CollisionStrategy::default()).unwrap();

        assert_eq!(ids(&table), vec!["A", DEFAULT_SENTINEL, "B", DEFAULT_SENTINEL, DEFAULT_SENTINEL]);
        assert_eq!(report.count(), 3);
    }

    #[test]
    fn test_dedup_treats_blank_ids_as_equal() {
        let mut table = parse_csv_str("id,n\n,1\n,2\n", "c1.csv").unwrap();

        deduplicate(&mut table, &CollisionStrategy::default()).unwrap();

        assert_eq!(table.rows[0].cells[0], CellValue::Empty);
        assert_eq!(table.rows[1].cells[0], CellValue::from(DEFAULT_SENTINEL));
    }

    #[test]
    fn test_dedup_regenerate_unique_avoids_existing_ids() {
        let mut table = parse_csv_str("id,n\nA,1\nA_1,2\nA,3\nA,4\n", "c1.csv").unwrap();

        deduplicate(&mut table, &CollisionStrategy::RegenerateUnique).unwrap();

        assert_eq!(ids(&table), vec!["A", "A_1", "A_2", "A_3"]);
    }

    #[test]
    fn test_dedup_requires_id_column() {
        let mut table = parse_csv_str("key,n\nA,1\n", "c1.csv").unwrap();
        let err = deduplicate(&mut table, &CollisionStrategy::default()).unwrap_err();
        assert!(matches!(err, Error::MissingColumn { .. }));
    }

    #[test]
    fn test_outer_join_keeps_unmatched_rows_from_both_sides() {
        let left = parse_csv_str("id,first_name\nA,Ann\nB,Bob\n", "c1.csv").unwrap();
        let right = parse_csv_str("id,tier\nB,2\nC,3\n", "c2.csv").unwrap();

        let merged = outer_join(&left, &right).unwrap();

        assert_eq!(merged.column_names(), vec!["id", "first_name", "tier"]);
        assert_eq!(ids(&merged), vec!["A", "B", "C"]);
        assert_eq!(merged.value(0, "tier"), Some(&CellValue::Empty));
        assert_eq!(merged.value(1, "tier"), Some(&CellValue::Integer(2)));
        assert_eq!(merged.value(2, "first_name"), Some(&CellValue::Empty));
    }

    #[test]
    fn test_outer_join_every_id_appears_once() {
        let left = parse_csv_str("id,a\n1,x\n2,y\n3,z\n", "c1.csv").unwrap();
        let right = parse_csv_str("id,b\n3,p\n4,q\n1,r\n", "c2.csv").unwrap();

        let merged = outer_join(&left, &right).unwrap();
        let mut got = ids(&merged);
        got.sort();

        assert_eq!(got, vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn test_outer_join_padded_ids_do_not_match() {
        let left = parse_csv_str("id,first_name\nA1,Ann\n", "c1.csv").unwrap();
        let right = parse_csv_str("id,tier\n A1,2\n", "c2.csv").unwrap();

        let merged = outer_join(&left, &right).unwrap();

        assert_eq!(merged.row_count(), 2);
        assert_eq!(ids(&merged), vec!["A1", " A1"]);
        assert_eq!(merged.value(0, "tier"), Some(&CellValue::Empty));
        assert_eq!(merged.value(1, "first_name"), Some(&CellValue::Empty));
    }

    #[test]
    fn test_dedup_padded_ids_are_distinct() {
        let mut table = parse_csv_str("id,n\nA1,1\nA1 ,2\n", "c1.csv").unwrap();

        let report = deduplicate(&mut table, &CollisionStrategy::default()).unwrap();

        assert_eq!(report.count(), 0);
        assert_eq!(ids(&table), vec!["A1", "A1 "]);
    }

    #[test]
    fn test_outer_join_suffixes_shared_columns() {
        let left = parse_csv_str("id,attr1,email\nA,l,a@x.com\n", "c1.csv").unwrap();
        let right = parse_csv_str("id,attr1,pets\nA,r,dog\n", "c2.csv").unwrap();

        let merged = outer_join(&left, &right).unwrap();

        assert_eq!(merged.column_names(), vec!["id", "attr1_x", "email", "attr1_y", "pets"]);
        assert_eq!(merged.value(0, "attr1_x"), Some(&CellValue::from("l")));
        assert_eq!(merged.value(0, "attr1_y"), Some(&CellValue::from("r")));
    }

    #[test]
    fn test_outer_join_duplicate_keys_multiply() {
        let left = parse_csv_str("id,a\nS,1\nS,2\n", "c1.csv").unwrap();
        let right = parse_csv_str("id,b\nS,x\n", "c2.csv").unwrap();

        let merged = outer_join(&left, &right).unwrap();

        assert_eq!(merged.row_count(), 2);
        assert_eq!(merged.value(1, "b"), Some(&CellValue::from("x")));
    }

    #[test]
    fn test_reconcile_joins_sentinel_rows() {
        let first = parse_csv_str("id,first_name\nA,Ann\nA,Amy\n", "c1.csv").unwrap();
        let second = parse_csv_str(&format!("id,tier\nA,1\n{},2\n", DEFAULT_SENTINEL), "c2.csv").unwrap();

        let (merged, report) = reconcile(first, &second, &CollisionStrategy::default()).unwrap();

        assert_eq!(report.count(), 1);
        assert_eq!(merged.row_count(), 2);
        assert_eq!(merged.value(1, "first_name"), Some(&CellValue::from("Amy")));
        assert_eq!(merged.value(1, "tier"), Some(&CellValue::Integer(2)));
    }
}
