//! Post-mapping validation of the output contract

use crate::crypto::is_sealed;
use crate::error::{Error, Result};
use crate::table::{CellValue, Table};
use serde::{Deserialize, Serialize};
use tracing::error;

/// A post-condition every output record must meet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rule {
    /// `email` carries the encryption marker
    EmailEncrypted,
    /// `gender` is `m` or `f`
    GenderKnown,
    /// `opted_in` is a boolean
    OptedInBoolean,
}

impl Rule {
    /// Column the rule inspects
    pub fn column(self) -> &'static str {
        match self {
            Rule::EmailEncrypted => "email",
            Rule::GenderKnown => "gender",
            Rule::OptedInBoolean => "opted_in",
        }
    }

    fn holds(self, value: &CellValue) -> bool {
        match self {
            Rule::EmailEncrypted => value.as_text().is_some_and(is_sealed),
            Rule::GenderKnown => matches!(value.as_text(), Some("m" | "f")),
            Rule::OptedInBoolean => matches!(value, CellValue::Bool(_)),
        }
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rule::EmailEncrypted => write!(f, "email is not encrypted"),
            Rule::GenderKnown => write!(f, "gender is not 'm' or 'f'"),
            Rule::OptedInBoolean => write!(f, "opted_in is not a boolean"),
        }
    }
}

const RULES: [Rule; 3] = [Rule::EmailEncrypted, Rule::GenderKnown, Rule::OptedInBoolean];

/// A single broken rule on a single record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Row index in the mapped table
    pub row: usize,
    /// The record's `external_id`
    pub external_id: String,
    /// Rule broken
    pub rule: Rule,
    /// Offending value
    pub value: String,
}

/// All violations found in a mapped table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub checked: usize,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Number of distinct rows with at least one violation
    pub fn invalid_rows(&self) -> usize {
        let mut rows: Vec<usize> = self.violations.iter().map(|v| v.row).collect();
        rows.dedup();
        rows.len()
    }
}

/// Check every record of the mapped table against every rule
pub fn validate(table: &Table) -> Result<ValidationReport> {
    let id_idx = table.require_column("external_id")?;
    let checks: Vec<(Rule, usize)> = RULES
        .iter()
        .map(|&rule| table.require_column(rule.column()).map(|idx| (rule, idx)))
        .collect::<Result<_>>()?;

    let mut report = ValidationReport {
        checked: table.row_count(),
        violations: Vec::new(),
    };

    for (row_idx, row) in table.rows.iter().enumerate() {
        for &(rule, idx) in &checks {
            let value = row.get(idx).unwrap_or(&CellValue::Empty);
            if !rule.holds(value) {
                report.violations.push(Violation {
                    row: row_idx,
                    external_id: row.get(id_idx).map(CellValue::to_string_value).unwrap_or_default(),
                    rule,
                    value: value.to_string_value(),
                });
            }
        }
    }

    Ok(report)
}

/// Validate and fail the run if any record is invalid, logging every violation
pub fn ensure_valid(table: &Table) -> Result<ValidationReport> {
    let report = validate(table)?;
    if report.is_valid() {
        return Ok(report);
    }

    for v in &report.violations {
        error!(
            row = v.row,
            external_id = %v.external_id,
            column = v.rule.column(),
            value = %v.value,
            "invalid record: {}",
            v.rule
        );
    }

    Err(Error::InvalidRecordFound {
        count: report.invalid_rows(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::output_columns;
    use crate::table::Row;
    use std::path::PathBuf;

    fn record(id: &str, email: CellValue, gender: &str, opted_in: CellValue) -> Row {
        let mut cells = vec![CellValue::Empty; output_columns().len()];
        cells[0] = CellValue::from(id);
        cells[1] = opted_in;
        cells[3] = email;
        cells[12] = CellValue::from(gender);
        Row::new(cells)
    }

    fn table(rows: Vec<Row>) -> Table {
        let mut table = Table::with_columns(PathBuf::from("mapped"), output_columns());
        table.rows = rows;
        table
    }

    fn sealed() -> CellValue {
        CellValue::from("abc**ENC**")
    }

    #[test]
    fn test_valid_records_pass() {
        let t = table(vec![
            record("A", sealed(), "m", CellValue::Bool(true)),
            record("B", sealed(), "f", CellValue::Bool(false)),
        ]);

        let report = ensure_valid(&t).unwrap();
        assert!(report.is_valid());
        assert_eq!(report.checked, 2);
    }

    #[test]
    fn test_single_bad_gender_fails_whole_batch() {
        let t = table(vec![
            record("A", sealed(), "m", CellValue::Bool(true)),
            record("B", sealed(), "x", CellValue::Bool(true)),
            record("C", sealed(), "f", CellValue::Bool(true)),
        ]);

        match ensure_valid(&t).unwrap_err() {
            Error::InvalidRecordFound { count } => assert_eq!(count, 1),
            other => panic!("unexpected error: {other}"),
        }

        let report = validate(&t).unwrap();
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].external_id, "B");
        assert_eq!(report.violations[0].rule, Rule::GenderKnown);
        assert_eq!(report.violations[0].value, "x");
    }

    #[test]
    fn test_invalid_gender_label_is_rejected() {
        let t = table(vec![record("A", sealed(), "invalid", CellValue::Bool(true))]);
        assert!(!validate(&t).unwrap().is_valid());
    }

    #[test]
    fn test_every_broken_rule_is_reported() {
        let t = table(vec![record("A", CellValue::from("a@example.com"), "", CellValue::from("yes"))]);

        let report = validate(&t).unwrap();
        let rules: Vec<Rule> = report.violations.iter().map(|v| v.rule).collect();
        assert_eq!(rules, RULES.to_vec());
        assert_eq!(report.invalid_rows(), 1);
    }

    #[test]
    fn test_missing_email_is_invalid() {
        let t = table(vec![record("A", CellValue::Empty, "f", CellValue::Bool(true))]);
        let report = validate(&t).unwrap();
        assert_eq!(report.violations[0].rule, Rule::EmailEncrypted);
    }

    #[test]
    fn test_validate_requires_contract_columns() {
        let t = Table::with_columns(PathBuf::from("mapped"), ["external_id", "email"]);
        assert!(matches!(validate(&t), Err(Error::MissingColumn { .. })));
    }
}
