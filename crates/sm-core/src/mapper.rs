//! Field mapping from the merged extracts to the SessionM import schema
//!
//! The target contract is declared once in [`OUTPUT_SCHEMA`]: one rule per
//! output field, in output order, naming where the value comes from and how
//! it is transformed. [`map_records`] applies the row-level corrections that
//! must happen before renaming, then walks the schema for every row.

use crate::crypto::{seal, Encryptor};
use crate::error::Result;
use crate::table::{CellValue, Row, Table};
use chrono::{NaiveDate, NaiveDateTime};
use std::path::PathBuf;
use tracing::info;

/// First name whose gender code is always corrected to female
pub const FEMALE_OVERRIDE_NAME: &str = "Sandrine";

/// Merged columns with no counterpart in the target schema
pub const NOISE_COLUMNS: [&str; 4] = ["attr1_x", "engagement", "pets", "attr1_y"];

/// Gender label for codes other than 0 and 1
pub const INVALID_GENDER: &str = "invalid";

/// Output date layout for `custom_2`
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const DATE_LAYOUTS: [&str; 8] = [
    "%Y-%m-%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%m-%d-%Y",
    "%d %b %Y",
    "%b %d %Y",
    "%B %d, %Y",
];

const DATETIME_LAYOUTS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M"];

/// Value transformation applied to a source column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Copy the value unchanged
    Identity,
    /// `0` -> `m`, `1` -> `f`, anything else -> `invalid`
    GenderCode,
    /// Strip whitespace, encrypt, append the encryption marker
    SealEmail,
    /// Reformat a date as `YYYY-MM-DD`; unparseable values become empty
    IsoDate,
}

/// Where an output field gets its value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSource {
    /// A merged column, transformed
    Column {
        name: &'static str,
        transform: Transform,
    },
    /// The same value for every record
    Fixed(CellValue),
    /// Nothing upstream can fill this field
    NoData,
}

/// One field of the output contract
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    /// Output column name
    pub target: &'static str,
    /// Value source
    pub source: FieldSource,
}

const fn column(target: &'static str, name: &'static str, transform: Transform) -> FieldRule {
    FieldRule {
        target,
        source: FieldSource::Column { name, transform },
    }
}

const fn no_data(target: &'static str) -> FieldRule {
    FieldRule {
        target,
        source: FieldSource::NoData,
    }
}

/// The SessionM import contract, in output column order
pub static OUTPUT_SCHEMA: [FieldRule; 20] = [
    column("external_id", "id", Transform::Identity),
    FieldRule {
        target: "opted_in",
        source: FieldSource::Fixed(CellValue::Bool(true)),
    },
    no_data("external_id_type"),
    column("email", "email", Transform::SealEmail),
    no_data("locale"),
    no_data("ip"),
    no_data("dob"),
    no_data("address"),
    no_data("city"),
    no_data("state"),
    no_data("zip"),
    no_data("country"),
    column("gender", "sex", Transform::GenderCode),
    column("first_name", "first_name", Transform::Identity),
    column("last_name", "last_name", Transform::Identity),
    no_data("referral"),
    column("phone_numbers", "attr2", Transform::Identity),
    no_data("phone_type"),
    column("custom_1", "tier", Transform::Identity),
    column("custom_2", "lastcontact", Transform::IsoDate),
];

/// Output column names in contract order
pub fn output_columns() -> Vec<&'static str> {
    OUTPUT_SCHEMA.iter().map(|rule| rule.target).collect()
}

/// Map the merged table onto the output contract
pub fn map_records(mut merged: Table, encryptor: &dyn Encryptor) -> Result<Table> {
    let overridden = apply_gender_override(&mut merged)?;
    info!(rows = overridden, name = FEMALE_OVERRIDE_NAME, "applied gender override");

    let dropped = drop_noise_columns(&mut merged);
    info!(columns = ?dropped, "dropped noise columns");

    // Resolve every source column before touching any value
    let sources: Vec<Option<(usize, Transform)>> = OUTPUT_SCHEMA
        .iter()
        .map(|rule| match &rule.source {
            FieldSource::Column { name, transform } => {
                merged.require_column(name).map(|idx| Some((idx, *transform)))
            }
            _ => Ok(None),
        })
        .collect::<Result<_>>()?;

    let mut output = Table::with_columns(PathBuf::from("mapped"), output_columns());

    for row in &merged.rows {
        let mut cells = Vec::with_capacity(OUTPUT_SCHEMA.len());
        for (rule, source) in OUTPUT_SCHEMA.iter().zip(&sources) {
            let value = match (&rule.source, source) {
                (FieldSource::Column { .. }, Some((idx, transform))) => {
                    let cell = row.get(*idx).unwrap_or(&CellValue::Empty);
                    apply_transform(*transform, cell, encryptor)?
                }
                (FieldSource::Fixed(value), _) => value.clone(),
                _ => CellValue::Empty,
            };
            cells.push(value);
        }
        output.rows.push(Row::new(cells));
    }

    info!(rows = output.row_count(), columns = output.column_count(), "mapped records to output schema");
    Ok(output)
}

/// Force `sex` to `1` for every row whose first name is the override name.
/// Returns the number of rows changed.
pub fn apply_gender_override(table: &mut Table) -> Result<usize> {
    let name_idx = table.require_column("first_name")?;
    let sex_idx = table.require_column("sex")?;

    let mut count = 0;
    for row in &mut table.rows {
        if row.get(name_idx).and_then(CellValue::as_text) == Some(FEMALE_OVERRIDE_NAME) {
            row.cells[sex_idx] = CellValue::Integer(1);
            count += 1;
        }
    }
    Ok(count)
}

/// Drop the noise columns that are present, returning their names
pub fn drop_noise_columns(table: &mut Table) -> Vec<&'static str> {
    NOISE_COLUMNS
        .iter()
        .copied()
        .filter(|name| table.drop_column(name))
        .collect()
}

/// Apply one transform to a cell
pub fn apply_transform(transform: Transform, cell: &CellValue, encryptor: &dyn Encryptor) -> Result<CellValue> {
    Ok(match transform {
        Transform::Identity => cell.clone(),
        Transform::GenderCode => CellValue::from(recode_gender(cell)),
        Transform::SealEmail => match normalize_email(cell) {
            Some(email) => CellValue::Text(seal(encryptor, &email)?),
            None => CellValue::Empty,
        },
        Transform::IsoDate => match cell {
            CellValue::Empty => CellValue::Empty,
            other => parse_date(&other.to_string_value())
                .map(|d| CellValue::Text(d.format(DATE_FORMAT).to_string()))
                .unwrap_or(CellValue::Empty),
        },
    })
}

/// Gender label for a numeric code
pub fn recode_gender(cell: &CellValue) -> &'static str {
    match gender_code(cell) {
        Some(0) => "m",
        Some(1) => "f",
        _ => INVALID_GENDER,
    }
}

fn gender_code(cell: &CellValue) -> Option<i64> {
    let whole = |f: f64| (f.fract() == 0.0).then_some(f as i64);
    match cell {
        CellValue::Integer(i) => Some(*i),
        CellValue::Float(f) => whole(*f),
        CellValue::Text(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().and_then(whole))
        }
        CellValue::Bool(_) | CellValue::Empty => None,
    }
}

/// Email with every whitespace character removed, or None if nothing is left
pub fn normalize_email(cell: &CellValue) -> Option<String> {
    let email: String = cell
        .to_string_value()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    (!email.is_empty()).then_some(email)
}

/// Parse a contact date in any of the accepted layouts
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(value, layout).ok())
        .or_else(|| {
            DATETIME_LAYOUTS
                .iter()
                .find_map(|layout| NaiveDateTime::parse_from_str(value, layout).ok())
                .map(|dt| dt.date())
        })
}
