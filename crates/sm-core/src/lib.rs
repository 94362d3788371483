//! sm-core: Core library for building the SessionM customer import file
//!
//! This library provides functionality to:
//! - Load two customer extracts (CSV) into in-memory tables
//! - Collapse repeated ids in the first extract and outer join both extracts
//! - Map the merged records onto the fixed SessionM import schema
//! - Encrypt emails and validate every record against the contract
//! - Export the combined table as CSV

pub mod crypto;
pub mod error;
pub mod exporter;
pub mod loader;
pub mod mapper;
pub mod pipeline;
pub mod reconciler;
pub mod table;
pub mod validator;

pub use crypto::{Encryptor, SessionCipher, ENCRYPTION_MARKER};
pub use error::{Error, Result};
pub use exporter::{export_csv, export_to_writer, DEFAULT_OUTPUT};
pub use loader::{load_sources, parse_csv, parse_csv_str};
pub use mapper::{map_records, output_columns, FieldRule, FieldSource, Transform, OUTPUT_SCHEMA};
pub use pipeline::{build, run, PipelineConfig, RunReport, SourceSummary};
pub use reconciler::{deduplicate, outer_join, reconcile, CollisionStrategy, DedupReport, DEFAULT_SENTINEL};
pub use table::{CellValue, Column, Row, Table};
pub use validator::{ensure_valid, validate, Rule, ValidationReport, Violation};
