//! High-level pipeline API for table <-> data model conversion.
//!
//! This module provides easy-to-use functions that combine all steps:
//! reading, validation, conversion and encoding. Every step reports its
//! progress through the log broadcaster.
//!
//! # Example
//!
//! ```rust,no_run
//! use cde_datamodel::transform::pipeline::{convert_table_file, ConvertOptions};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let model = convert_table_file("datamodel.csv", &ConvertOptions::default())?;
//!     println!("{}", serde_json::to_string_pretty(&model)?);
//!     Ok(())
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::builder::table_to_tree;
use super::flatten::tree_to_table;
use crate::api::logs::{log_error, log_info, log_success};
use crate::error::{ConversionError, PipelineError, PipelineResult};
use crate::models::DataModel;
use crate::parser::{parse_table_bytes, parse_table_file, ParseResult, Table};
use crate::validation::{validate_data_model, validate_table};

/// Options for the conversion pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertOptions {
    /// Validate the input before converting it
    pub validate: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self { validate: true }
    }
}

// =============================================================================
// Table -> Data Model
// =============================================================================

/// Convert a table into a data model.
pub fn convert_table(table: &Table, options: &ConvertOptions) -> PipelineResult<DataModel> {
    if options.validate {
        check_table(table)?;
    }

    log_info("Building data model tree...");
    let model = table_to_tree(&table.rows()).map_err(|e| report(e.into()))?;
    log_success(format!(
        "Data model '{}' built with {} variables",
        model.code(),
        model.root.variable_count()
    ));
    Ok(model)
}

/// Convert uploaded table bytes (CSV or XLSX) into a data model.
pub fn convert_table_bytes(
    bytes: &[u8],
    filename: Option<&str>,
    options: &ConvertOptions,
) -> PipelineResult<DataModel> {
    let parsed = read_table(|| parse_table_bytes(bytes, filename))?;
    convert_table(&parsed.table, options)
}

/// Convert a table file (CSV or XLSX) into a data model.
pub fn convert_table_file<P: AsRef<Path>>(
    path: P,
    options: &ConvertOptions,
) -> PipelineResult<DataModel> {
    let parsed = read_table(|| parse_table_file(path))?;
    convert_table(&parsed.table, options)
}

// =============================================================================
// Data Model -> Table
// =============================================================================

/// Convert a JSON data model into a table.
///
/// The model is validated on its loose JSON form first (when enabled), then
/// decoded into the typed tree and flattened.
pub fn convert_model(value: &Value, options: &ConvertOptions) -> PipelineResult<Table> {
    if options.validate {
        check_model(value)?;
    }

    log_info("Flattening data model...");
    let model: DataModel = serde_json::from_value(value.clone())
        .map_err(|e| report(ConversionError::Malformed(e.to_string()).into()))?;
    let rows = tree_to_table(&model);
    log_success(format!("{} rows written", rows.len()));
    Ok(Table::from_rows(&rows))
}

/// Convert a JSON data model file into a table.
pub fn convert_model_file<P: AsRef<Path>>(
    path: P,
    options: &ConvertOptions,
) -> PipelineResult<Table> {
    let value = read_model_file(path)?;
    convert_model(&value, options)
}

// =============================================================================
// Validation only
// =============================================================================

/// Validate a table, logging the outcome.
pub fn check_table(table: &Table) -> PipelineResult<()> {
    log_info("Validating table...");
    validate_table(table).map_err(|e| report(e.into()))?;
    log_success("Table is valid");
    Ok(())
}

/// Validate a JSON data model, logging the outcome.
pub fn check_model(value: &Value) -> PipelineResult<()> {
    log_info("Validating data model...");
    validate_data_model(value).map_err(|e| report(e.into()))?;
    log_success("Data model is valid");
    Ok(())
}

/// Read and validate uploaded table bytes.
pub fn check_table_bytes(bytes: &[u8], filename: Option<&str>) -> PipelineResult<()> {
    let parsed = read_table(|| parse_table_bytes(bytes, filename))?;
    check_table(&parsed.table)
}

/// Read and validate a table file.
pub fn check_table_file<P: AsRef<Path>>(path: P) -> PipelineResult<()> {
    let parsed = read_table(|| parse_table_file(path))?;
    check_table(&parsed.table)
}

/// Read and validate a JSON data model file.
pub fn check_model_file<P: AsRef<Path>>(path: P) -> PipelineResult<()> {
    check_model(&read_model_file(path)?)
}

// =============================================================================
// Helpers
// =============================================================================

fn read_table(
    parse: impl FnOnce() -> crate::error::TableResult<ParseResult>,
) -> PipelineResult<ParseResult> {
    log_info("Reading table...");
    let parsed = parse().map_err(|e| report(e.into()))?;
    log_success(format!("Detected format: {}", parsed.format));
    log_success(format!(
        "Read {} rows, {} columns",
        parsed.table.len(),
        parsed.table.headers.len()
    ));
    Ok(parsed)
}

/// Read a JSON file into a loose value.
pub fn read_model_file<P: AsRef<Path>>(path: P) -> PipelineResult<Value> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| report(e.into()))
}

/// Broadcast a failure before handing it back to the caller.
fn report(error: PipelineError) -> PipelineError {
    log_error(error.to_string());
    error
}
