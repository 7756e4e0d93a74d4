//! # CDE Data Model - spreadsheet <-> JSON converter and validator
//!
//! Converts Common Data Element (CDE) data models between a flat spreadsheet
//! (one row per variable, positioned by a slash-delimited `conceptPath`) and
//! a nested JSON tree of groups and variables, and validates both forms.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV/XLSX   │────▶│   Parser    │────▶│  Transform  │────▶│ Data model  │
//! │  (any enc)  │     │  (auto-enc) │     │ (row, tree) │     │   (JSON)    │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                            ▲                                       │
//!                            └──────────── flatten ◀─────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cde_datamodel::{convert_table_file, ConvertOptions};
//!
//! let model = convert_table_file("datamodel.xlsx", &ConvertOptions::default()).unwrap();
//! println!("{} variables", model.root.variable_count());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Domain models (CommonDataElement, Group, DataModel)
//! - [`parser`] - CSV/XLSX reading with auto-detection, XLSX/CSV writing
//! - [`transform`] - Codecs, row transcoding, tree building/flattening, pipeline
//! - [`validation`] - JSON tree and table validation
//! - [`config`] - Server configuration
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// Configuration
pub mod config;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, ConversionError, DataModelError, PipelineError, ServerError, TableError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    CdeKind, CommonDataElement, DataModel, Enumeration, Group, SqlType, ValueType,
};

// =============================================================================
// Re-exports - Conversion
// =============================================================================

pub use transform::{insert_variable, row_to_variable, table_to_tree, tree_to_table, variable_to_row, Row};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{validate_data_model, validate_table};

// =============================================================================
// Re-exports - Table I/O
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes_auto, parse_csv,
    parse_table_bytes, parse_table_file, parse_xlsx, OutputFormat, ParseResult, SourceFormat,
    Table,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    check_model, check_model_file, check_table, check_table_bytes, check_table_file,
    convert_model, convert_model_file, convert_table, convert_table_bytes, convert_table_file,
    ConvertOptions,
};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use config::ServerConfig;

// Server
pub mod server {
    pub use crate::api::server::{app, start_server};
}
