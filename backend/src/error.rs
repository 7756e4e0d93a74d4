//! Error types for the CDE data model converter.
//!
//! This module defines one error type per layer:
//!
//! - [`DataModelError`] - Every user-input violation (codec, conversion, validation)
//! - [`ConversionError`] - Table <-> tree conversion failures
//! - [`TableError`] - Spreadsheet / CSV reading errors
//! - [`PipelineError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP layer errors
//! - [`ConfigError`] - Environment configuration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries. Every message names the
//! offending entity (variable code, group path, row line or raw text) because
//! the message is the only feedback the end user gets.

use thiserror::Error;

// =============================================================================
// Data Model Errors
// =============================================================================

/// A violation of the data model contract, found while parsing, converting or
/// validating either representation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataModelError {
    /// Malformed enumeration list.
    #[error(
        "Nominal values format error: '{{\"code\", \"label\"}}, {{\"code\", \"label\"}}' expected but got {0}."
    )]
    EnumerationFormat(String),

    /// Malformed numeric range.
    #[error("Values must match format '<float or integer>-<float or integer>' but got '{0}'.")]
    RangeFormat(String),

    /// Range bounds are not strictly increasing.
    #[error("Min value must be smaller than max value at {location}")]
    RangeOrder { location: String },

    /// Range bounds do not fit the declared numeric type.
    #[error("Range values for variable {code} must be valid {value_type} numbers")]
    TypeConversion { code: String, value_type: String },

    /// `type` is not one of the recognized kinds.
    #[error("Invalid 'type' '{found}' at {location}. Valid types: nominal, real, integer, text")]
    InvalidType { found: String, location: String },

    /// A required field is absent.
    #[error("Missing '{field}' in {location}")]
    MissingField { field: String, location: String },

    /// A required string field is present but empty.
    #[error("'{field}' in DataModel must be a non-empty string")]
    EmptyField { field: String },

    /// A required list is missing or empty.
    #[error("'{field}' in DataModel must be a non-empty list of dictionaries")]
    EmptyList { field: String },

    /// A list that must contain objects contains something else.
    #[error("'{field}' in {location} must contain only dictionaries")]
    NonObjectEntry { field: String, location: String },

    /// `sql_type` / `isCategorical` disagree with `type`.
    #[error(
        "Mismatch in 'sql_type' or 'isCategorical' for type '{value_type}' in CommonDataElement at '{path}'. Expected ('{expected_sql_type}', {expected_categorical})"
    )]
    TypeMismatch {
        value_type: String,
        path: String,
        expected_sql_type: String,
        expected_categorical: bool,
    },

    /// A nominal row has no `values` cell.
    #[error("The 'values' should not be empty for variable {code} when type is 'nominal'")]
    MissingValues { code: String },

    /// A categorical CDE has no enumerations.
    #[error("Missing 'enumerations' for categorical CommonDataElement at '{path}'")]
    MissingEnumerations { path: String },

    /// Two sibling groups share a code.
    #[error("Duplicate Group code '{code}' found at '{path}'")]
    DuplicateGroup { code: String, path: String },

    /// Two CDEs anywhere in the tree share a code.
    #[error("Duplicate CommonDataElement code '{code}' found in Group '{group}' at '{path}'")]
    DuplicateCde {
        code: String,
        group: String,
        path: String,
    },

    /// Two enumeration entries of one list share a code.
    #[error("Duplicate codes found in enumeration values: '{code}' in {values}")]
    DuplicateEnumerationCode { code: String, values: String },

    /// No `dataset` CDE of shape (text, categorical) anywhere in the tree.
    #[error("The data model must always contain a dataset CommonDataElement")]
    MissingDataset,

    /// A longitudinal data model lacks `subjectid` or `visitid`.
    #[error("Missing '{code}' for a longitudinal study at 'DataModel'")]
    MissingLongitudinalCde { code: String },

    /// A row has no usable conceptPath.
    #[error("The variable {code} is missing the conceptPath")]
    MissingConceptPath { code: String },

    /// A conceptPath does not follow the `segment/segment/...` grammar.
    #[error("ConceptPath format error: 'characters/characters/...' expected but got '{path}' for variable {code}.")]
    ConceptPathFormat { path: String, code: String },

    /// A required column is empty in some row.
    #[error("Missing value for required column '{column}' at line {line}.")]
    MissingRequiredColumn { column: String, line: usize },

    /// The header row is not the canonical column set.
    #[error("Mismatch in table columns. Missing columns: {missing}. Unexpected columns: {unexpected}.")]
    ColumnMismatch { missing: String, unexpected: String },

    /// Two header cells name the same column, aliases included.
    #[error("Duplicate table column '{column}'.")]
    DuplicateColumn { column: String },

    /// The tree nests deeper than the walker allows.
    #[error("Group nesting deeper than {limit} levels at '{path}'")]
    NestingTooDeep { limit: usize, path: String },
}

// =============================================================================
// Conversion Errors
// =============================================================================

/// Errors converting between the tabular and tree forms.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// A row could not be turned into a variable; the whole conversion aborts.
    #[error("Error processing variable: {0}")]
    Variable(DataModelError),

    /// The JSON tree could not be decoded into a data model.
    #[error("Malformed data model: {0}")]
    Malformed(String),
}

impl ConversionError {
    /// The underlying data model violation, if any.
    pub fn data_model_error(&self) -> Option<&DataModelError> {
        match self {
            Self::Variable(e) => Some(e),
            Self::Malformed(_) => None,
        }
    }
}

// =============================================================================
// Table Reading Errors
// =============================================================================

/// Errors reading a spreadsheet or CSV file into a table.
#[derive(Debug, Error)]
pub enum TableError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to decode the file content.
    #[error("Failed to decode content as {0}")]
    EncodingError(String),

    /// Invalid CSV content.
    #[error("Invalid CSV format: {0}")]
    CsvError(#[from] csv::Error),

    /// Invalid spreadsheet content.
    #[error("Invalid spreadsheet: {0}")]
    SpreadsheetError(String),

    /// Failed to write a spreadsheet.
    #[error("Failed to write spreadsheet: {0}")]
    WriteError(#[from] rust_xlsxwriter::XlsxError),

    /// Empty file.
    #[error("Table file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in table")]
    NoHeaders,
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by the functions in
/// [`crate::transform::pipeline`]. It wraps all lower-level errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Table reading error.
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    /// Conversion error.
    #[error("{0}")]
    Conversion(#[from] ConversionError),

    /// Validation error.
    #[error("{0}")]
    Invalid(#[from] DataModelError),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether the failure was caused by the caller's input rather than the
    /// environment.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::Table(TableError::WriteError(_)))
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("{0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors loading the server configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// An environment variable holds an unparsable value.
    #[error("Invalid value '{value}' for {var}")]
    InvalidValue { var: String, value: String },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for data model operations.
pub type DataModelResult<T> = Result<T, DataModelError>;

/// Result type for conversion operations.
pub type ConversionResult<T> = Result<T, ConversionError>;

/// Result type for table reading.
pub type TableResult<T> = Result<T, TableError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // TableError -> PipelineError
        let table_err = TableError::EmptyFile;
        let pipeline_err: PipelineError = table_err.into();
        assert!(pipeline_err.to_string().contains("empty"));

        // ConversionError -> PipelineError keeps the variable prefix
        let conversion_err = ConversionError::Variable(DataModelError::MissingConceptPath {
            code: "age".into(),
        });
        let pipeline_err: PipelineError = conversion_err.into();
        assert_eq!(
            pipeline_err.to_string(),
            "Error processing variable: The variable age is missing the conceptPath"
        );
    }

    #[test]
    fn test_enumeration_format_message() {
        let err = DataModelError::EnumerationFormat("Invalid format".into());
        assert_eq!(
            err.to_string(),
            "Nominal values format error: '{\"code\", \"label\"}, {\"code\", \"label\"}' expected but got Invalid format."
        );
    }

    #[test]
    fn test_messages_name_the_entity() {
        let err = DataModelError::DuplicateCde {
            code: "dataset".into(),
            group: "group".into(),
            path: "/DM001/group".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'dataset'"));
        assert!(msg.contains("/DM001/group"));

        let err = DataModelError::MissingRequiredColumn {
            column: "conceptPath".into(),
            line: 4,
        };
        assert!(err.to_string().contains("line 4"));
    }

    #[test]
    fn test_io_is_not_user_error() {
        let err: PipelineError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
        assert!(!err.is_user_error());
        let err: PipelineError = DataModelError::MissingDataset.into();
        assert!(err.is_user_error());
    }
}
