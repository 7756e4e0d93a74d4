//! Validation of both data model representations.
//!
//! - [`validate_data_model`]: the JSON tree, checked on its loose
//!   [`serde_json::Value`] form
//! - [`validate_table`]: the spreadsheet, header set then row by row
//!
//! Both stop at the first violation and report it as a
//! [`crate::error::DataModelError`].
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use cde_datamodel::validation::validate_data_model;
//!
//! let model = json!({
//!     "code": "DM",
//!     "version": "1.0",
//!     "label": "Data Model",
//!     "variables": [{
//!         "code": "dataset", "type": "nominal", "sql_type": "text",
//!         "isCategorical": true, "enumerations": [{"code": "d1", "label": "D1"}]
//!     }],
//!     "groups": [{"code": "empty"}]
//! });
//! assert!(validate_data_model(&model).is_ok());
//! ```

pub mod table;
pub mod tree;

pub use table::validate_table;
pub use tree::{validate_data_model, MAX_NESTING_DEPTH};
