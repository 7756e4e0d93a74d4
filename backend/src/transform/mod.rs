//! Transformation module.
//!
//! This module handles table <-> data model conversion:
//! - Codec: `values` column mini-languages (enumerations, ranges)
//! - Row: one table row <-> one variable
//! - Builder: rows folded into a tree by concept path
//! - Flatten: tree walked back into rows
//! - Pipeline: read, validate, convert, with progress logs

pub mod builder;
pub mod codec;
pub mod flatten;
pub mod pipeline;
pub mod row;

pub use builder::{insert_variable, table_to_tree};
pub use flatten::tree_to_table;
pub use pipeline::*;
pub use row::{row_to_variable, variable_to_row, Row};
