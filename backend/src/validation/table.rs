//! Validation of the tabular representation.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{DataModelError, DataModelResult};
use crate::models::{canonical_column, ValueType, REQUIRED_COLUMNS, TABLE_COLUMNS};
use crate::parser::Table;
use crate::transform::codec::{duplicate_enumeration_code, parse_enumerations, parse_ordered_range};
use crate::transform::row::Row;

/// `segment/segment/...`, no empty segment.
static CONCEPT_PATH_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^/]+(/[^/]+)*$").expect("valid concept path pattern"));

/// Validate headers, then every row in order. The first violation wins.
pub fn validate_table(table: &Table) -> DataModelResult<()> {
    check_columns(&table.headers)?;
    table.rows().iter().try_for_each(check_row)
}

/// The headers must name every canonical column exactly once, `unit` and
/// `units` counting as the same column. Blank header cells (trailing
/// separators) are ignored.
fn check_columns(headers: &[String]) -> DataModelResult<()> {
    let mut found = BTreeSet::new();
    for header in headers.iter().map(|h| canonical_column(h.trim())) {
        if header.is_empty() {
            continue;
        }
        if !found.insert(header) {
            return Err(DataModelError::DuplicateColumn {
                column: header.into(),
            });
        }
    }

    let missing: Vec<&str> = TABLE_COLUMNS
        .iter()
        .copied()
        .filter(|c| !found.contains(c))
        .collect();
    let unexpected: Vec<&str> = found
        .iter()
        .copied()
        .filter(|h| !TABLE_COLUMNS.contains(h))
        .collect();

    if missing.is_empty() && unexpected.is_empty() {
        return Ok(());
    }
    Err(DataModelError::ColumnMismatch {
        missing: list_or_none(&missing),
        unexpected: list_or_none(&unexpected),
    })
}

fn list_or_none(columns: &[&str]) -> String {
    if columns.is_empty() {
        "none".to_string()
    } else {
        columns.join(", ")
    }
}

fn check_row(row: &Row) -> DataModelResult<()> {
    for column in REQUIRED_COLUMNS {
        if row.get(column).is_none() {
            return Err(DataModelError::MissingRequiredColumn {
                column: column.into(),
                line: row.line,
            });
        }
    }

    let raw_type = row.value_type.as_deref().unwrap_or_default();
    let value_type = ValueType::from_code(raw_type).ok_or_else(|| DataModelError::InvalidType {
        found: raw_type.into(),
        location: row.describe(),
    })?;
    let code = row.code.as_deref().unwrap_or_default();

    match (value_type, row.values.as_deref()) {
        (ValueType::Nominal, None) => {
            return Err(DataModelError::MissingValues { code: code.into() });
        }
        (ValueType::Nominal, Some(values)) => {
            let enumerations = parse_enumerations(values)?;
            if let Some(duplicate) = duplicate_enumeration_code(&enumerations) {
                return Err(DataModelError::DuplicateEnumerationCode {
                    code: duplicate.into(),
                    values: values.into(),
                });
            }
        }
        (ValueType::Real | ValueType::Integer, Some(values)) => {
            parse_ordered_range(values).map_err(|e| match e {
                DataModelError::RangeOrder { location } => DataModelError::RangeOrder {
                    location: format!("{location} of {}", row.describe()),
                },
                other => other,
            })?;
        }
        _ => {}
    }

    let concept_path = row.concept_path.as_deref().unwrap_or_default();
    if !CONCEPT_PATH_PATTERN.is_match(concept_path) {
        return Err(DataModelError::ConceptPathFormat {
            path: concept_path.into(),
            code: code.into(),
        });
    }

    Ok(())
}
