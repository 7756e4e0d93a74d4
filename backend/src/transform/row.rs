//! Row <-> variable transcoding.
//!
//! A [`Row`] is one line of the spreadsheet with its canonical columns as
//! typed optional cells. [`row_to_variable`] turns it into a
//! [`CommonDataElement`], resolving the `values` cell according to the
//! declared type; [`variable_to_row`] is the inverse.

use serde::{Deserialize, Serialize};

use super::codec::{
    parse_enumerations, parse_integer_range, parse_real_range, serialize_enumerations,
    serialize_range,
};
use crate::error::{DataModelError, DataModelResult};
use crate::models::{canonical_column, CdeKind, CommonDataElement, ValueType, TABLE_COLUMNS};

/// One tabular record. Absent cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    /// 1-based spreadsheet line (the header is line 1). Zero when the row was
    /// not read from a file.
    #[serde(skip)]
    pub line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_be_null: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methodology: Option<String>,
}

impl Row {
    /// Build a row from a header line and one record of cells.
    ///
    /// Headers are matched on their canonical spelling; unknown columns are
    /// ignored and missing trailing cells are absent.
    pub fn from_cells(line: usize, headers: &[String], cells: &[String]) -> Self {
        let mut row = Row {
            line,
            ..Default::default()
        };
        for (header, cell) in headers.iter().zip(cells) {
            if let Some(slot) = row.slot_mut(canonical_column(header.trim())) {
                *slot = normalize_cell(cell);
            }
        }
        row
    }

    /// Cell value by canonical column name.
    pub fn get(&self, column: &str) -> Option<&str> {
        let cell = match column {
            "csvFile" => &self.csv_file,
            "name" => &self.name,
            "code" => &self.code,
            "type" => &self.value_type,
            "values" => &self.values,
            "unit" => &self.unit,
            "description" => &self.description,
            "canBeNull" => &self.can_be_null,
            "comments" => &self.comments,
            "conceptPath" => &self.concept_path,
            "methodology" => &self.methodology,
            _ => return None,
        };
        cell.as_deref()
    }

    fn slot_mut(&mut self, column: &str) -> Option<&mut Option<String>> {
        match column {
            "csvFile" => Some(&mut self.csv_file),
            "name" => Some(&mut self.name),
            "code" => Some(&mut self.code),
            "type" => Some(&mut self.value_type),
            "values" => Some(&mut self.values),
            "unit" => Some(&mut self.unit),
            "description" => Some(&mut self.description),
            "canBeNull" => Some(&mut self.can_be_null),
            "comments" => Some(&mut self.comments),
            "conceptPath" => Some(&mut self.concept_path),
            "methodology" => Some(&mut self.methodology),
            _ => None,
        }
    }

    /// Cells in canonical column order, absent cells as empty strings.
    pub fn to_cells(&self) -> Vec<String> {
        TABLE_COLUMNS
            .iter()
            .map(|column| self.get(column).unwrap_or_default().to_string())
            .collect()
    }

    /// How to refer to this row in error messages.
    pub fn describe(&self) -> String {
        match (self.code.as_deref(), self.line) {
            (Some(code), 0) => format!("variable '{code}'"),
            (Some(code), line) => format!("variable '{code}' (line {line})"),
            (None, 0) => "row".to_string(),
            (None, line) => format!("line {line}"),
        }
    }
}

/// Empty and `nan`-like cells are absent.
pub fn normalize_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Convert a row into a variable.
///
/// The `conceptPath` is not part of the variable; the tree builder consumes
/// it separately.
pub fn row_to_variable(row: &Row) -> DataModelResult<CommonDataElement> {
    let raw_type = row.value_type.as_deref().unwrap_or_default();
    let value_type =
        ValueType::from_code(raw_type).ok_or_else(|| DataModelError::InvalidType {
            found: raw_type.to_string(),
            location: row.describe(),
        })?;

    let code = row.code.clone().ok_or_else(|| DataModelError::MissingField {
        field: "code".into(),
        location: row.describe(),
    })?;

    let kind = match value_type {
        ValueType::Nominal => {
            let values = row
                .values
                .as_deref()
                .ok_or_else(|| DataModelError::MissingValues { code: code.clone() })?;
            let enumerations = parse_enumerations(values)?;
            if enumerations.is_empty() {
                return Err(DataModelError::MissingValues { code });
            }
            CdeKind::Nominal { enumerations }
        }
        ValueType::Real => {
            let (min_value, max_value) = row
                .values
                .as_deref()
                .map(|v| parse_real_range(v, &code))
                .transpose()?
                .unwrap_or_default();
            CdeKind::Real {
                min_value,
                max_value,
            }
        }
        ValueType::Integer => {
            let (min_value, max_value) = row
                .values
                .as_deref()
                .map(|v| parse_integer_range(v, &code))
                .transpose()?
                .unwrap_or_default();
            CdeKind::Integer {
                min_value,
                max_value,
            }
        }
        ValueType::Text => CdeKind::Text,
    };

    Ok(CommonDataElement {
        code,
        label: row.name.clone(),
        description: row.description.clone(),
        units: row.unit.clone(),
        can_be_null: row.can_be_null.clone(),
        comments: row.comments.clone(),
        methodology: row.methodology.clone(),
        kind,
    })
}

/// Convert a variable back into a row whose concept path is `prefix` followed
/// by the variable's own code.
pub fn variable_to_row(variable: &CommonDataElement, prefix: &[&str]) -> Row {
    let values = match &variable.kind {
        CdeKind::Nominal { enumerations } => serialize_enumerations(enumerations),
        CdeKind::Real {
            min_value,
            max_value,
        } => serialize_range(*min_value, *max_value),
        CdeKind::Integer {
            min_value,
            max_value,
        } => serialize_range(*min_value, *max_value),
        CdeKind::Text => String::new(),
    };

    let concept_path = prefix
        .iter()
        .copied()
        .chain(std::iter::once(variable.code.as_str()))
        .collect::<Vec<_>>()
        .join("/");

    Row {
        line: 0,
        csv_file: None,
        name: variable.label.clone(),
        code: Some(variable.code.clone()),
        value_type: Some(variable.value_type().to_string()),
        values: Some(values).filter(|v| !v.is_empty()),
        unit: variable.units.clone(),
        description: variable.description.clone(),
        can_be_null: variable.can_be_null.clone(),
        comments: variable.comments.clone(),
        concept_path: Some(concept_path),
        methodology: variable.methodology.clone(),
    }
}
