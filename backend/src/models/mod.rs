//! Domain models for CDE data models.
//!
//! This module contains the core data structures shared by the converter and
//! the validator:
//!
//! - [`ValueType`] / [`SqlType`] - Declared variable type and its storage type
//! - [`Enumeration`] - One `{code, label}` entry of a nominal variable
//! - [`CommonDataElement`] - A typed variable (leaf of the tree)
//! - [`Group`] - An internal node holding child groups and variables
//! - [`DataModel`] - The root group plus version metadata
//!
//! The tabular layout (canonical column names) lives here too, as immutable
//! configuration shared by the reader, the transcoder and the validator.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DataModelError;

// =============================================================================
// Well-known Codes
// =============================================================================

/// Code of the CDE every data model must contain.
pub const DATASET_CODE: &str = "dataset";

/// Code of the subject identifier required by longitudinal data models.
pub const SUBJECT_ID_CODE: &str = "subjectid";

/// Code of the visit identifier required by longitudinal data models.
pub const VISIT_ID_CODE: &str = "visitid";

/// Version stamped on data models built from a table.
pub const PLACEHOLDER_VERSION: &str = "to be defined";

/// Code of the degenerate model returned when a table creates no group.
pub const NO_GROUPS_CODE: &str = "No groups found";

// =============================================================================
// Tabular Layout
// =============================================================================

/// Canonical table columns, in output order.
pub const TABLE_COLUMNS: [&str; 11] = [
    "csvFile",
    "name",
    "code",
    "type",
    "values",
    "unit",
    "description",
    "canBeNull",
    "comments",
    "conceptPath",
    "methodology",
];

/// Columns that must hold a value in every row.
pub const REQUIRED_COLUMNS: [&str; 4] = ["name", "code", "type", "conceptPath"];

/// Header spellings accepted in place of a canonical column.
pub const COLUMN_ALIASES: [(&str, &str); 1] = [("units", "unit")];

/// Map a header to its canonical spelling.
pub fn canonical_column(header: &str) -> &str {
    COLUMN_ALIASES
        .iter()
        .find(|(alias, _)| *alias == header)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(header)
}

// =============================================================================
// Value Type
// =============================================================================

/// Declared type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Categorical, values drawn from an enumeration.
    Nominal,
    /// Floating point, optional range.
    Real,
    /// Integer, optional range.
    Integer,
    /// Free text.
    Text,
}

impl ValueType {
    /// All recognized types, in the order used by error messages.
    pub const ALL: [ValueType; 4] = [Self::Nominal, Self::Real, Self::Integer, Self::Text];

    /// Parse the type name used in both representations. Matching is exact.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "nominal" => Some(Self::Nominal),
            "real" => Some(Self::Real),
            "integer" => Some(Self::Integer),
            "text" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nominal => "nominal",
            Self::Real => "real",
            Self::Integer => "integer",
            Self::Text => "text",
        }
    }

    /// Storage type derived from the declared type.
    pub const fn sql_type(self) -> SqlType {
        match self {
            Self::Nominal | Self::Text => SqlType::Text,
            Self::Real => SqlType::Real,
            Self::Integer => SqlType::Int,
        }
    }

    /// Whether variables of this type are categorical.
    pub const fn is_categorical(self) -> bool {
        matches!(self, Self::Nominal)
    }

    /// Whether `values` encodes a numeric range for this type.
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Real | Self::Integer)
    }

    /// Comma-separated list of valid type names.
    pub fn valid_names() -> String {
        Self::ALL.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ")
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlType {
    Text,
    Real,
    Int,
}

impl SqlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Real => "real",
            Self::Int => "int",
        }
    }
}

// =============================================================================
// Common Data Element
// =============================================================================

/// One entry of a nominal variable's value list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enumeration {
    pub code: String,
    pub label: String,
}

impl Enumeration {
    pub fn new(code: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
        }
    }
}

/// Type-specific payload of a variable. Each variant carries only the value
/// constraints legal for its type.
#[derive(Debug, Clone, PartialEq)]
pub enum CdeKind {
    Nominal {
        enumerations: Vec<Enumeration>,
    },
    Real {
        min_value: Option<f64>,
        max_value: Option<f64>,
    },
    Integer {
        min_value: Option<i64>,
        max_value: Option<i64>,
    },
    Text,
}

impl CdeKind {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Nominal { .. } => ValueType::Nominal,
            Self::Real { .. } => ValueType::Real,
            Self::Integer { .. } => ValueType::Integer,
            Self::Text => ValueType::Text,
        }
    }
}

/// A Common Data Element: a typed variable of the data model.
///
/// `sql_type` and `isCategorical` are not stored; they are derived from
/// [`CdeKind`] and can therefore never disagree with the declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "CdeRecord", try_from = "CdeRecord")]
pub struct CommonDataElement {
    pub code: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub units: Option<String>,
    pub can_be_null: Option<String>,
    pub comments: Option<String>,
    pub methodology: Option<String>,
    pub kind: CdeKind,
}

impl CommonDataElement {
    /// Create a variable with only a code and a type payload.
    pub fn new(code: impl Into<String>, kind: CdeKind) -> Self {
        Self {
            code: code.into(),
            label: None,
            description: None,
            units: None,
            can_be_null: None,
            comments: None,
            methodology: None,
            kind,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn value_type(&self) -> ValueType {
        self.kind.value_type()
    }

    pub fn sql_type(&self) -> SqlType {
        self.value_type().sql_type()
    }

    pub fn is_categorical(&self) -> bool {
        self.value_type().is_categorical()
    }

    /// Enumeration entries, empty for non-nominal variables.
    pub fn enumerations(&self) -> &[Enumeration] {
        match &self.kind {
            CdeKind::Nominal { enumerations } => enumerations,
            _ => &[],
        }
    }
}

/// Flat wire shape of a CDE in the JSON data model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CdeRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    label: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    value_type: Option<String>,
    #[serde(
        rename = "sql_type",
        alias = "sqlType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    sql_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    is_categorical: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    enumerations: Option<Vec<Enumeration>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min_value: Option<serde_json::Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_value: Option<serde_json::Number>,
    #[serde(default, skip_serializing_if = "is_blank")]
    units: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    can_be_null: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    comments: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    methodology: Option<String>,
}

impl From<CommonDataElement> for CdeRecord {
    fn from(cde: CommonDataElement) -> Self {
        let value_type = cde.value_type();
        let mut record = CdeRecord {
            code: Some(cde.code),
            label: cde.label,
            description: cde.description,
            value_type: Some(value_type.as_str().to_string()),
            sql_type: Some(value_type.sql_type().as_str().to_string()),
            is_categorical: Some(value_type.is_categorical()),
            units: cde.units,
            can_be_null: cde.can_be_null,
            comments: cde.comments,
            methodology: cde.methodology,
            ..Default::default()
        };

        match cde.kind {
            CdeKind::Nominal { enumerations } => {
                if !enumerations.is_empty() {
                    record.enumerations = Some(enumerations);
                }
            }
            CdeKind::Real {
                min_value,
                max_value,
            } => {
                record.min_value = min_value.and_then(serde_json::Number::from_f64);
                record.max_value = max_value.and_then(serde_json::Number::from_f64);
            }
            CdeKind::Integer {
                min_value,
                max_value,
            } => {
                record.min_value = min_value.map(serde_json::Number::from);
                record.max_value = max_value.map(serde_json::Number::from);
            }
            CdeKind::Text => {}
        }

        record
    }
}

impl TryFrom<CdeRecord> for CommonDataElement {
    type Error = DataModelError;

    fn try_from(record: CdeRecord) -> Result<Self, Self::Error> {
        let code = record
            .code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| DataModelError::MissingField {
                field: "code".into(),
                location: "CommonDataElement".into(),
            })?;

        let raw_type = record.value_type.unwrap_or_default();
        let value_type =
            ValueType::from_code(&raw_type).ok_or_else(|| DataModelError::InvalidType {
                found: raw_type.clone(),
                location: format!("CommonDataElement '{code}'"),
            })?;

        let sql_type_matches = record
            .sql_type
            .as_deref()
            .map_or(true, |s| s == value_type.sql_type().as_str());
        let categorical_matches = record
            .is_categorical
            .map_or(true, |c| c == value_type.is_categorical());
        if !sql_type_matches || !categorical_matches {
            return Err(DataModelError::TypeMismatch {
                value_type: value_type.to_string(),
                path: code,
                expected_sql_type: value_type.sql_type().as_str().to_string(),
                expected_categorical: value_type.is_categorical(),
            });
        }

        let kind = match value_type {
            ValueType::Nominal => match record.enumerations {
                Some(enumerations) if !enumerations.is_empty() => CdeKind::Nominal { enumerations },
                _ => return Err(DataModelError::MissingEnumerations { path: code }),
            },
            ValueType::Real => CdeKind::Real {
                min_value: record.min_value.as_ref().and_then(serde_json::Number::as_f64),
                max_value: record.max_value.as_ref().and_then(serde_json::Number::as_f64),
            },
            ValueType::Integer => CdeKind::Integer {
                min_value: integer_bound(record.min_value.as_ref(), &code)?,
                max_value: integer_bound(record.max_value.as_ref(), &code)?,
            },
            ValueType::Text => CdeKind::Text,
        };

        Ok(Self {
            code,
            label: record.label,
            description: record.description,
            units: record.units,
            can_be_null: record.can_be_null,
            comments: record.comments,
            methodology: record.methodology,
            kind,
        })
    }
}

/// Read an integer bound, accepting integral floats such as `100.0`.
fn integer_bound(
    number: Option<&serde_json::Number>,
    code: &str,
) -> Result<Option<i64>, DataModelError> {
    let Some(number) = number else {
        return Ok(None);
    };
    if let Some(value) = number.as_i64() {
        return Ok(Some(value));
    }
    match number.as_f64() {
        Some(value) if value.fract() == 0.0 && value.abs() < i64::MAX as f64 => {
            Ok(Some(value as i64))
        }
        _ => Err(DataModelError::TypeConversion {
            code: code.to_string(),
            value_type: ValueType::Integer.to_string(),
        }),
    }
}

// =============================================================================
// Groups and Data Model
// =============================================================================

/// An internal node of the data model tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Group {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub label: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub variables: Vec<CommonDataElement>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub groups: Vec<Group>,
}

impl Group {
    /// A group created on demand from a concept path segment: its label is
    /// its code.
    pub fn new(code: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            label: Some(code.clone()),
            code,
            variables: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Name used as a concept path segment: the label, or the code when the
    /// label is absent or empty.
    pub fn display_label(&self) -> &str {
        match self.label.as_deref() {
            Some(label) if !label.is_empty() => label,
            _ => &self.code,
        }
    }

    /// Number of variables in this group and all its descendants.
    pub fn variable_count(&self) -> usize {
        self.variables.len() + self.groups.iter().map(Group::variable_count).sum::<usize>()
    }

    /// Find a variable by code anywhere in this subtree.
    pub fn find_variable(&self, code: &str) -> Option<&CommonDataElement> {
        self.variables
            .iter()
            .find(|v| v.code == code)
            .or_else(|| self.groups.iter().find_map(|g| g.find_variable(code)))
    }
}

/// The root of a data model.
///
/// Serialization strips empty fields, except for the model produced from a
/// table without groups, which keeps its empty `groups` list:
/// `{"code": "No groups found", "groups": [], "variables": [...]}`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct DataModel {
    #[serde(flatten)]
    pub root: Group,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub longitudinal: Option<bool>,
}

impl DataModel {
    pub fn new(root: Group) -> Self {
        Self {
            root,
            version: None,
            longitudinal: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn code(&self) -> &str {
        &self.root.code
    }

    pub fn is_longitudinal(&self) -> bool {
        self.longitudinal.unwrap_or(false)
    }

    /// Whether this is the placeholder built from a table with no groups.
    pub fn is_without_groups(&self) -> bool {
        self.root.code == NO_GROUPS_CODE && self.version.is_none() && self.root.groups.is_empty()
    }
}

impl Serialize for DataModel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct WithoutGroups<'a> {
            code: &'a str,
            groups: &'a [Group],
            variables: &'a [CommonDataElement],
        }

        #[derive(Serialize)]
        struct Model<'a> {
            #[serde(flatten)]
            root: &'a Group,
            #[serde(skip_serializing_if = "Option::is_none")]
            version: Option<&'a str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            longitudinal: Option<bool>,
        }

        if self.is_without_groups() {
            return WithoutGroups {
                code: &self.root.code,
                groups: &self.root.groups,
                variables: &self.root.variables,
            }
            .serialize(serializer);
        }

        Model {
            root: &self.root,
            version: self.version.as_deref().filter(|v| !v.is_empty()),
            longitudinal: self.longitudinal,
        }
        .serialize(serializer)
    }
}

// =============================================================================
// Serde helpers
// =============================================================================

/// Empty strings are stripped from serialized output.
pub(crate) fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

/// Accept `null` wherever a list is expected.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Tests
// =============================================================================
