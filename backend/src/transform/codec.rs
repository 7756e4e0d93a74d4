//! Codecs for the two compact encodings used in the `values` column.
//!
//! - Enumeration list: `{"code1","label1"}, {"code2","label2"}`
//! - Numeric range: `min-max`
//!
//! # Example
//!
//! ```rust
//! use cde_datamodel::transform::codec::{parse_enumerations, parse_range};
//!
//! let enums = parse_enumerations(r#"{"m","Male"}, {"f","Female"}"#).unwrap();
//! assert_eq!(enums[1].label, "Female");
//!
//! assert_eq!(parse_range("0.1 - 99.9").unwrap(), (0.1, 99.9));
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{DataModelError, DataModelResult};
use crate::models::{Enumeration, ValueType};

/// `min-max`, each bound an optionally signed decimal that may be left out
/// (`0-`, `-100`), whitespace tolerated around the bounds.
static RANGE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([-+]?\d*\.?\d+)?\s*-\s*([-+]?\d*\.?\d+)?\s*$").expect("valid range pattern")
});

/// Lower and upper bound of a range, either of which may be absent.
pub type Bounds<T> = (Option<T>, Option<T>);

// =============================================================================
// Enumerations
// =============================================================================

/// Parse an enumeration list.
///
/// Each `{"code","label"}` pair is rewritten into a one-entry JSON object
/// (`{"code":"label"}`), the whole list is wrapped in brackets and decoded,
/// then every object is projected back into an [`Enumeration`].
pub fn parse_enumerations(text: &str) -> DataModelResult<Vec<Enumeration>> {
    let rewritten = format!(
        "[{}]",
        text.replace("\",\"", "\":\"").replace("\", \"", "\": \"")
    );

    let format_error = || DataModelError::EnumerationFormat(text.to_string());

    let entries: Vec<Map<String, Value>> =
        serde_json::from_str(&rewritten).map_err(|_| format_error())?;

    entries
        .into_iter()
        .map(|entry| {
            if entry.len() != 1 {
                return Err(format_error());
            }
            match entry.into_iter().next() {
                Some((code, Value::String(label))) => Ok(Enumeration { code, label }),
                _ => Err(format_error()),
            }
        })
        .collect()
}

/// Serialize an enumeration list back to its compact form.
///
/// Codes and labels are emitted as JSON string literals so embedded double
/// quotes and backslashes survive a round trip through [`parse_enumerations`].
pub fn serialize_enumerations(enumerations: &[Enumeration]) -> String {
    enumerations
        .iter()
        .map(|e| format!("{{{},{}}}", quote(&e.code), quote(&e.label)))
        .collect::<Vec<_>>()
        .join(",")
}

fn quote(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// First code that appears twice in the list, if any.
pub fn duplicate_enumeration_code(enumerations: &[Enumeration]) -> Option<&str> {
    let mut seen = std::collections::HashSet::new();
    enumerations
        .iter()
        .map(|e| e.code.as_str())
        .find(|code| !seen.insert(*code))
}

// =============================================================================
// Ranges
// =============================================================================

/// Parse a fully bounded `min-max` range into two numbers. Ordering is not
/// checked.
pub fn parse_range(text: &str) -> DataModelResult<(f64, f64)> {
    match range_bounds(text)? {
        (Some(min), Some(max)) => Ok((to_f64(text, &min)?, to_f64(text, &max)?)),
        _ => Err(DataModelError::RangeFormat(text.to_string())),
    }
}

/// Parse a range, bounds optional, and require `min < max` when both are
/// present.
pub fn parse_ordered_range(text: &str) -> DataModelResult<Bounds<f64>> {
    let (min, max) = range_bounds(text)?;
    let min = min.map(|m| to_f64(text, &m)).transpose()?;
    let max = max.map(|m| to_f64(text, &m)).transpose()?;
    if let (Some(lo), Some(hi)) = (min, max) {
        if lo >= hi {
            return Err(DataModelError::RangeOrder {
                location: format!("range '{}'", text.trim()),
            });
        }
    }
    Ok((min, max))
}

/// Parse a range whose bounds must be integers, for variable `code`.
pub fn parse_integer_range(text: &str, code: &str) -> DataModelResult<Bounds<i64>> {
    let cast = |s: String| {
        s.parse::<i64>().map_err(|_| DataModelError::TypeConversion {
            code: code.to_string(),
            value_type: ValueType::Integer.to_string(),
        })
    };
    let (min, max) = range_bounds(text)?;
    Ok((min.map(cast).transpose()?, max.map(cast).transpose()?))
}

/// Parse a range whose bounds are reals, for variable `code`.
pub fn parse_real_range(text: &str, code: &str) -> DataModelResult<Bounds<f64>> {
    let cast = |s: String| {
        s.parse::<f64>().map_err(|_| DataModelError::TypeConversion {
            code: code.to_string(),
            value_type: ValueType::Real.to_string(),
        })
    };
    let (min, max) = range_bounds(text)?;
    Ok((min.map(cast).transpose()?, max.map(cast).transpose()?))
}

/// Split a well-formed range into its bound literals. At least one bound
/// must be present.
fn range_bounds(text: &str) -> DataModelResult<Bounds<String>> {
    let format_error = || DataModelError::RangeFormat(text.to_string());
    let captures = RANGE_PATTERN.captures(text).ok_or_else(format_error)?;
    let bound = |i: usize| captures.get(i).map(|m| m.as_str().to_string());
    match (bound(1), bound(2)) {
        (None, None) => Err(format_error()),
        bounds => Ok(bounds),
    }
}

fn to_f64(text: &str, literal: &str) -> DataModelResult<f64> {
    literal
        .parse::<f64>()
        .map_err(|_| DataModelError::RangeFormat(text.to_string()))
}

/// Serialize a range. A missing bound renders empty (`"1-"`, `"-100"`);
/// with no bounds at all the result is empty.
pub fn serialize_range<T: std::fmt::Display>(min: Option<T>, max: Option<T>) -> String {
    match (min, max) {
        (None, None) => String::new(),
        (min, max) => format!(
            "{}-{}",
            min.map(|v| v.to_string()).unwrap_or_default(),
            max.map(|v| v.to_string()).unwrap_or_default()
        ),
    }
}
