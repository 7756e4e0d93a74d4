//! Validation of the JSON data model.
//!
//! Runs on a loosely-typed [`serde_json::Value`] rather than on
//! [`crate::models::DataModel`], so that a missing or ill-typed field is
//! reported with its exact location instead of as a generic decode failure.
//!
//! Checks happen in three phases and the first violation wins:
//!
//! 1. Root fields (`code`, `version`, `label`, `variables`, `groups`)
//! 2. Recursive walk over groups and variables
//! 3. Global requirements (`dataset`, longitudinal identifiers)

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{DataModelError, DataModelResult};
use crate::models::{ValueType, DATASET_CODE, SUBJECT_ID_CODE, VISIT_ID_CODE};

/// Deepest group nesting the walker accepts.
pub const MAX_NESTING_DEPTH: usize = 64;

const ROOT_LOCATION: &str = "DataModel";

/// Fields every CDE must carry.
const CDE_REQUIRED_FIELDS: [&str; 4] = ["code", "sql_type", "isCategorical", "type"];

/// Validate a JSON data model.
pub fn validate_data_model(model: &Value) -> DataModelResult<()> {
    let root = model.as_object().ok_or_else(|| DataModelError::NonObjectEntry {
        field: "data model".into(),
        location: "request body".into(),
    })?;

    check_root_fields(root)?;

    let mut context = WalkContext::default();
    walk_group(root, "", &mut context, &mut HashSet::new())?;
    debug!(
        variables = context.seen_codes.len(),
        "data model tree walk complete"
    );

    if !context.dataset_found {
        return Err(DataModelError::MissingDataset);
    }

    let longitudinal = root
        .get("longitudinal")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if longitudinal {
        for code in [SUBJECT_ID_CODE, VISIT_ID_CODE] {
            if !context.seen_codes.contains(code) {
                return Err(DataModelError::MissingLongitudinalCde { code: code.into() });
            }
        }
    }

    Ok(())
}

// =============================================================================
// Root
// =============================================================================

fn check_root_fields(root: &Map<String, Value>) -> DataModelResult<()> {
    for field in ["code", "version", "label", "variables", "groups"] {
        if !root.contains_key(field) {
            return Err(DataModelError::MissingField {
                field: field.into(),
                location: ROOT_LOCATION.into(),
            });
        }
    }

    for field in ["code", "version", "label"] {
        let non_empty = root[field]
            .as_str()
            .map_or(false, |s| !s.trim().is_empty());
        if !non_empty {
            return Err(DataModelError::EmptyField {
                field: field.into(),
            });
        }
    }

    for field in ["variables", "groups"] {
        let entries = root[field]
            .as_array()
            .filter(|list| !list.is_empty())
            .ok_or_else(|| DataModelError::EmptyList {
                field: field.into(),
            })?;
        if !entries.iter().all(Value::is_object) {
            return Err(DataModelError::NonObjectEntry {
                field: field.into(),
                location: ROOT_LOCATION.into(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Tree Walk
// =============================================================================

/// State threaded through the recursive walk.
#[derive(Debug, Default)]
struct WalkContext {
    /// CDE codes seen anywhere in the tree.
    seen_codes: HashSet<String>,
    /// Whether a well-formed `dataset` CDE has been seen.
    dataset_found: bool,
    depth: usize,
}

/// Validate one group. `siblings` holds the group codes already seen among
/// this group's siblings.
fn walk_group(
    group: &Map<String, Value>,
    parent_path: &str,
    context: &mut WalkContext,
    siblings: &mut HashSet<String>,
) -> DataModelResult<()> {
    let group_code = group
        .get("code")
        .and_then(Value::as_str)
        .filter(|code| !code.is_empty())
        .ok_or_else(|| DataModelError::MissingField {
            field: "code".into(),
            location: format!("Group at '{parent_path}'"),
        })?;

    if !siblings.insert(group_code.to_string()) {
        return Err(DataModelError::DuplicateGroup {
            code: group_code.into(),
            path: parent_path.into(),
        });
    }

    let path = format!("{parent_path}/{group_code}");
    if context.depth >= MAX_NESTING_DEPTH {
        return Err(DataModelError::NestingTooDeep {
            limit: MAX_NESTING_DEPTH,
            path,
        });
    }

    for variable in entries(group, "variables", &path)? {
        let code = variable.get("code").and_then(Value::as_str);
        if let Some(code) = code {
            if !context.seen_codes.insert(code.to_string()) {
                return Err(DataModelError::DuplicateCde {
                    code: code.into(),
                    group: group_code.into(),
                    path,
                });
            }
        }
        let cde_path = format!("{path}/{}", code.unwrap_or_default());
        check_cde(variable, &cde_path)?;

        if code == Some(DATASET_CODE)
            && variable.get("sql_type").and_then(Value::as_str) == Some("text")
            && variable.get("isCategorical").and_then(Value::as_bool) == Some(true)
        {
            context.dataset_found = true;
        }
    }

    let mut child_codes = HashSet::new();
    context.depth += 1;
    for child in entries(group, "groups", &path)? {
        walk_group(child, &path, context, &mut child_codes)?;
    }
    context.depth -= 1;

    Ok(())
}

/// Object entries of a list field. An absent or `null` list is empty.
fn entries<'a>(
    group: &'a Map<String, Value>,
    field: &str,
    path: &str,
) -> DataModelResult<Vec<&'a Map<String, Value>>> {
    let non_object = || DataModelError::NonObjectEntry {
        field: field.into(),
        location: format!("Group at '{path}'"),
    };

    match group.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_object().ok_or_else(non_object))
            .collect(),
        Some(_) => Err(non_object()),
    }
}

// =============================================================================
// Common Data Elements
// =============================================================================

fn check_cde(cde: &Map<String, Value>, path: &str) -> DataModelResult<()> {
    let location = || format!("CommonDataElement at '{path}'");

    for field in CDE_REQUIRED_FIELDS {
        if !cde.contains_key(field) {
            return Err(DataModelError::MissingField {
                field: field.into(),
                location: location(),
            });
        }
    }

    let raw_type = cde["type"].as_str().unwrap_or_default();
    let value_type = ValueType::from_code(raw_type).ok_or_else(|| DataModelError::InvalidType {
        found: raw_type.into(),
        location: location(),
    })?;

    let expected_sql_type = value_type.sql_type().as_str();
    let expected_categorical = value_type.is_categorical();
    if cde["sql_type"].as_str() != Some(expected_sql_type)
        || cde["isCategorical"].as_bool() != Some(expected_categorical)
    {
        return Err(DataModelError::TypeMismatch {
            value_type: value_type.to_string(),
            path: path.into(),
            expected_sql_type: expected_sql_type.into(),
            expected_categorical,
        });
    }

    if expected_categorical {
        let has_enumerations = cde
            .get("enumerations")
            .and_then(Value::as_array)
            .map_or(false, |list| !list.is_empty());
        if !has_enumerations {
            return Err(DataModelError::MissingEnumerations { path: path.into() });
        }
    }

    let bound = |field: &str| cde.get(field).and_then(Value::as_f64);
    if let (Some(min), Some(max)) = (bound("minValue"), bound("maxValue")) {
        if min >= max {
            return Err(DataModelError::RangeOrder {
                location: location(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset() -> Value {
        json!({
            "code": "dataset",
            "label": "Dataset",
            "type": "nominal",
            "sql_type": "text",
            "isCategorical": true,
            "enumerations": [{"code": "d1", "label": "Dataset 1"}]
        })
    }

    fn cde(code: &str) -> Value {
        json!({
            "code": code,
            "label": code,
            "type": "real",
            "sql_type": "real",
            "isCategorical": false,
            "minValue": 0,
            "maxValue": 100
        })
    }

    fn model(variables: Value, groups: Value) -> Value {
        json!({
            "code": "DM001",
            "version": "1.0",
            "label": "Data Model",
            "variables": variables,
            "groups": groups
        })
    }

    fn valid_model() -> Value {
        model(
            json!([dataset()]),
            json!([{"code": "group", "label": "Group", "variables": [cde("weight")]}]),
        )
    }

    #[test]
    fn test_valid_data_model() {
        assert_eq!(validate_data_model(&valid_model()), Ok(()));
    }

    #[test]
    fn test_missing_root_field() {
        let mut m = valid_model();
        m.as_object_mut().unwrap().remove("version");
        assert_eq!(
            validate_data_model(&m).unwrap_err().to_string(),
            "Missing 'version' in DataModel"
        );
    }

    #[test]
    fn test_empty_root_string() {
        let mut m = valid_model();
        m["label"] = json!("   ");
        assert_eq!(
            validate_data_model(&m),
            Err(DataModelError::EmptyField {
                field: "label".into()
            })
        );
    }

    #[test]
    fn test_empty_variables_list() {
        let m = model(json!([]), json!([{"code": "g"}]));
        assert_eq!(
            validate_data_model(&m).unwrap_err().to_string(),
            "'variables' in DataModel must be a non-empty list of dictionaries"
        );
    }

    #[test]
    fn test_non_object_group_entry() {
        let m = model(json!([dataset()]), json!(["not a group"]));
        assert!(matches!(
            validate_data_model(&m),
            Err(DataModelError::NonObjectEntry { ref field, .. }) if field == "groups"
        ));
    }

    #[test]
    fn test_duplicate_dataset_in_different_subtrees() {
        let m = model(
            json!([dataset()]),
            json!([{"code": "group", "variables": [dataset()]}]),
        );
        let err = validate_data_model(&m).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Duplicate CommonDataElement code 'dataset' found in Group 'group' at '/DM001/group'"
        );
    }

    #[test]
    fn test_duplicate_sibling_group() {
        let m = model(
            json!([dataset()]),
            json!([
                {"code": "group", "variables": [cde("a")]},
                {"code": "group", "variables": [cde("b")]}
            ]),
        );
        assert_eq!(
            validate_data_model(&m),
            Err(DataModelError::DuplicateGroup {
                code: "group".into(),
                path: "/DM001".into()
            })
        );
    }

    #[test]
    fn test_same_group_code_under_different_parents() {
        let m = model(
            json!([dataset()]),
            json!([
                {"code": "left", "groups": [{"code": "shared", "variables": [cde("a")]}]},
                {"code": "right", "groups": [{"code": "shared", "variables": [cde("b")]}]}
            ]),
        );
        assert_eq!(validate_data_model(&m), Ok(()));
    }

    #[test]
    fn test_group_missing_code() {
        let m = model(json!([dataset()]), json!([{"label": "No code"}]));
        assert!(matches!(
            validate_data_model(&m),
            Err(DataModelError::MissingField { ref field, ref location })
                if field == "code" && location.contains("/DM001")
        ));
    }

    #[test]
    fn test_cde_missing_required_field() {
        let mut weight = cde("weight");
        weight.as_object_mut().unwrap().remove("sql_type");
        let m = model(json!([dataset()]), json!([{"code": "g", "variables": [weight]}]));
        assert_eq!(
            validate_data_model(&m).unwrap_err().to_string(),
            "Missing 'sql_type' in CommonDataElement at '/DM001/g/weight'"
        );
    }

    #[test]
    fn test_cde_invalid_type() {
        let mut weight = cde("weight");
        weight["type"] = json!("date");
        let m = model(json!([dataset()]), json!([{"code": "g", "variables": [weight]}]));
        assert!(matches!(
            validate_data_model(&m),
            Err(DataModelError::InvalidType { ref found, .. }) if found == "date"
        ));
    }

    #[test]
    fn test_cde_type_mismatch() {
        let mut weight = cde("weight");
        weight["sql_type"] = json!("int");
        let m = model(json!([dataset()]), json!([{"code": "g", "variables": [weight]}]));
        let err = validate_data_model(&m).unwrap_err().to_string();
        assert!(err.contains("Mismatch in 'sql_type' or 'isCategorical' for type 'real'"));
        assert!(err.contains("Expected ('real', false)"));
    }

    #[test]
    fn test_categorical_without_enumerations() {
        let mut gender = dataset();
        gender["code"] = json!("gender");
        gender["enumerations"] = json!([]);
        let m = model(json!([dataset()]), json!([{"code": "g", "variables": [gender]}]));
        assert_eq!(
            validate_data_model(&m),
            Err(DataModelError::MissingEnumerations {
                path: "/DM001/g/gender".into()
            })
        );
    }

    #[test]
    fn test_min_not_below_max() {
        let mut weight = cde("weight");
        weight["minValue"] = json!(100);
        let m = model(json!([dataset()]), json!([{"code": "g", "variables": [weight]}]));
        assert!(matches!(
            validate_data_model(&m),
            Err(DataModelError::RangeOrder { .. })
        ));
    }

    #[test]
    fn test_missing_dataset() {
        let m = model(
            json!([cde("weight")]),
            json!([{"code": "g", "variables": [cde("height")]}]),
        );
        assert_eq!(validate_data_model(&m), Err(DataModelError::MissingDataset));
    }

    #[test]
    fn test_dataset_must_be_categorical_text() {
        let mut fake = cde("dataset");
        fake["label"] = json!("Dataset");
        let m = model(json!([fake]), json!([{"code": "g", "variables": [cde("h")]}]));
        assert_eq!(validate_data_model(&m), Err(DataModelError::MissingDataset));
    }

    #[test]
    fn test_longitudinal_requires_subject_then_visit() {
        let mut m = valid_model();
        m["longitudinal"] = json!(true);
        assert_eq!(
            validate_data_model(&m).unwrap_err().to_string(),
            "Missing 'subjectid' for a longitudinal study at 'DataModel'"
        );

        m["groups"][0]["variables"]
            .as_array_mut()
            .unwrap()
            .push(cde("subjectid"));
        assert_eq!(
            validate_data_model(&m),
            Err(DataModelError::MissingLongitudinalCde {
                code: "visitid".into()
            })
        );

        m["groups"][0]["groups"] = json!([{"code": "visits", "variables": [cde("visitid")]}]);
        assert_eq!(validate_data_model(&m), Ok(()));
    }

    #[test]
    fn test_nesting_limit() {
        let mut group = json!({"code": "leaf", "variables": [cde("deep")]});
        for level in 0..MAX_NESTING_DEPTH + 1 {
            group = json!({"code": format!("g{level}"), "groups": [group]});
        }
        let m = model(json!([dataset()]), json!([group]));
        assert!(matches!(
            validate_data_model(&m),
            Err(DataModelError::NestingTooDeep { limit: MAX_NESTING_DEPTH, .. })
        ));
    }

    #[test]
    fn test_non_object_body() {
        assert!(validate_data_model(&json!([1, 2])).is_err());
    }
}
