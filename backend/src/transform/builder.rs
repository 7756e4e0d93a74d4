//! Fold flat rows into a data model tree.
//!
//! Each row's `conceptPath` locates the variable: every segment but the last
//! names a group (created on demand), the last is the variable itself.
//!
//! ```text
//! conceptPath                          Tree
//! ┌──────────────────────────┐        DM
//! │ DM/demographics/age      │   →    ├── demographics
//! │ DM/demographics/gender   │        │   ├── age
//! │ DM/dataset               │        │   └── gender
//! └──────────────────────────┘        └── dataset
//! ```
//!
//! The first top-level group becomes the data model root.

use tracing::debug;

use super::row::{row_to_variable, Row};
use crate::api::logs::log_warning;
use crate::error::{ConversionError, ConversionResult, DataModelError};
use crate::models::{CommonDataElement, DataModel, Group, NO_GROUPS_CODE, PLACEHOLDER_VERSION};

/// Literal some spreadsheet exports write into empty path cells.
const NONE_PLACEHOLDER: &str = "None";

/// Insert `variable` under `root` following `path`.
///
/// All segments except the last are group codes; a missing group is appended
/// as `{code: segment, label: segment}`. Existing groups are matched on their
/// exact code. The last segment is the variable's own code and is not used.
pub fn insert_variable(root: &mut Group, variable: CommonDataElement, path: &[&str]) {
    let groups = match path.split_last() {
        Some((_, groups)) => groups,
        None => &[],
    };

    let mut node = root;
    for segment in groups {
        let index = match node.groups.iter().position(|g| g.code == *segment) {
            Some(index) => index,
            None => {
                node.groups.push(Group::new(*segment));
                node.groups.len() - 1
            }
        };
        node = &mut node.groups[index];
    }
    node.variables.push(variable);
}

/// Build a data model from rows.
///
/// Any row failure aborts the whole conversion with
/// [`ConversionError::Variable`]; nothing partial is returned.
pub fn table_to_tree(rows: &[Row]) -> ConversionResult<DataModel> {
    let mut root = Group::default();

    for row in rows {
        let variable = row_to_variable(row).map_err(ConversionError::Variable)?;

        let concept_path = row
            .concept_path
            .as_deref()
            .filter(|p| !p.is_empty() && *p != NONE_PLACEHOLDER)
            .ok_or_else(|| {
                ConversionError::Variable(DataModelError::MissingConceptPath {
                    code: variable.code.clone(),
                })
            })?;

        let segments: Vec<&str> = concept_path.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ConversionError::Variable(DataModelError::ConceptPathFormat {
                path: concept_path.to_string(),
                code: variable.code,
            }));
        }
        debug!(code = %variable.code, path = concept_path, "inserting variable");
        insert_variable(&mut root, variable, &segments);
    }

    let mut top_level = root.groups.into_iter();
    match top_level.next() {
        Some(first) => {
            let discarded_groups: Vec<String> = top_level.map(|g| g.code).collect();
            if !discarded_groups.is_empty() {
                log_warning(format!(
                    "Only '{}' becomes the data model, discarding top-level groups: {}",
                    first.code,
                    discarded_groups.join(", ")
                ));
            }
            if !root.variables.is_empty() {
                log_warning(format!(
                    "Discarding {} variables outside any group",
                    root.variables.len()
                ));
            }
            Ok(DataModel::new(first).with_version(PLACEHOLDER_VERSION))
        }
        None => Ok(DataModel::new(Group {
            code: NO_GROUPS_CODE.to_string(),
            label: None,
            variables: root.variables,
            groups: Vec::new(),
        })),
    }
}
