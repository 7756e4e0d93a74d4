//! Flatten a data model tree back into rows.

use super::row::{variable_to_row, Row};
use crate::models::{DataModel, Group};

/// Walk the tree depth-first and emit one row per variable.
///
/// A node's display label (label, else code) extends the concept path prefix
/// of its own variables and of its descendants. Variables come before child
/// groups, both in insertion order.
pub fn tree_to_table(model: &DataModel) -> Vec<Row> {
    let mut rows = Vec::with_capacity(model.root.variable_count());
    flatten_group(&model.root, Vec::new(), &mut rows);
    rows
}

fn flatten_group<'a>(group: &'a Group, mut prefix: Vec<&'a str>, rows: &mut Vec<Row>) {
    let segment = group.display_label();
    if !segment.is_empty() {
        prefix.push(segment);
    }

    rows.extend(group.variables.iter().map(|v| variable_to_row(v, &prefix)));

    for child in &group.groups {
        flatten_group(child, prefix.clone(), rows);
    }
}
