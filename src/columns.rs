//! Column-group resolution for the cross-tab header.
//!
//! Each filtered row maps to a *column path*: the group key of every column
//! dimension field, outermost first. Distinct paths become leaf columns,
//! sorted by their joined label. When any column dimension asks for totals,
//! every non-leaf path prefix gets a subtotal column, and a single
//! grand-total column always closes the list.

use std::{collections::HashSet, fmt};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    data::{Row, Value},
    pivot::PivotDimensionField,
};

pub const PATH_SEPARATOR: &str = " › ";
pub const GRAND_TOTAL_LABEL: &str = "Grand Total";
pub const TOTAL_SUFFIX: &str = " Total";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum ColumnKey {
    Leaf(Vec<String>),
    Subtotal(Vec<String>),
    GrandTotal,
}

impl ColumnKey {
    pub fn label(&self) -> String {
        match self {
            ColumnKey::Leaf(path) => path.join(PATH_SEPARATOR),
            ColumnKey::Subtotal(prefix) => {
                format!("{}{TOTAL_SUFFIX}", prefix.join(PATH_SEPARATOR))
            }
            ColumnKey::GrandTotal => GRAND_TOTAL_LABEL.to_string(),
        }
    }

    /// Whether a row with this column path contributes to the column's cells.
    pub fn matches(&self, path: &[String]) -> bool {
        match self {
            ColumnKey::Leaf(leaf) => leaf.as_slice() == path,
            ColumnKey::Subtotal(prefix) => path.starts_with(prefix),
            ColumnKey::GrandTotal => true,
        }
    }

    pub fn is_total(&self) -> bool {
        !matches!(self, ColumnKey::Leaf(_))
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

pub fn column_path(row: &Row, dimensions: &[PivotDimensionField]) -> Vec<String> {
    dimensions
        .iter()
        .map(|dim| Value::group_key(row.get(&dim.field)).into_owned())
        .collect()
}

pub fn resolve_column_keys<'a, I>(rows: I, dimensions: &[PivotDimensionField]) -> Vec<ColumnKey>
where
    I: IntoIterator<Item = &'a Row>,
{
    if dimensions.is_empty() {
        return vec![ColumnKey::GrandTotal];
    }

    let leaves = rows
        .into_iter()
        .map(|row| column_path(row, dimensions))
        .unique()
        .map(|path| (path.join(PATH_SEPARATOR), path))
        .sorted_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, path)| path)
        .collect::<Vec<_>>();

    let mut subtotals = Vec::new();
    if dimensions.iter().any(|dim| dim.show_totals) {
        let mut seen = HashSet::new();
        for path in &leaves {
            // The full-depth prefix is the leaf itself, so it never owns a subtotal.
            for depth in 0..dimensions.len() - 1 {
                let prefix = path[..=depth].to_vec();
                if seen.insert(prefix.clone()) {
                    subtotals.push(ColumnKey::Subtotal(prefix));
                }
            }
        }
    }

    leaves
        .into_iter()
        .map(ColumnKey::Leaf)
        .chain(subtotals)
        .chain(std::iter::once(ColumnKey::GrandTotal))
        .collect()
}
