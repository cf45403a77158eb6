//! Row-tree construction.
//!
//! Rows are partitioned recursively by the row dimension fields. Every group
//! node carries a dense [`CellMatrix`] with one cell per (column key, value
//! field) pair, filled eagerly so expanding or collapsing a node never has to
//! touch the dataset again. The tree is rebuilt from scratch whenever the
//! spec or the filtered rows change; nothing here is patched in place.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
};

use anyhow::{Result, bail};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::Aggregator,
    columns::{ColumnKey, GRAND_TOTAL_LABEL, TOTAL_SUFFIX, column_path},
    data::{Row, Value},
    flatten::ExpansionState,
    pivot::{PivotDimensionField, PivotValueField, SortOrder},
};

pub const ROOT_ID: &str = "root";

/// Identifier derived from the ancestor labels and depth of a node, stable
/// across rebuilds with the same data and spec.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn root() -> Self {
        NodeId(ROOT_ID.to_string())
    }

    pub fn child(&self, label: &str, level: usize) -> Self {
        NodeId(format!("{}:{label}:{level}", self.0))
    }

    pub fn total(&self) -> Self {
        NodeId(format!("{}:total", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        NodeId(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        NodeId(value)
    }
}

/// Column-key × value-field grid of aggregated numbers, stored row-major by
/// column position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellMatrix {
    columns: usize,
    value_fields: usize,
    cells: Vec<f64>,
}

impl CellMatrix {
    pub fn zeroed(columns: usize, value_fields: usize) -> Self {
        Self {
            columns,
            value_fields,
            cells: vec![0.0; columns * value_fields],
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns
    }

    pub fn value_field_count(&self) -> usize {
        self.value_fields
    }

    pub fn get(&self, column: usize, value_field: usize) -> Option<f64> {
        if column >= self.columns || value_field >= self.value_fields {
            return None;
        }
        self.cells.get(column * self.value_fields + value_field).copied()
    }

    /// Cells of one column, one per value field.
    pub fn column(&self, column: usize) -> &[f64] {
        let start = column * self.value_fields;
        self.cells.get(start..start + self.value_fields).unwrap_or(&[])
    }

    fn set(&mut self, column: usize, value_field: usize, value: f64) {
        self.cells[column * self.value_fields + value_field] = value;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotRowNode {
    pub id: NodeId,
    pub level: usize,
    pub label: String,
    pub is_total: bool,
    pub is_expanded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    pub values: Arc<CellMatrix>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<PivotRowNode>>,
}

impl PivotRowNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn children(&self) -> &[PivotRowNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Depth-first walk over this node and all of its descendants.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a PivotRowNode)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }
}

/// Filtered row plus the column positions it contributes to.
struct RowRef<'a> {
    row: &'a Row,
    columns: Vec<usize>,
}

struct TreeBuilder<'a> {
    row_dims: &'a [PivotDimensionField],
    value_fields: &'a [PivotValueField],
    column_count: usize,
    expansion: &'a ExpansionState,
}

impl TreeBuilder<'_> {
    fn aggregate(&self, rows: &[&RowRef<'_>]) -> CellMatrix {
        let value_count = self.value_fields.len();
        let mut aggregators = Vec::with_capacity(self.column_count * value_count);
        for _ in 0..self.column_count {
            aggregators.extend(
                self.value_fields
                    .iter()
                    .map(|vf| Aggregator::new(vf.aggregation)),
            );
        }
        for row_ref in rows {
            for &column in &row_ref.columns {
                for (idx, value_field) in self.value_fields.iter().enumerate() {
                    aggregators[column * value_count + idx]
                        .ingest(row_ref.row.get(&value_field.field));
                }
            }
        }
        let mut matrix = CellMatrix::zeroed(self.column_count, value_count);
        for column in 0..self.column_count {
            for idx in 0..value_count {
                matrix.set(column, idx, aggregators[column * value_count + idx].finish());
            }
        }
        matrix
    }

    fn build_level(
        &self,
        rows: &[&RowRef<'_>],
        level: usize,
        parent_id: &NodeId,
    ) -> Vec<PivotRowNode> {
        let Some(dim) = self.row_dims.get(level) else {
            return Vec::new();
        };
        let is_last = level + 1 == self.row_dims.len();

        let mut groups: BTreeMap<String, Vec<&RowRef<'_>>> = BTreeMap::new();
        for &row_ref in rows {
            let key = Value::group_key(row_ref.row.get(&dim.field)).into_owned();
            groups.entry(key).or_default().push(row_ref);
        }
        let mut ordered = groups.into_iter().collect::<Vec<_>>();
        if dim.order == SortOrder::Desc {
            ordered.reverse();
        }

        let mut nodes = Vec::with_capacity(ordered.len());
        for (key, group_rows) in ordered {
            let id = parent_id.child(&key, level);
            let values = Arc::new(self.aggregate(&group_rows));
            let children = (!is_last).then(|| self.build_level(&group_rows, level + 1, &id));
            let total = (dim.show_totals && !is_last).then(|| PivotRowNode {
                id: id.total(),
                level: level + 1,
                label: format!("{key}{TOTAL_SUFFIX}"),
                is_total: true,
                is_expanded: false,
                parent_id: Some(id.clone()),
                values: Arc::clone(&values),
                children: None,
            });
            nodes.push(PivotRowNode {
                is_expanded: self.expansion.is_expanded(&id),
                id,
                level,
                label: key,
                is_total: false,
                parent_id: Some(parent_id.clone()),
                values,
                children,
            });
            nodes.extend(total);
        }
        nodes
    }
}

fn index_columns(column_keys: &[ColumnKey]) -> Result<HashMap<&ColumnKey, usize>> {
    let mut index = HashMap::with_capacity(column_keys.len());
    for (position, key) in column_keys.iter().enumerate() {
        if index.insert(key, position).is_some() {
            bail!("Column '{key}' appears more than once in the column set");
        }
    }
    Ok(index)
}

/// Column positions whose cells a row with this path feeds.
fn matching_columns(index: &HashMap<&ColumnKey, usize>, path: &[String]) -> Vec<usize> {
    let mut positions = Vec::new();
    if let Some(&position) = index.get(&ColumnKey::Leaf(path.to_vec())) {
        positions.push(position);
    }
    for depth in 0..=path.len() {
        if let Some(&position) = index.get(&ColumnKey::Subtotal(path[..depth].to_vec())) {
            positions.push(position);
        }
    }
    if let Some(&position) = index.get(&ColumnKey::GrandTotal) {
        positions.push(position);
    }
    positions
}

/// Builds the root-level row nodes for the filtered rows.
///
/// With no row dimensions the result is a single `"Grand Total"` node over
/// every row. Fails only when `column_keys` repeats a key, which would make
/// cell lookups ambiguous.
pub fn build_row_tree(
    rows: &[&Row],
    row_dims: &[PivotDimensionField],
    value_fields: &[PivotValueField],
    column_dims: &[PivotDimensionField],
    column_keys: &[ColumnKey],
    expansion: &ExpansionState,
) -> Result<Vec<PivotRowNode>> {
    let index = index_columns(column_keys)?;
    let row_refs = rows
        .iter()
        .map(|&row| RowRef {
            row,
            columns: matching_columns(&index, &column_path(row, column_dims)),
        })
        .collect::<Vec<_>>();
    let refs = row_refs.iter().collect::<Vec<_>>();

    let builder = TreeBuilder {
        row_dims,
        value_fields,
        column_count: column_keys.len(),
        expansion,
    };

    let root = NodeId::root();
    let nodes = if row_dims.is_empty() {
        vec![PivotRowNode {
            is_expanded: expansion.is_expanded(&root),
            id: root,
            level: 0,
            label: GRAND_TOTAL_LABEL.to_string(),
            is_total: false,
            parent_id: None,
            values: Arc::new(builder.aggregate(&refs)),
            children: None,
        }]
    } else {
        builder.build_level(&refs, 0, &root)
    };
    debug!(
        "Built {} root row(s) from {} row(s) across {} column(s)",
        nodes.len(),
        rows.len(),
        column_keys.len()
    );
    Ok(nodes)
}
