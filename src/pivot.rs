//! Pivot specification, the recomputation pass, and the interactive session.
//!
//! A [`PivotSpec`] is what the user assembles by dragging fields onto the
//! rows, columns, values, and filters zones. [`compute_pivot`] turns a spec
//! plus dataset rows into a [`PivotTable`]; [`PivotSession`] keeps the last
//! table around so expand/collapse only re-flattens it.

use std::{fmt, str::FromStr};

use anyhow::{Context, Result, anyhow, ensure};
use itertools::Itertools;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::Aggregation,
    columns::{ColumnKey, resolve_column_keys},
    data::{Dataset, Row},
    filter::{PivotFilter, apply_filters, distinct_values},
    flatten::{ExpansionState, flatten},
    tree::{NodeId, PivotRowNode, build_row_tree},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One grouping level on the rows or columns axis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PivotDimensionField {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
    #[serde(default)]
    pub show_totals: bool,
    /// Repeat the group label on every child row when rendering (rows only).
    #[serde(default)]
    pub repeat_labels: bool,
}

impl PivotDimensionField {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
            show_totals: false,
            repeat_labels: false,
        }
    }

    /// Parses `field[:asc|desc][:totals][:repeat]`.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut parts = spec.split(':').map(str::trim);
        let field = parts
            .next()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| anyhow!("Dimension '{spec}' is missing a field name"))?;
        let mut dim = PivotDimensionField::new(field);
        for part in parts {
            match part.to_ascii_lowercase().as_str() {
                "asc" => dim.order = SortOrder::Asc,
                "desc" => dim.order = SortOrder::Desc,
                "totals" => dim.show_totals = true,
                "repeat" => dim.repeat_labels = true,
                other => return Err(anyhow!("Unknown option '{other}' in dimension '{spec}'")),
            }
        }
        Ok(dim)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PivotValueField {
    pub field: String,
    pub aggregation: Aggregation,
}

impl PivotValueField {
    pub fn new(field: impl Into<String>, aggregation: Aggregation) -> Self {
        Self {
            field: field.into(),
            aggregation,
        }
    }

    pub fn label(&self) -> String {
        format!("{} ({})", self.field, self.aggregation)
    }
}

impl FromStr for PivotValueField {
    type Err = anyhow::Error;

    /// Parses `field[:aggregation]`; the aggregation defaults to `sum`. A
    /// suffix that names no aggregation stays part of the field name.
    fn from_str(spec: &str) -> Result<Self> {
        let split = spec
            .rsplit_once(':')
            .and_then(|(field, agg)| Some((field.trim(), agg.parse::<Aggregation>().ok()?)));
        let (field, aggregation) = split.unwrap_or((spec.trim(), Aggregation::Sum));
        ensure!(!field.is_empty(), "Value field '{spec}' is missing a field name");
        Ok(PivotValueField::new(field, aggregation))
    }
}

/// Drop zone of the pivot builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Rows,
    Columns,
    Values,
    Filters,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PivotSpec {
    #[serde(default)]
    pub rows: Vec<PivotDimensionField>,
    #[serde(default)]
    pub columns: Vec<PivotDimensionField>,
    #[serde(default)]
    pub values: Vec<PivotValueField>,
    #[serde(default)]
    pub filters: Vec<PivotFilter>,
}

impl PivotSpec {
    /// Moves `field` onto `zone`, removing it from whichever zone held it.
    ///
    /// New dimensions sort ascending without totals; a value field gets its
    /// type's default aggregation; a filter starts out allowing every value
    /// present in the dataset.
    pub fn assign(&mut self, field: &str, zone: Zone, dataset: &Dataset) {
        self.remove(field);
        match zone {
            Zone::Rows => self.rows.push(PivotDimensionField::new(field)),
            Zone::Columns => self.columns.push(PivotDimensionField::new(field)),
            Zone::Values => self.values.push(PivotValueField::new(
                field,
                dataset.field_type(field).default_aggregation(),
            )),
            Zone::Filters => self.filters.push(PivotFilter {
                field: field.to_string(),
                allowed_values: distinct_values(&dataset.data, field),
            }),
        }
    }

    pub fn remove(&mut self, field: &str) {
        self.rows.retain(|d| d.field != field);
        self.columns.retain(|d| d.field != field);
        self.values.retain(|v| v.field != field);
        self.filters.retain(|f| f.field != field);
    }

    /// Fields not yet placed on the rows, columns, or values zones.
    pub fn available_fields(&self, dataset: &Dataset) -> Vec<String> {
        dataset
            .fields()
            .into_iter()
            .filter(|field| {
                !self.rows.iter().any(|d| &d.field == field)
                    && !self.columns.iter().any(|d| &d.field == field)
                    && !self.values.iter().any(|v| &v.field == field)
            })
            .collect()
    }

    pub fn clear(&mut self) {
        *self = PivotSpec::default();
    }

    /// `"<rows> by <values>"`, the title used when a pivot is saved untitled.
    pub fn default_title(&self) -> String {
        let rows = if self.rows.is_empty() {
            "All Data".to_string()
        } else {
            self.rows.iter().map(|d| d.field.as_str()).join(", ")
        };
        let values = if self.values.is_empty() {
            "Count".to_string()
        } else {
            self.values.iter().map(PivotValueField::label).join(", ")
        };
        format!("{rows} by {values}")
    }
}

/// Realized cross-tab: resolved columns, the measures, and the row tree.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotTable {
    pub columns: Vec<ColumnKey>,
    pub value_fields: Vec<PivotValueField>,
    pub rows: Vec<PivotRowNode>,
}

impl PivotTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.columns.is_empty()
    }

    pub fn column_position(&self, column: &ColumnKey) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn value_position(&self, value_field: &PivotValueField) -> Option<usize> {
        self.value_fields.iter().position(|v| v == value_field)
    }

    /// Aggregate of one node at (column, value field); `None` only when the
    /// column or value field is not part of this table.
    pub fn cell(
        &self,
        node: &PivotRowNode,
        column: &ColumnKey,
        value_field: &PivotValueField,
    ) -> Option<f64> {
        node.values
            .get(self.column_position(column)?, self.value_position(value_field)?)
    }

    pub fn visible_rows<'a>(&'a self, expansion: &ExpansionState) -> Vec<&'a PivotRowNode> {
        flatten(&self.rows, expansion)
    }

    pub fn find(&self, id: &NodeId) -> Option<&PivotRowNode> {
        let mut found = None;
        for root in &self.rows {
            root.walk(&mut |node| {
                if found.is_none() && &node.id == id {
                    found = Some(node);
                }
            });
        }
        found
    }
}

fn try_compute(rows: &[Row], spec: &PivotSpec, expansion: &ExpansionState) -> Result<PivotTable> {
    let filtered = apply_filters(rows, &spec.filters);
    debug!(
        "Filters retained {} of {} row(s)",
        filtered.len(),
        rows.len()
    );
    let columns = resolve_column_keys(filtered.iter().copied(), &spec.columns);
    let tree = build_row_tree(
        &filtered,
        &spec.rows,
        &spec.values,
        &spec.columns,
        &columns,
        expansion,
    )
    .context("Building pivot row tree")?;
    Ok(PivotTable {
        columns,
        value_fields: spec.values.clone(),
        rows: tree,
    })
}

/// Runs filter, column resolution, and tree building for one spec.
///
/// A spec without value fields produces an empty table. Any structural
/// failure is logged and also produces an empty table, never an error.
pub fn compute_pivot(rows: &[Row], spec: &PivotSpec, expansion: &ExpansionState) -> PivotTable {
    if spec.values.is_empty() {
        return PivotTable::default();
    }
    match try_compute(rows, spec, expansion) {
        Ok(table) => table,
        Err(err) => {
            warn!("Pivot could not be computed, showing no data: {err:#}");
            PivotTable::default()
        }
    }
}

/// Interactive pivot state: dataset, spec, last computed table, expansion.
#[derive(Debug)]
pub struct PivotSession {
    dataset: Dataset,
    spec: PivotSpec,
    table: PivotTable,
    expansion: ExpansionState,
}

impl PivotSession {
    pub fn new(dataset: Dataset, spec: PivotSpec) -> Self {
        let expansion = ExpansionState::new();
        let table = compute_pivot(&dataset.data, &spec, &expansion);
        Self {
            dataset,
            spec,
            table,
            expansion,
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn spec(&self) -> &PivotSpec {
        &self.spec
    }

    pub fn table(&self) -> &PivotTable {
        &self.table
    }

    pub fn expansion(&self) -> &ExpansionState {
        &self.expansion
    }

    /// Replaces the spec and rebuilds the table. The expansion set is kept
    /// as is, so groups hidden by a filter reopen when the filter widens.
    pub fn set_spec(&mut self, spec: PivotSpec) {
        self.spec = spec;
        self.recompute();
    }

    pub fn assign(&mut self, field: &str, zone: Zone) {
        self.spec.assign(field, zone, &self.dataset);
        self.recompute();
    }

    pub fn remove(&mut self, field: &str) {
        self.spec.remove(field);
        self.recompute();
    }

    fn recompute(&mut self) {
        self.table = compute_pivot(&self.dataset.data, &self.spec, &self.expansion);
    }

    /// Forgets expanded ids that name no node of the current table.
    pub fn prune_expansion(&mut self) {
        self.expansion.retain_existing(&self.table.rows);
    }

    /// Flips one node. Only the expansion set changes; the table is reused.
    pub fn toggle(&mut self, id: &NodeId) -> bool {
        self.expansion.toggle(id)
    }

    pub fn expand_all(&mut self) {
        self.expansion.expand_all(&self.table.rows);
    }

    pub fn collapse_all(&mut self) {
        self.expansion.clear();
    }

    pub fn visible_rows(&self) -> Vec<&PivotRowNode> {
        self.table.visible_rows(&self.expansion)
    }
}
