//! Saved pivot records.
//!
//! The persisted form keeps field names and value aggregations only. Per-field
//! sort order and totals, and the filter selections, are not written, so a
//! reloaded pivot comes back with default dimension settings and no filters.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    filter::PivotFilter,
    pivot::{PivotDimensionField, PivotSpec, PivotValueField},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedPivot {
    pub id: String,
    pub dataset_id: String,
    pub title: String,
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub values: Vec<PivotValueField>,
    #[serde(default)]
    pub filters: Vec<PivotFilter>,
    pub created_at: String,
    pub updated_at: String,
}

impl SavedPivot {
    /// Snapshot of `spec` under a fresh id. A blank `title` falls back to
    /// [`PivotSpec::default_title`].
    pub fn from_spec(dataset_id: impl Into<String>, title: Option<&str>, spec: &PivotSpec) -> Self {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| spec.default_title());
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            dataset_id: dataset_id.into(),
            title,
            rows: spec.rows.iter().map(|d| d.field.clone()).collect(),
            columns: spec.columns.iter().map(|d| d.field.clone()).collect(),
            values: spec.values.clone(),
            filters: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Working spec for this record, dimension settings at their defaults.
    pub fn to_spec(&self) -> PivotSpec {
        PivotSpec {
            rows: self.rows.iter().map(PivotDimensionField::new).collect(),
            columns: self.columns.iter().map(PivotDimensionField::new).collect(),
            values: self.values.clone(),
            filters: self.filters.clone(),
        }
    }
}
