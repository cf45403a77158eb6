use std::collections::BTreeSet;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::data::{Row, field_text};

/// Inclusion-set filter on one field.
///
/// An empty `allowed_values` set lets every row through; it is the state of a
/// filter that has been added but not narrowed yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PivotFilter {
    pub field: String,
    #[serde(default)]
    pub allowed_values: BTreeSet<String>,
}

impl PivotFilter {
    pub fn new<I, S>(field: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field: field.into(),
            allowed_values: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses `field=value1|value2`. A bare `field` or `field=` yields an
    /// unnarrowed filter.
    pub fn parse(expression: &str) -> Result<Self> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("Empty filter expression"));
        }
        let (field, values) = match trimmed.split_once('=') {
            Some((field, values)) => (field.trim(), values),
            None => (trimmed, ""),
        };
        if field.is_empty() {
            return Err(anyhow!("Filter '{trimmed}' is missing a field name"));
        }
        let allowed = values
            .split('|')
            .map(|v| unquote(v.trim()))
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        Ok(Self::new(field, allowed))
    }

    pub fn accepts(&self, row: &Row) -> bool {
        self.allowed_values.is_empty()
            || self
                .allowed_values
                .contains(field_text(row, &self.field).as_ref())
    }
}

pub fn parse_filters(filters: &[String]) -> Result<Vec<PivotFilter>> {
    filters.iter().map(|f| PivotFilter::parse(f)).collect()
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 {
        let bytes = value.as_bytes();
        if (bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\'')
        {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Row passes when every filter accepts it; stops at the first rejection.
pub fn evaluate_filters(filters: &[PivotFilter], row: &Row) -> bool {
    filters.iter().all(|filter| filter.accepts(row))
}

pub fn apply_filters<'a>(rows: &'a [Row], filters: &[PivotFilter]) -> Vec<&'a Row> {
    rows.iter()
        .filter(|row| evaluate_filters(filters, row))
        .collect()
}

/// Every stringified value of `field`, as a freshly dropped filter allows.
pub fn distinct_values<'a, I>(rows: I, field: &str) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a Row>,
{
    rows.into_iter()
        .map(|row| field_text(row, field).into_owned())
        .collect()
}
