//! Aggregation functions shared by pivot cells and chart series.
//!
//! Every aggregation yields a plain `f64`. An empty input yields `0.0` for
//! every kind, so a cell with no matching rows reads the same as a cell whose
//! values sum to zero.

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    str::FromStr,
};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::data::{Row, Value};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Sum,
    Avg,
    Count,
    CountUnique,
    Min,
    Max,
}

impl Aggregation {
    pub fn as_str(self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Avg => "avg",
            Aggregation::Count => "count",
            Aggregation::CountUnique => "count_unique",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(Aggregation::Sum),
            "avg" | "average" | "mean" => Ok(Aggregation::Avg),
            "count" => Ok(Aggregation::Count),
            "count_unique" | "countunique" | "distinct" => Ok(Aggregation::CountUnique),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            other => Err(anyhow!("Unknown aggregation '{other}'")),
        }
    }
}

/// Single-pass accumulator for one aggregation over one cell.
#[derive(Debug, Clone)]
pub struct Aggregator {
    kind: Aggregation,
    numeric_count: usize,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
    non_blank: usize,
    distinct: HashSet<String>,
}

impl Aggregator {
    pub fn new(kind: Aggregation) -> Self {
        Self {
            kind,
            numeric_count: 0,
            sum: 0.0,
            min: None,
            max: None,
            non_blank: 0,
            distinct: HashSet::new(),
        }
    }

    pub fn ingest(&mut self, value: Option<&Value>) {
        let Some(value) = value.filter(|v| !v.is_blank()) else {
            return;
        };
        self.non_blank += 1;
        match self.kind {
            Aggregation::Count => {}
            Aggregation::CountUnique => {
                if !self.distinct.contains(value.as_display().as_ref()) {
                    self.distinct.insert(value.as_display().into_owned());
                }
            }
            Aggregation::Sum | Aggregation::Avg | Aggregation::Min | Aggregation::Max => {
                if let Some(number) = value.as_number() {
                    self.numeric_count += 1;
                    self.sum += number;
                    self.min = Some(self.min.map_or(number, |current| current.min(number)));
                    self.max = Some(self.max.map_or(number, |current| current.max(number)));
                }
            }
        }
    }

    pub fn finish(&self) -> f64 {
        match self.kind {
            Aggregation::Sum => self.sum,
            Aggregation::Avg => {
                if self.numeric_count > 0 {
                    self.sum / self.numeric_count as f64
                } else {
                    0.0
                }
            }
            Aggregation::Count => self.non_blank as f64,
            Aggregation::CountUnique => self.distinct.len() as f64,
            Aggregation::Min => self.min.unwrap_or(0.0),
            Aggregation::Max => self.max.unwrap_or(0.0),
        }
    }
}

pub fn aggregate<'a, I>(values: I, kind: Aggregation) -> f64
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut aggregator = Aggregator::new(kind);
    for value in values {
        aggregator.ingest(Some(value));
    }
    aggregator.finish()
}

/// Aggregates `value_field` per distinct `group_by` label, the series shape
/// charts read. Groups are keyed by the same labels pivot rows use.
pub fn aggregate_by<'a, I>(
    rows: I,
    group_by: &str,
    value_field: &str,
    kind: Aggregation,
) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = &'a Row>,
{
    let mut groups: BTreeMap<String, Aggregator> = BTreeMap::new();
    for row in rows {
        let key = Value::group_key(row.get(group_by)).into_owned();
        groups
            .entry(key)
            .or_insert_with(|| Aggregator::new(kind))
            .ingest(row.get(value_field));
    }
    groups
        .into_iter()
        .map(|(key, aggregator)| (key, aggregator.finish()))
        .collect()
}
