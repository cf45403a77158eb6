//! Field type inference.
//!
//! Samples the first [`SAMPLE_ROWS`] rows of a dataset and classifies each
//! column as number, date, boolean, or text. Checks run in that fixed order
//! and the first type whose share of non-empty sample values reaches
//! [`TYPE_THRESHOLD`] wins, so a column that is 80% numeric and 80% date-like
//! is always a number. The result only seeds defaults (value aggregation,
//! filter widgets); it never sits on the pivot hot path.

use std::{collections::BTreeMap, fmt, str::FromStr, sync::OnceLock};

use anyhow::{Result, anyhow};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::Aggregation,
    data::{Row, Value, parse_naive_date},
};

pub const SAMPLE_ROWS: usize = 100;
pub const TYPE_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Date,
    Boolean,
}

impl FieldType {
    /// Aggregation applied when a field of this type is dropped on the values zone.
    pub fn default_aggregation(self) -> Aggregation {
        match self {
            FieldType::Number => Aggregation::Sum,
            _ => Aggregation::Count,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "string" => Ok(FieldType::Text),
            "number" => Ok(FieldType::Number),
            "date" => Ok(FieldType::Date),
            "boolean" | "bool" => Ok(FieldType::Boolean),
            other => Err(anyhow!("Unknown field type '{other}'")),
        }
    }
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\d{4}-\d{2}-\d{2}|\d{2}/\d{2}/\d{4}").expect("date pattern is valid")
    })
}

fn looks_like_date(value: &Value) -> bool {
    match value {
        Value::Text(s) => date_pattern().is_match(s) && parse_naive_date(s).is_ok(),
        _ => false,
    }
}

fn looks_like_boolean(value: &Value) -> bool {
    match value {
        Value::Boolean(_) => true,
        Value::Text(s) => s == "true" || s == "false",
        _ => false,
    }
}

#[derive(Debug, Default)]
struct TypeTally {
    non_empty: usize,
    numeric: usize,
    date: usize,
    boolean: usize,
}

impl TypeTally {
    fn observe(&mut self, value: Option<&Value>) {
        let Some(value) = value.filter(|v| !v.is_blank()) else {
            return;
        };
        self.non_empty += 1;
        if value.as_number().is_some() {
            self.numeric += 1;
        }
        if looks_like_date(value) {
            self.date += 1;
        }
        if looks_like_boolean(value) {
            self.boolean += 1;
        }
    }

    fn share(&self, count: usize) -> f64 {
        count as f64 / self.non_empty as f64
    }

    fn decide(&self) -> FieldType {
        if self.non_empty == 0 {
            FieldType::Text
        } else if self.share(self.numeric) >= TYPE_THRESHOLD {
            FieldType::Number
        } else if self.share(self.date) >= TYPE_THRESHOLD {
            FieldType::Date
        } else if self.share(self.boolean) >= TYPE_THRESHOLD {
            FieldType::Boolean
        } else {
            FieldType::Text
        }
    }
}

pub fn infer_field_type(rows: &[Row], field: &str) -> FieldType {
    let mut tally = TypeTally::default();
    for row in rows.iter().take(SAMPLE_ROWS) {
        tally.observe(row.get(field));
    }
    tally.decide()
}

/// Infers a type for every column present in the sampled rows.
pub fn infer_schema(rows: &[Row]) -> BTreeMap<String, FieldType> {
    let mut tallies: BTreeMap<String, TypeTally> = BTreeMap::new();
    for row in rows.iter().take(SAMPLE_ROWS) {
        for (field, value) in row {
            tallies
                .entry(field.clone())
                .or_default()
                .observe(Some(value));
        }
    }
    tallies
        .into_iter()
        .map(|(field, tally)| (field, tally.decide()))
        .collect()
}
