//! Scalar cell values, rows, and the dataset record the pivot engine reads.
//!
//! Datasets arrive already parsed (see [`crate::io_utils::load_dataset`] for
//! CSV files); the engine only ever borrows [`Dataset::data`] and
//! [`Dataset::schema`].

use std::{borrow::Cow, collections::BTreeMap, fmt};

use anyhow::{Result, anyhow, ensure};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::FieldType;

/// Group key used for rows whose dimension value is missing or blank.
pub const OTHER_LABEL: &str = "Other";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Number(f64),
    Text(String),
}

impl Value {
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Numeric view of the value. Booleans and unparsable text are not numbers.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            Value::Text(s) => parse_number(s),
            _ => None,
        }
    }

    pub fn as_display(&self) -> Cow<'_, str> {
        match self {
            Value::Null => Cow::Borrowed(""),
            Value::Boolean(b) => Cow::Owned(b.to_string()),
            Value::Number(n) => Cow::Owned(format_number(*n)),
            Value::Text(s) => Cow::Borrowed(s.as_str()),
        }
    }

    /// Label used when partitioning rows into groups.
    pub fn group_key(value: Option<&Value>) -> Cow<'_, str> {
        match value {
            Some(v) if !v.is_blank() => v.as_display(),
            _ => Cow::Borrowed(OTHER_LABEL),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_display())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

pub type Row = BTreeMap<String, Value>;

/// Builds a row from `(column, value)` pairs.
pub fn row<K, V, I>(cells: I) -> Row
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    cells
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Stringified field value, `""` when the column is absent.
pub fn field_text<'a>(row: &'a Row, field: &str) -> Cow<'a, str> {
    row.get(field)
        .map(Value::as_display)
        .unwrap_or(Cow::Borrowed(""))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub id: String,
    pub name: String,
    pub schema: BTreeMap<String, FieldType>,
    pub data: Vec<Row>,
    pub row_count: usize,
    pub created_at: String,
    pub updated_at: String,
}

impl Dataset {
    /// Wraps already-parsed rows, inferring the schema from a sample.
    pub fn from_rows(name: impl Into<String>, data: Vec<Row>) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            schema: crate::schema::infer_schema(&data),
            row_count: data.len(),
            data,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.row_count == self.data.len(),
            "Dataset '{}' declares {} row(s) but holds {}",
            self.name,
            self.row_count,
            self.data.len()
        );
        Ok(())
    }

    /// Column names in schema order, falling back to the first row's keys.
    pub fn fields(&self) -> Vec<String> {
        if !self.schema.is_empty() {
            return self.schema.keys().cloned().collect();
        }
        self.data
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn field_type(&self, field: &str) -> FieldType {
        self.schema.get(field).copied().unwrap_or(FieldType::Text)
    }
}

pub fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d"];
    let trimmed = value.trim();
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(parsed);
        }
    }
    // Timestamps such as 2024-05-06T14:30:00 still count as dates.
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(parsed.date());
        }
    }
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.date_naive());
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

/// Converts a raw text cell into a typed value for the given column type.
pub fn parse_typed_value(raw: &str, ty: FieldType) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    match ty {
        FieldType::Number => parse_number(raw)
            .map(Value::Number)
            .unwrap_or_else(|| Value::Text(raw.to_string())),
        FieldType::Boolean => match raw.trim() {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            _ => Value::Text(raw.to_string()),
        },
        FieldType::Text | FieldType::Date => Value::Text(raw.to_string()),
    }
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
