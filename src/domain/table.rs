//! In-memory tabular input.
//!
//! A `RawTable` is produced by whatever loader the host uses and is read-only
//! for the whole pipeline run. Column kinds are the loader's best guess; the
//! profiling stage re-checks values itself.

use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::TableError;

/// Primitive kind reported by the loader for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
    DateLike,
    Boolean,
    Unknown,
}

/// A single cell. Missing values are `Null`, never a sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum CellValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    /// `Null` and whitespace-only text both count as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Text(s) => f.write_str(s.trim()),
            CellValue::Integer(v) => write!(f, "{v}"),
            // Loaders often widen integer ids to floats; render `7.0` as `7`.
            CellValue::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 => {
                write!(f, "{}", *v as i64)
            }
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Boolean(v) => write!(f, "{v}"),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(value: NaiveDate) -> Self {
        CellValue::Date(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CellValue::Null, Into::into)
    }
}

/// A named column with its loader-inferred kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    kind: ColumnKind,
    values: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind, values: Vec<CellValue>) -> Self {
        Self {
            name: name.into(),
            kind,
            values,
        }
    }

    /// Build a column and guess its kind from the values.
    pub fn infer(name: impl Into<String>, values: Vec<CellValue>) -> Self {
        let kind = infer_kind(&values);
        Self::new(name, kind, values)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn values(&self) -> &[CellValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Majority kind among non-missing cells; `Unknown` when all are missing.
pub fn infer_kind(values: &[CellValue]) -> ColumnKind {
    let mut counts = [0usize; 5];
    for value in values {
        let slot = match value {
            CellValue::Null => continue,
            CellValue::Text(s) if s.trim().is_empty() => continue,
            CellValue::Text(_) => 0,
            CellValue::Integer(_) => 1,
            CellValue::Float(_) => 2,
            CellValue::Date(_) => 3,
            CellValue::Boolean(_) => 4,
        };
        counts[slot] += 1;
    }

    // Mixed int/float columns are floats.
    if counts[1] > 0 && counts[2] > 0 {
        counts[2] += counts[1];
        counts[1] = 0;
    }

    let kinds = [
        ColumnKind::Text,
        ColumnKind::Integer,
        ColumnKind::Float,
        ColumnKind::DateLike,
        ColumnKind::Boolean,
    ];
    counts
        .iter()
        .zip(kinds)
        .filter(|(count, _)| **count > 0)
        .max_by_key(|(count, _)| **count)
        .map_or(ColumnKind::Unknown, |(_, kind)| kind)
}

/// Ordered, equal-length, uniquely named columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawTable {
    columns: Vec<Column>,
    row_count: usize,
}

impl RawTable {
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        let Some(first) = columns.first() else {
            return Err(TableError::NoColumns);
        };
        let row_count = first.len();

        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if column.len() != row_count {
                return Err(TableError::RaggedColumn {
                    column: column.name.clone(),
                    expected: row_count,
                    found: column.len(),
                });
            }
            if !seen.insert(column.name.as_str()) {
                return Err(TableError::DuplicateColumn(column.name.clone()));
            }
        }

        Ok(Self { columns, row_count })
    }

    /// Build a table from a header row and row-major records. Short records
    /// are padded with `Null`; extra cells are dropped.
    pub fn from_rows(headers: &[&str], rows: Vec<Vec<CellValue>>) -> Result<Self, TableError> {
        let mut columns: Vec<Vec<CellValue>> = vec![Vec::with_capacity(rows.len()); headers.len()];
        for row in rows {
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.push(cells.next().unwrap_or(CellValue::Null));
            }
        }
        let columns = headers
            .iter()
            .zip(columns)
            .map(|(name, values)| Column::infer(*name, values))
            .collect();
        Self::new(columns)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&CellValue> {
        self.columns.get(column)?.values.get(row)
    }
}
