//! Value types passed between pipeline stages.
//!
//! Everything here is short-lived and serializable so a run can be reported
//! or exported without extra conversion.

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Table layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    /// One row per entity, one column per period (dates in headers).
    Wide,
    /// One row per entity and period (dates in a column).
    Long,
    Ambiguous,
}

/// What the shape detector saw.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeEvidence {
    /// Headers counted in the header fraction (every column of the table).
    pub headers_considered: usize,
    /// Headers that parse as dates or periods, in table order.
    pub date_headers: Vec<String>,
    pub header_date_fraction: f64,
    /// Column whose values parse as dates most often.
    pub best_date_column: Option<String>,
    pub value_date_fraction: f64,
    /// Text-only columns left out of the value scan.
    pub key_like_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeClassification {
    pub shape: Shape,
    pub confidence: f64,
    pub evidence: ShapeEvidence,
}

impl ShapeClassification {
    /// `true` if the shape is decided and may be used without a user mapping.
    pub fn is_confident(&self, floor: f64) -> bool {
        self.shape != Shape::Ambiguous && self.confidence >= floor
    }
}

/// Sampling cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
    Irregular,
}

impl Frequency {
    pub const REGULAR: [Frequency; 5] = [
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Monthly,
        Frequency::Quarterly,
        Frequency::Yearly,
    ];

    /// Width of one period of this cadence.
    pub fn interval(self) -> Option<Interval> {
        match self {
            Frequency::Daily => Some(Interval::Days(1)),
            Frequency::Weekly => Some(Interval::Days(7)),
            Frequency::Monthly => Some(Interval::Months(1)),
            Frequency::Quarterly => Some(Interval::Months(3)),
            Frequency::Yearly => Some(Interval::Months(12)),
            Frequency::Irregular => None,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Yearly => "yearly",
            Frequency::Irregular => "irregular",
        }
    }
}

/// A step in days or calendar months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Days(i64),
    Months(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyLabel {
    pub frequency: Frequency,
    pub confidence: f64,
    /// Interval of the winning bucket; `None` when nothing was bucketed.
    pub dominant_interval: Option<Interval>,
    /// Distinct dates the label was computed from.
    pub n_points: usize,
    pub median_delta_days: Option<f64>,
    /// Deltas counted toward the winner through a gap multiplier.
    pub gap_count: usize,
    pub notes: Option<String>,
}

impl FrequencyLabel {
    pub fn irregular(n_points: usize, notes: impl Into<String>) -> Self {
        Self {
            frequency: Frequency::Irregular,
            confidence: 0.0,
            dominant_interval: None,
            n_points,
            median_delta_days: None,
            gap_count: 0,
            notes: Some(notes.into()),
        }
    }

    pub fn is_irregular(&self) -> bool {
        self.frequency == Frequency::Irregular
    }
}

/// Where observation dates come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateSource {
    /// Long layout: one date column.
    Column(String),
    /// Wide layout: these headers are dates.
    Headers(Vec<String>),
}

/// Where observed values come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    Column(String),
    /// Wide layout: the same headers as the date source.
    Headers(Vec<String>),
}

impl DateSource {
    pub fn shape(&self) -> Shape {
        match self {
            DateSource::Column(_) => Shape::Long,
            DateSource::Headers(_) => Shape::Wide,
        }
    }
}

/// Resolved column roles for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingSpec {
    pub key_columns: Vec<String>,
    pub date_source: DateSource,
    pub value_source: ValueSource,
}

impl MappingSpec {
    pub fn long(
        key_columns: Vec<String>,
        date_column: impl Into<String>,
        value_column: impl Into<String>,
    ) -> Self {
        Self {
            key_columns,
            date_source: DateSource::Column(date_column.into()),
            value_source: ValueSource::Column(value_column.into()),
        }
    }

    pub fn wide(key_columns: Vec<String>, headers: Vec<String>) -> Self {
        Self {
            key_columns,
            date_source: DateSource::Headers(headers.clone()),
            value_source: ValueSource::Headers(headers),
        }
    }

    pub fn shape(&self) -> Shape {
        self.date_source.shape()
    }
}

/// Caller-declared roles. Every `Some` field is authoritative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingOverrides {
    pub key_columns: Option<Vec<String>>,
    pub date_source: Option<DateSource>,
    /// Only meaningful for the long layout.
    pub value_column: Option<String>,
}

impl MappingOverrides {
    pub fn is_empty(&self) -> bool {
        self.key_columns.is_none() && self.date_source.is_none() && self.value_column.is_none()
    }
}

/// How `cd_key` is assembled from key parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpec {
    pub separator: String,
    /// Stands in for null or blank key parts.
    pub null_token: String,
}

impl Default for KeySpec {
    fn default() -> Self {
        Self {
            separator: "|".to_string(),
            null_token: String::new(),
        }
    }
}

/// One canonical observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRow {
    pub cd_key: String,
    pub ds: NaiveDate,
    pub y: f64,
}

impl CanonicalRow {
    pub fn new(cd_key: impl Into<String>, ds: NaiveDate, y: f64) -> Self {
        Self {
            cd_key: cd_key.into(),
            ds,
            y,
        }
    }
}

/// Validated output: unique `(cd_key, ds)`, finite `y`, sorted by `cd_key` then `ds`.
///
/// Only the validator builds one, so holding a `CanonicalSeries` means the
/// invariants hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CanonicalSeries {
    rows: Vec<CanonicalRow>,
}

impl CanonicalSeries {
    pub(crate) fn from_validated(rows: Vec<CanonicalRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[CanonicalRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<CanonicalRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CanonicalRow> {
        self.rows.iter()
    }

    /// Distinct keys in output order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for row in &self.rows {
            if keys.last() != Some(&row.cd_key.as_str()) {
                keys.push(&row.cd_key);
            }
        }
        keys
    }
}

impl<'a> IntoIterator for &'a CanonicalSeries {
    type Item = &'a CanonicalRow;
    type IntoIter = std::slice::Iter<'a, CanonicalRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Non-fatal conditions attached to a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// No dominant cadence; downstream should treat the series as irregular.
    FrequencyInconclusive {
        confidence: f64,
        notes: Option<String>,
    },
    /// Several numeric columns could have been the value; the first was used.
    ValueColumnGuessed { chosen: String, others: Vec<String> },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::FrequencyInconclusive { confidence, notes } => {
                write!(f, "frequency inconclusive (confidence {confidence:.2})")?;
                if let Some(notes) = notes {
                    write!(f, ": {notes}")?;
                }
                Ok(())
            }
            Warning::ValueColumnGuessed { chosen, others } => write!(
                f,
                "value column `{chosen}` chosen over {}",
                others.join(", ")
            ),
        }
    }
}
