//! Per-column classification, computed once per run.
//!
//! The loader's `ColumnKind` is only a hint. Each column is re-sampled and
//! tagged `Date`, `Numeric`, `Text` or `Unknown` with a confidence; later
//! stages read the cached `TableProfile` instead of re-inspecting values.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::domain::RawTable;
use crate::parse::{is_date_cell, is_number_cell, parse_header_date};

/// Share of values that must parse for a `Date` or `Numeric` tag.
const CLASS_MAJORITY: f64 = 0.5;

/// Header-name tokens that hint at a date column.
const DATE_NAME_HINTS: [&str; 10] = [
    "date", "data", "dt", "day", "dia", "mes", "ano", "period", "month", "week",
];
const DATE_NAME_BONUS: f64 = 0.15;
const DATE_CANDIDATE_MIN_SCORE: f64 = 0.55;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnClass {
    Date,
    Numeric,
    /// Categorical or free text; the natural key candidates.
    Text,
    /// No non-null values to judge.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub index: usize,
    pub name: String,
    pub class: ColumnClass,
    pub confidence: f64,
    /// Non-missing values inspected.
    pub sampled: usize,
    pub date_fraction: f64,
    pub numeric_fraction: f64,
    /// The header itself read as a date or period label.
    pub header_date: Option<NaiveDate>,
}

impl ColumnProfile {
    pub fn is_key_like(&self) -> bool {
        self.class == ColumnClass::Text
    }

    fn date_candidate_score(&self) -> f64 {
        let lower = self.name.to_ascii_lowercase();
        let bonus = if DATE_NAME_HINTS.iter().any(|hint| lower.contains(hint)) {
            DATE_NAME_BONUS
        } else {
            0.0
        };
        self.date_fraction + bonus
    }
}

/// A table plus its cached column profiles. Threaded through the mapping and
/// canonicalization stages; never mutated after `build`.
#[derive(Debug, Clone)]
pub struct TableProfile<'a> {
    table: &'a RawTable,
    columns: Vec<ColumnProfile>,
}

impl<'a> TableProfile<'a> {
    pub fn build(table: &'a RawTable, sample_limit: usize) -> Self {
        let columns = table
            .columns()
            .iter()
            .enumerate()
            .map(|(index, column)| {
                let sample: Vec<_> = column
                    .values()
                    .iter()
                    .filter(|v| !v.is_missing())
                    .take(sample_limit)
                    .collect();
                let sampled = sample.len();
                let fraction = |hits: usize| {
                    if sampled == 0 {
                        0.0
                    } else {
                        hits as f64 / sampled as f64
                    }
                };
                let date_fraction = fraction(sample.iter().filter(|v| is_date_cell(v)).count());
                let numeric_fraction = fraction(sample.iter().filter(|v| is_number_cell(v)).count());

                let (class, confidence) = if sampled == 0 {
                    (ColumnClass::Unknown, 0.0)
                } else if date_fraction >= CLASS_MAJORITY && date_fraction >= numeric_fraction {
                    (ColumnClass::Date, date_fraction)
                } else if numeric_fraction >= CLASS_MAJORITY {
                    (ColumnClass::Numeric, numeric_fraction)
                } else {
                    (ColumnClass::Text, 1.0 - date_fraction.max(numeric_fraction))
                };

                let profile = ColumnProfile {
                    index,
                    name: column.name().to_string(),
                    class,
                    confidence,
                    sampled,
                    date_fraction,
                    numeric_fraction,
                    header_date: parse_header_date(column.name()),
                };
                debug!(
                    column = %profile.name,
                    class = ?profile.class,
                    confidence = profile.confidence,
                    loader_kind = ?column.kind(),
                    "column classified"
                );
                profile
            })
            .collect();

        Self { table, columns }
    }

    pub fn table(&self) -> &'a RawTable {
        self.table
    }

    pub fn columns(&self) -> &[ColumnProfile] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Columns whose values look like dates, best first.
    pub fn date_candidates(&self) -> Vec<&ColumnProfile> {
        let mut scored: Vec<(&ColumnProfile, f64)> = self
            .columns
            .iter()
            .filter(|c| c.sampled > 0)
            .map(|c| (c, c.date_candidate_score()))
            .filter(|(c, score)| *score >= DATE_CANDIDATE_MIN_SCORE && c.date_fraction > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.index.cmp(&b.0.index)));
        scored.into_iter().map(|(c, _)| c).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CellValue;

    fn table() -> RawTable {
        RawTable::from_rows(
            &["store", "when", "sales", "note", "2024-01"],
            vec![
                vec!["A".into(), "2024-01-01".into(), "10".into(), "x".into(), CellValue::Null],
                vec!["B".into(), "2024-01-02".into(), 12.5.into(), "".into(), CellValue::Null],
                vec!["C".into(), "bad".into(), 3i64.into(), "y".into(), CellValue::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn classifies_by_values_not_loader_kind() {
        let table = table();
        let profile = TableProfile::build(&table, 100);

        let store = profile.column("store").unwrap();
        assert_eq!(store.class, ColumnClass::Text);
        assert!(store.is_key_like());

        let when = profile.column("when").unwrap();
        assert_eq!(when.class, ColumnClass::Date);
        assert!((when.confidence - 2.0 / 3.0).abs() < 1e-12);

        let sales = profile.column("sales").unwrap();
        assert_eq!(sales.class, ColumnClass::Numeric);
        assert_eq!(sales.confidence, 1.0);

        let note = profile.column("note").unwrap();
        assert_eq!(note.sampled, 2);

        let empty = profile.column("2024-01").unwrap();
        assert_eq!(empty.class, ColumnClass::Unknown);
        assert!(empty.header_date.is_some());
    }

    #[test]
    fn date_candidates_rank_by_fraction_and_name() {
        let table = RawTable::from_rows(
            &["posted", "order_date"],
            vec![
                vec!["2024-01-01".into(), "2024-01-01".into()],
                vec!["2024-01-02".into(), "2024-01-02".into()],
            ],
        )
        .unwrap();
        let profile = TableProfile::build(&table, 100);
        let names: Vec<_> = profile.date_candidates().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["order_date", "posted"]);
    }

    #[test]
    fn sample_limit_caps_inspection() {
        let table = table();
        let profile = TableProfile::build(&table, 2);
        assert_eq!(profile.column("when").unwrap().sampled, 2);
        assert_eq!(profile.column("when").unwrap().date_fraction, 1.0);
    }
}
