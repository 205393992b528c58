//! Wide vs long layout detection.
//!
//! Two independent signals:
//! - the share of headers that read as dates (wide tables keep periods in headers)
//! - the best single column's share of date values (long tables keep them in a column)
//!
//! Text-only columns are key candidates: they never count as date headers and
//! are skipped when looking for a date-valued column.

use tracing::info;

use super::classify::TableProfile;
use crate::domain::{Shape, ShapeClassification, ShapeEvidence, ShapeThresholds};

/// Classify the layout. Never fails; unclear tables come back `Ambiguous`.
pub fn detect(profile: &TableProfile<'_>, thresholds: &ShapeThresholds) -> ShapeClassification {
    let columns = profile.columns();
    let headers_considered = columns.len();

    let key_like_columns: Vec<String> = columns
        .iter()
        .filter(|c| c.is_key_like())
        .map(|c| c.name.clone())
        .collect();

    let date_headers: Vec<String> = columns
        .iter()
        .filter(|c| !c.is_key_like() && c.header_date.is_some())
        .map(|c| c.name.clone())
        .collect();

    let header_date_fraction = if headers_considered == 0 {
        0.0
    } else {
        date_headers.len() as f64 / headers_considered as f64
    };

    // First column wins ties.
    let best = columns
        .iter()
        .filter(|c| !c.is_key_like() && c.sampled > 0)
        .fold(None, |best: Option<(&str, f64)>, c| match best {
            Some((_, f)) if f >= c.date_fraction => best,
            _ => Some((c.name.as_str(), c.date_fraction)),
        })
        .filter(|(_, f)| *f > 0.0);
    let (best_date_column, value_date_fraction) = match best {
        Some((name, fraction)) => (Some(name.to_string()), fraction),
        None => (None, 0.0),
    };

    let wide_met = header_date_fraction >= thresholds.header_fraction
        && date_headers.len() >= thresholds.min_date_headers;
    let long_met = value_date_fraction >= thresholds.value_fraction;

    let (shape, confidence) = match (wide_met, long_met) {
        (true, true) if header_date_fraction > value_date_fraction => {
            (Shape::Wide, header_date_fraction)
        }
        (true, true) => (Shape::Long, value_date_fraction),
        (true, false) => (Shape::Wide, header_date_fraction),
        (false, true) => (Shape::Long, value_date_fraction),
        (false, false) => (
            Shape::Ambiguous,
            header_date_fraction.max(value_date_fraction),
        ),
    };

    info!(
        ?shape,
        confidence,
        header_date_fraction,
        value_date_fraction,
        date_headers = date_headers.len(),
        "shape detected"
    );

    ShapeClassification {
        shape,
        confidence,
        evidence: ShapeEvidence {
            headers_considered,
            date_headers,
            header_date_fraction,
            best_date_column,
            value_date_fraction,
            key_like_columns,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CellValue, RawTable};

    fn classify(table: &RawTable) -> ShapeClassification {
        let profile = TableProfile::build(table, 1000);
        detect(&profile, &ShapeThresholds::default())
    }

    #[test]
    fn month_year_headers_are_wide() {
        let table = RawTable::from_rows(
            &["Store", "Jan-2024", "Feb-2024", "Mar-2024"],
            vec![
                vec!["A".into(), 10i64.into(), 12i64.into(), 9i64.into()],
                vec!["B".into(), 5i64.into(), 7i64.into(), 6i64.into()],
            ],
        )
        .unwrap();
        let shape = classify(&table);
        assert_eq!(shape.shape, Shape::Wide);
        assert!((shape.confidence - 0.75).abs() < 1e-12);
        assert_eq!(shape.evidence.date_headers.len(), 3);
        assert_eq!(shape.evidence.key_like_columns, vec!["Store".to_string()]);
    }

    #[test]
    fn date_column_is_long() {
        let table = RawTable::from_rows(
            &["store_id", "date", "sales"],
            vec![
                vec!["A".into(), "2024-01-08".into(), 100i64.into()],
                vec!["A".into(), "2024-01-15".into(), 90i64.into()],
            ],
        )
        .unwrap();
        let shape = classify(&table);
        assert_eq!(shape.shape, Shape::Long);
        assert_eq!(shape.confidence, 1.0);
        assert_eq!(shape.evidence.best_date_column.as_deref(), Some("date"));
    }

    #[test]
    fn no_date_signal_is_ambiguous() {
        let table = RawTable::from_rows(
            &["sku", "wk1", "wk2"],
            vec![vec!["A".into(), 1i64.into(), 2i64.into()]],
        )
        .unwrap();
        let shape = classify(&table);
        assert_eq!(shape.shape, Shape::Ambiguous);
        assert_eq!(shape.confidence, 0.0);
        assert!(!shape.is_confident(0.6));
    }

    #[test]
    fn mostly_dates_below_threshold_is_ambiguous() {
        let table = RawTable::from_rows(
            &["id", "when", "v"],
            vec![
                vec!["A".into(), "2024-01-01".into(), 1i64.into()],
                vec!["B".into(), "2024-01-02".into(), 1i64.into()],
                vec!["C".into(), "2024-01-03".into(), 1i64.into()],
                vec!["D".into(), "later".into(), 1i64.into()],
            ],
        )
        .unwrap();
        let shape = classify(&table);
        assert_eq!(shape.shape, Shape::Ambiguous);
        assert!((shape.confidence - 0.75).abs() < 1e-12);
    }

    #[test]
    fn both_signals_prefer_long_on_tie() {
        // Two date headers out of two, and a header column that also holds dates.
        let table = RawTable::from_rows(
            &["2024-01-01", "2024-01-02"],
            vec![vec![
                CellValue::text("2024-03-01"),
                CellValue::Integer(4),
            ]],
        )
        .unwrap();
        let shape = classify(&table);
        assert_eq!(shape.shape, Shape::Long);
        assert_eq!(shape.confidence, 1.0);
    }

    #[test]
    fn both_signals_prefer_wide_when_headers_stronger() {
        let table = RawTable::from_rows(
            &["2024-01", "2024-02", "2024-03", "2024-04", "2024-05"],
            vec![
                vec!["2024-03-01".into(), 1i64.into(), 1i64.into(), 1i64.into(), 1i64.into()],
                vec!["2024-03-02".into(), 1i64.into(), 1i64.into(), 1i64.into(), 1i64.into()],
                vec!["2024-03-03".into(), 1i64.into(), 1i64.into(), 1i64.into(), 1i64.into()],
                vec!["2024-03-04".into(), 1i64.into(), 1i64.into(), 1i64.into(), 1i64.into()],
                vec!["x".into(), 1i64.into(), 1i64.into(), 1i64.into(), 1i64.into()],
            ],
        )
        .unwrap();
        let shape = classify(&table);
        assert_eq!(shape.shape, Shape::Wide);
        assert_eq!(shape.confidence, 1.0);
    }
}
