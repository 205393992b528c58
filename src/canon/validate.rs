//! Final gate before rows leave the pipeline.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::domain::{
    CanonicalRow, CanonicalSeries, Diagnostics, DropReason, DuplicatePolicy, DuplicateGroup,
    DuplicateResolution, Issue,
};

/// Deduplicate, drop non-finite values and sort by `cd_key` then `ds`.
///
/// Every duplicate `(cd_key, ds)` group is reported with all of its values,
/// whatever the policy. Only `Reject` leaves the pair out of the series.
pub fn validate(
    rows: Vec<CanonicalRow>,
    policy: DuplicatePolicy,
    sample_limit: usize,
) -> (CanonicalSeries, Diagnostics) {
    let input = rows.len();
    let mut diagnostics = Diagnostics::new(sample_limit);

    // BTreeMap order is the output order; values keep emission order.
    let mut groups: BTreeMap<(String, NaiveDate), Vec<f64>> = BTreeMap::new();
    for row in rows {
        if !row.y.is_finite() {
            diagnostics.record(
                Issue::new(DropReason::NonFiniteValue, format!("y = {}", row.y)).for_key(row.cd_key),
            );
            continue;
        }
        groups.entry((row.cd_key, row.ds)).or_default().push(row.y);
    }

    let mut out = Vec::with_capacity(groups.len());
    for ((cd_key, ds), values) in groups {
        if let [y] = values[..] {
            out.push(CanonicalRow::new(cd_key, ds, y));
            continue;
        }

        let (resolution, merged) = resolve(policy, &values);
        diagnostics.record_duplicate(DuplicateGroup {
            cd_key: cd_key.clone(),
            ds,
            values,
            resolution,
        });
        match merged {
            Some(y) if y.is_finite() => out.push(CanonicalRow::new(cd_key, ds, y)),
            Some(y) => diagnostics.record(
                Issue::new(DropReason::NonFiniteValue, format!("merged y = {y} on {ds}"))
                    .for_key(cd_key),
            ),
            None => {}
        }
    }

    let duplicates = diagnostics.duplicates().len();
    if duplicates > 0 {
        warn!(duplicates, ?policy, "duplicate key-date pairs");
    }
    info!(input, output = out.len(), "validated");
    (CanonicalSeries::from_validated(out), diagnostics)
}

fn resolve(policy: DuplicatePolicy, values: &[f64]) -> (DuplicateResolution, Option<f64>) {
    match policy {
        DuplicatePolicy::Reject => (DuplicateResolution::Excluded, None),
        DuplicatePolicy::Sum => (DuplicateResolution::Summed, Some(values.iter().sum())),
        DuplicatePolicy::Mean => {
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            (DuplicateResolution::Averaged, Some(mean))
        }
        DuplicatePolicy::Last => (DuplicateResolution::LastWins, values.last().copied()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dup_rows() -> Vec<CanonicalRow> {
        vec![
            CanonicalRow::new("B", ymd(2024, 1, 1), 1.0),
            CanonicalRow::new("A", ymd(2024, 1, 1), 10.0),
            CanonicalRow::new("A", ymd(2024, 1, 1), 12.0),
        ]
    }

    #[test]
    fn output_is_sorted_by_key_then_date() {
        let rows = vec![
            CanonicalRow::new("b", ymd(2024, 1, 2), 1.0),
            CanonicalRow::new("a", ymd(2024, 1, 3), 2.0),
            CanonicalRow::new("a", ymd(2024, 1, 1), 3.0),
            CanonicalRow::new("B", ymd(2024, 1, 1), 4.0),
        ];
        let (series, diag) = validate(rows, DuplicatePolicy::Reject, 20);
        let order: Vec<(&str, NaiveDate)> = series.iter().map(|r| (r.cd_key.as_str(), r.ds)).collect();
        assert_eq!(
            order,
            vec![
                ("B", ymd(2024, 1, 1)),
                ("a", ymd(2024, 1, 1)),
                ("a", ymd(2024, 1, 3)),
                ("b", ymd(2024, 1, 2)),
            ]
        );
        assert!(diag.is_empty());
    }

    #[test]
    fn duplicates_rejected_by_default() {
        let (series, diag) = validate(dup_rows(), DuplicatePolicy::default(), 20);
        assert_eq!(series.rows(), &[CanonicalRow::new("B", ymd(2024, 1, 1), 1.0)]);
        assert_eq!(diag.count(DropReason::DuplicateKeyDate), 1);
        let group = &diag.duplicates()[0];
        assert_eq!(group.values, vec![10.0, 12.0]);
        assert_eq!(group.resolution, DuplicateResolution::Excluded);
    }

    #[test]
    fn duplicate_policies_aggregate_when_opted_in() {
        let a = |policy| {
            let (series, diag) = validate(dup_rows(), policy, 20);
            assert_eq!(diag.count(DropReason::DuplicateKeyDate), 1);
            series.rows()[0].y
        };
        assert_eq!(a(DuplicatePolicy::Sum), 22.0);
        assert_eq!(a(DuplicatePolicy::Mean), 11.0);
        assert_eq!(a(DuplicatePolicy::Last), 12.0);
    }

    #[test]
    fn non_finite_values_are_dropped() {
        let rows = vec![
            CanonicalRow::new("A", ymd(2024, 1, 1), f64::NAN),
            CanonicalRow::new("A", ymd(2024, 1, 2), 1.0),
        ];
        let (series, diag) = validate(rows, DuplicatePolicy::Reject, 20);
        assert_eq!(series.len(), 1);
        assert_eq!(diag.count(DropReason::NonFiniteValue), 1);
    }

    #[test]
    fn overflowing_sum_is_dropped() {
        let rows = vec![
            CanonicalRow::new("A", ymd(2024, 1, 1), f64::MAX),
            CanonicalRow::new("A", ymd(2024, 1, 1), f64::MAX),
        ];
        let (series, diag) = validate(rows, DuplicatePolicy::Sum, 20);
        assert!(series.is_empty());
        assert_eq!(diag.count(DropReason::DuplicateKeyDate), 1);
        assert_eq!(diag.count(DropReason::NonFiniteValue), 1);
    }
}
