//! Record of everything excluded or flagged during a run.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Why a row or cell was excluded or flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    DuplicateKeyDate,
    UnparseableDate,
    NonNumericValue,
    NullValue,
    NonFiniteValue,
}

impl DropReason {
    pub const ALL: [DropReason; 5] = [
        DropReason::DuplicateKeyDate,
        DropReason::UnparseableDate,
        DropReason::NonNumericValue,
        DropReason::NullValue,
        DropReason::NonFiniteValue,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            DropReason::DuplicateKeyDate => "duplicate key-date",
            DropReason::UnparseableDate => "unparseable date",
            DropReason::NonNumericValue => "non-numeric value",
            DropReason::NullValue => "null value",
            DropReason::NonFiniteValue => "non-finite value",
        }
    }
}

/// One sampled occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub reason: DropReason,
    /// Zero-based data row, when the issue is tied to one.
    pub row: Option<usize>,
    pub column: Option<String>,
    pub cd_key: Option<String>,
    pub detail: String,
}

impl Issue {
    pub fn new(reason: DropReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            row: None,
            column: None,
            cd_key: None,
            detail: detail.into(),
        }
    }

    pub fn at_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    pub fn in_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn for_key(mut self, cd_key: impl Into<String>) -> Self {
        self.cd_key = Some(cd_key.into());
        self
    }
}

/// How a duplicate `(cd_key, ds)` group was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateResolution {
    Excluded,
    Summed,
    Averaged,
    LastWins,
}

/// All values that collided on one key-date pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub cd_key: String,
    pub ds: NaiveDate,
    pub values: Vec<f64>,
    pub resolution: DuplicateResolution,
}

/// Counts per reason, bounded samples per reason, and every duplicate group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    counts: BTreeMap<DropReason, usize>,
    samples: BTreeMap<DropReason, Vec<Issue>>,
    duplicates: Vec<DuplicateGroup>,
    sample_limit: usize,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(20)
    }
}

impl Diagnostics {
    pub fn new(sample_limit: usize) -> Self {
        Self {
            counts: BTreeMap::new(),
            samples: BTreeMap::new(),
            duplicates: Vec::new(),
            sample_limit,
        }
    }

    pub fn record(&mut self, issue: Issue) {
        *self.counts.entry(issue.reason).or_insert(0) += 1;
        let samples = self.samples.entry(issue.reason).or_default();
        if samples.len() < self.sample_limit {
            samples.push(issue);
        }
    }

    /// A duplicate group counts once under `DuplicateKeyDate`.
    pub fn record_duplicate(&mut self, group: DuplicateGroup) {
        let detail = format!(
            "{} values for {} on {}: {:?} ({:?})",
            group.values.len(),
            group.cd_key,
            group.ds,
            group.values,
            group.resolution
        );
        self.record(Issue::new(DropReason::DuplicateKeyDate, detail).for_key(group.cd_key.clone()));
        self.duplicates.push(group);
    }

    /// Fold `other` into `self`, keeping this report's sample limit.
    pub fn merge(&mut self, other: Diagnostics) {
        for (reason, count) in other.counts {
            *self.counts.entry(reason).or_insert(0) += count;
        }
        for (reason, issues) in other.samples {
            let samples = self.samples.entry(reason).or_default();
            let room = self.sample_limit.saturating_sub(samples.len());
            samples.extend(issues.into_iter().take(room));
        }
        self.duplicates.extend(other.duplicates);
    }

    pub fn count(&self, reason: DropReason) -> usize {
        self.counts.get(&reason).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn counts(&self) -> impl Iterator<Item = (DropReason, usize)> + '_ {
        self.counts.iter().map(|(reason, count)| (*reason, *count))
    }

    pub fn samples(&self, reason: DropReason) -> &[Issue] {
        self.samples.get(&reason).map_or(&[], Vec::as_slice)
    }

    pub fn duplicates(&self) -> &[DuplicateGroup] {
        &self.duplicates
    }

    pub fn sample_limit(&self) -> usize {
        self.sample_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_are_bounded_but_counts_are_not() {
        let mut diag = Diagnostics::new(2);
        for row in 0..5 {
            diag.record(Issue::new(DropReason::NullValue, "null").at_row(row));
        }
        assert_eq!(diag.count(DropReason::NullValue), 5);
        assert_eq!(diag.samples(DropReason::NullValue).len(), 2);
        assert_eq!(diag.count(DropReason::UnparseableDate), 0);
    }

    #[test]
    fn merge_adds_counts() {
        let mut a = Diagnostics::new(10);
        a.record(Issue::new(DropReason::NullValue, "a"));
        let mut b = Diagnostics::new(10);
        b.record(Issue::new(DropReason::NullValue, "b"));
        b.record(Issue::new(DropReason::NonNumericValue, "c"));
        a.merge(b);
        assert_eq!(a.count(DropReason::NullValue), 2);
        assert_eq!(a.total(), 3);
        assert_eq!(a.samples(DropReason::NullValue).len(), 2);
    }
}
