//! Column-role resolution.
//!
//! Caller-declared roles always win. Anything left open is filled in from the
//! shape evidence and the cached column classes:
//! - keys: every text column not used as a date or value source
//! - long date source: the best date-valued column
//! - long value source: the first remaining numeric column
//! - wide date/value source: the date-like header set
//!
//! A table with no usable key is an error, never one implicit entity.

use tracing::{info, warn};

use crate::domain::{
    DateSource, MappingOverrides, MappingSpec, PipelineConfig, Shape, ShapeClassification,
    ValueSource,
};
use crate::error::{MappingError, MappingProblem, Role};
use crate::profile::{ColumnClass, TableProfile};

pub mod keys;

pub use keys::{build_cd_key, column_indices, normalize_key_columns, preview_keys};

/// Merge declared roles with detected ones into a complete mapping.
pub fn build_mapping(
    classification: &ShapeClassification,
    overrides: Option<&MappingOverrides>,
    profile: &TableProfile<'_>,
    config: &PipelineConfig,
) -> Result<MappingSpec, MappingError> {
    let empty = MappingOverrides::default();
    let overrides = overrides.unwrap_or(&empty);
    let table = profile.table();
    let mut problems = Vec::new();

    let declared_keys = overrides
        .key_columns
        .as_deref()
        .map(|keys| normalize_key_columns(table, keys, &mut problems));

    let shape = match &overrides.date_source {
        Some(source) => Some(source.shape()),
        None if classification.is_confident(config.confidence_floor) => Some(classification.shape),
        None => {
            problems.push(MappingProblem::AmbiguousShape {
                shape: classification.shape,
                confidence: classification.confidence,
            });
            None
        }
    };

    let sources = match shape {
        Some(Shape::Long) => {
            let keys = declared_keys.as_deref();
            resolve_long(classification, overrides, profile, keys, &mut problems)
        }
        Some(Shape::Wide) => {
            let keys = declared_keys.as_deref();
            resolve_wide(classification, overrides, profile, keys, &mut problems)
        }
        Some(Shape::Ambiguous) | None => None,
    };

    let used: Vec<&str> = match &sources {
        Some((DateSource::Column(date), ValueSource::Column(value))) => {
            vec![date.as_str(), value.as_str()]
        }
        Some((DateSource::Headers(headers), _)) => headers.iter().map(String::as_str).collect(),
        _ => Vec::new(),
    };

    let key_columns = match declared_keys {
        Some(keys) => keys,
        None => profile
            .columns()
            .iter()
            .filter(|c| c.class == ColumnClass::Text && !used.contains(&c.name.as_str()))
            .map(|c| c.name.clone())
            .collect(),
    };

    let unknown_key = problems
        .iter()
        .any(|p| matches!(p, MappingProblem::UnknownColumn { role: Role::Key, .. }));
    if key_columns.is_empty() && !unknown_key {
        problems.push(MappingProblem::NoKeyColumn);
    }

    if let Some((date_source, value_source)) = &sources {
        check_conflicts(&key_columns, date_source, value_source, &mut problems);
    }

    if !problems.is_empty() {
        return Err(MappingError::new(problems));
    }
    let Some((date_source, value_source)) = sources else {
        return Err(MappingError::new(vec![MappingProblem::NoDateSource]));
    };

    let spec = MappingSpec {
        key_columns,
        date_source,
        value_source,
    };
    info!(
        shape = ?spec.shape(),
        keys = ?spec.key_columns,
        declared = !overrides.is_empty(),
        "mapping resolved"
    );
    Ok(spec)
}

fn resolve_long(
    classification: &ShapeClassification,
    overrides: &MappingOverrides,
    profile: &TableProfile<'_>,
    declared_keys: Option<&[String]>,
    problems: &mut Vec<MappingProblem>,
) -> Option<(DateSource, ValueSource)> {
    let is_key = |name: &str| declared_keys.is_some_and(|keys| keys.iter().any(|k| k == name));

    let date = match &overrides.date_source {
        Some(DateSource::Column(name)) => require_column(profile, name, Role::Date, problems),
        _ => classification
            .evidence
            .best_date_column
            .clone()
            .filter(|name| !is_key(name))
            .or_else(|| {
                profile
                    .date_candidates()
                    .into_iter()
                    .find(|c| !is_key(&c.name))
                    .map(|c| c.name.clone())
            }),
    };
    if date.is_none() && !matches!(overrides.date_source, Some(DateSource::Column(_))) {
        problems.push(MappingProblem::NoDateSource);
    }

    let value = match &overrides.value_column {
        Some(name) => require_column(profile, name, Role::Value, problems),
        None => {
            let candidates: Vec<&str> = profile
                .columns()
                .iter()
                .filter(|c| {
                    c.class == ColumnClass::Numeric
                        && !is_key(&c.name)
                        && date.as_deref() != Some(c.name.as_str())
                })
                .map(|c| c.name.as_str())
                .collect();
            if candidates.len() > 1 {
                warn!(chosen = candidates[0], others = ?&candidates[1..], "several numeric value candidates");
            }
            let first = candidates.first().map(|s| s.to_string());
            if first.is_none() {
                problems.push(MappingProblem::NoValueSource);
            }
            first
        }
    };

    Some((DateSource::Column(date?), ValueSource::Column(value?)))
}

fn resolve_wide(
    classification: &ShapeClassification,
    overrides: &MappingOverrides,
    profile: &TableProfile<'_>,
    declared_keys: Option<&[String]>,
    problems: &mut Vec<MappingProblem>,
) -> Option<(DateSource, ValueSource)> {
    if let Some(value) = &overrides.value_column {
        warn!(column = %value, "value column ignored for a wide layout");
    }

    let headers: Vec<String> = match &overrides.date_source {
        Some(DateSource::Headers(declared)) => declared
            .iter()
            .filter_map(|name| require_column(profile, name, Role::Date, problems))
            .collect(),
        _ => classification
            .evidence
            .date_headers
            .iter()
            .filter(|h| declared_keys.is_none_or(|keys| !keys.contains(*h)))
            .cloned()
            .collect(),
    };

    if headers.is_empty() {
        problems.push(MappingProblem::EmptyHeaderSet);
        return None;
    }
    Some((DateSource::Headers(headers.clone()), ValueSource::Headers(headers)))
}

fn require_column(
    profile: &TableProfile<'_>,
    name: &str,
    role: Role,
    problems: &mut Vec<MappingProblem>,
) -> Option<String> {
    if profile.contains(name) {
        Some(name.to_string())
    } else {
        problems.push(MappingProblem::UnknownColumn {
            role,
            column: name.to_string(),
        });
        None
    }
}

fn check_conflicts(
    keys: &[String],
    date_source: &DateSource,
    value_source: &ValueSource,
    problems: &mut Vec<MappingProblem>,
) {
    let mut conflict = |column: &str, first: Role, second: Role| {
        problems.push(MappingProblem::ConflictingRoles {
            column: column.to_string(),
            first,
            second,
        });
    };

    match (date_source, value_source) {
        (DateSource::Column(date), ValueSource::Column(value)) => {
            for key in keys {
                if key == date {
                    conflict(key, Role::Key, Role::Date);
                }
                if key == value {
                    conflict(key, Role::Key, Role::Value);
                }
            }
            if date == value {
                conflict(date, Role::Date, Role::Value);
            }
        }
        (DateSource::Headers(headers), _) => {
            for key in keys.iter().filter(|k| headers.contains(*k)) {
                conflict(key, Role::Key, Role::Date);
            }
        }
        (DateSource::Column(_), ValueSource::Headers(_)) => {}
    }
}

/// Numeric columns a long mapping left unused. Non-empty means the value
/// column was a guess among several.
pub fn unused_numeric_columns(profile: &TableProfile<'_>, spec: &MappingSpec) -> Vec<String> {
    let (DateSource::Column(date), ValueSource::Column(value)) = (&spec.date_source, &spec.value_source) else {
        return Vec::new();
    };
    profile
        .columns()
        .iter()
        .filter(|c| {
            c.class == ColumnClass::Numeric
                && &c.name != date
                && &c.name != value
                && !spec.key_columns.contains(&c.name)
        })
        .map(|c| c.name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RawTable, ShapeThresholds};
    use crate::profile::detect_shape;

    fn long_table() -> RawTable {
        RawTable::from_rows(
            &["store_id", "date", "sales"],
            vec![
                vec!["A".into(), "2024-01-08".into(), 100i64.into()],
                vec!["B".into(), "2024-01-08".into(), 90i64.into()],
            ],
        )
        .unwrap()
    }

    fn wide_table() -> RawTable {
        RawTable::from_rows(
            &["Store", "Region", "Jan-2024", "Feb-2024", "Mar-2024", "Apr-2024"],
            vec![
                vec!["A".into(), "N".into(), 10i64.into(), 12i64.into(), 1i64.into(), 1i64.into()],
                vec!["B".into(), "S".into(), 5i64.into(), 7i64.into(), 1i64.into(), 1i64.into()],
            ],
        )
        .unwrap()
    }

    fn map(table: &RawTable, overrides: Option<&MappingOverrides>) -> Result<MappingSpec, MappingError> {
        let profile = TableProfile::build(table, 1000);
        let shape = detect_shape(&profile, &ShapeThresholds::default());
        build_mapping(&shape, overrides, &profile, &PipelineConfig::default())
    }

    #[test]
    fn long_roles_are_inferred() {
        let spec = map(&long_table(), None).unwrap();
        assert_eq!(spec, MappingSpec::long(vec!["store_id".to_string()], "date", "sales"));
    }

    #[test]
    fn wide_roles_are_inferred() {
        let spec = map(&wide_table(), None).unwrap();
        assert_eq!(spec.shape(), Shape::Wide);
        assert_eq!(spec.key_columns, vec!["Store".to_string(), "Region".to_string()]);
        let DateSource::Headers(headers) = &spec.date_source else {
            panic!("expected headers");
        };
        assert_eq!(headers.len(), 4);
        assert_eq!(spec.value_source, ValueSource::Headers(headers.clone()));
    }

    #[test]
    fn declared_keys_win() {
        let overrides = MappingOverrides {
            key_columns: Some(vec!["Region".to_string()]),
            ..Default::default()
        };
        let spec = map(&wide_table(), Some(&overrides)).unwrap();
        assert_eq!(spec.key_columns, vec!["Region".to_string()]);
    }

    #[test]
    fn ambiguous_without_date_source_fails() {
        let table = RawTable::from_rows(
            &["sku", "wk1", "wk2"],
            vec![vec!["A".into(), 1i64.into(), 2i64.into()]],
        )
        .unwrap();
        let err = map(&table, None).unwrap_err();
        assert!(matches!(err.problems[0], MappingProblem::AmbiguousShape { .. }));
    }

    #[test]
    fn declared_date_source_resolves_ambiguity() {
        let table = RawTable::from_rows(
            &["sku", "wk1", "wk2"],
            vec![vec!["A".into(), 1i64.into(), 2i64.into()]],
        )
        .unwrap();
        let overrides = MappingOverrides {
            date_source: Some(DateSource::Headers(vec!["wk1".to_string(), "wk2".to_string()])),
            ..Default::default()
        };
        let spec = map(&table, Some(&overrides)).unwrap();
        assert_eq!(spec, MappingSpec::wide(vec!["sku".to_string()], vec!["wk1".to_string(), "wk2".to_string()]));
    }

    #[test]
    fn missing_key_is_an_error() {
        let table = RawTable::from_rows(
            &["date", "sales"],
            vec![
                vec!["2024-01-01".into(), 1i64.into()],
                vec!["2024-01-02".into(), 2i64.into()],
            ],
        )
        .unwrap();
        let err = map(&table, None).unwrap_err();
        assert_eq!(err.problems, vec![MappingProblem::NoKeyColumn]);
    }

    #[test]
    fn unknown_and_conflicting_columns_are_all_reported() {
        let overrides = MappingOverrides {
            key_columns: Some(vec!["store_id".to_string(), "date".to_string()]),
            date_source: Some(DateSource::Column("date".to_string())),
            value_column: Some("revenue".to_string()),
        };
        let err = map(&long_table(), Some(&overrides)).unwrap_err();
        assert!(err.has(&MappingProblem::UnknownColumn {
            role: Role::Value,
            column: "revenue".to_string()
        }));
        assert!(err.to_string().contains("revenue"));
    }

    #[test]
    fn key_declared_as_date_conflicts() {
        let overrides = MappingOverrides {
            key_columns: Some(vec!["date".to_string()]),
            date_source: Some(DateSource::Column("date".to_string())),
            value_column: Some("sales".to_string()),
        };
        let err = map(&long_table(), Some(&overrides)).unwrap_err();
        assert!(err.has(&MappingProblem::ConflictingRoles {
            column: "date".to_string(),
            first: Role::Key,
            second: Role::Date
        }));
    }

    #[test]
    fn extra_numeric_columns_are_reported() {
        let table = RawTable::from_rows(
            &["id", "date", "units", "price"],
            vec![vec!["A".into(), "2024-01-01".into(), 1i64.into(), 2.5.into()]],
        )
        .unwrap();
        let profile = TableProfile::build(&table, 1000);
        let shape = detect_shape(&profile, &ShapeThresholds::default());
        let spec = build_mapping(&shape, None, &profile, &PipelineConfig::default()).unwrap();
        assert_eq!(spec.value_source, ValueSource::Column("units".to_string()));
        assert_eq!(unused_numeric_columns(&profile, &spec), vec!["price".to_string()]);
    }
}
