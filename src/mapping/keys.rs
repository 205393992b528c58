//! Entity key (`cd_key`) construction.

use crate::domain::{KeySpec, RawTable};
use crate::error::{MappingError, MappingProblem, Role};

/// Join the key parts of one row. Blank or null parts become the null token.
pub fn build_cd_key(table: &RawTable, row: usize, key_indices: &[usize], spec: &KeySpec) -> String {
    let parts: Vec<String> = key_indices
        .iter()
        .map(|&col| {
            let part = table.cell(row, col).map(ToString::to_string).unwrap_or_default();
            if part.is_empty() {
                spec.null_token.clone()
            } else {
                part
            }
        })
        .collect();
    parts.join(&spec.separator)
}

/// Trim, drop blanks and repeats, and check every name exists.
///
/// Unknown names are reported through `problems`; the known ones are returned
/// in declaration order.
pub fn normalize_key_columns(
    table: &RawTable,
    declared: &[String],
    problems: &mut Vec<MappingProblem>,
) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(declared.len());
    for name in declared {
        let name = name.trim();
        if name.is_empty() || out.iter().any(|k| k == name) {
            continue;
        }
        if table.column(name).is_none() {
            problems.push(MappingProblem::UnknownColumn {
                role: Role::Key,
                column: name.to_string(),
            });
            continue;
        }
        out.push(name.to_string());
    }
    out
}

/// Column positions for `names`, or `None` if any is missing.
pub fn column_indices(table: &RawTable, names: &[String]) -> Option<Vec<usize>> {
    names.iter().map(|n| table.column_index(n)).collect()
}

/// The first `limit` keys a given key choice would produce.
pub fn preview_keys(
    table: &RawTable,
    key_columns: &[String],
    spec: &KeySpec,
    limit: usize,
) -> Result<Vec<String>, MappingError> {
    let mut problems = Vec::new();
    let keys = normalize_key_columns(table, key_columns, &mut problems);
    if keys.is_empty() && problems.is_empty() {
        problems.push(MappingProblem::NoKeyColumn);
    }
    if !problems.is_empty() {
        return Err(MappingError::new(problems));
    }

    let indices = column_indices(table, &keys).unwrap_or_default();
    Ok((0..table.row_count().min(limit))
        .map(|row| build_cd_key(table, row, &indices, spec))
        .collect())
}
