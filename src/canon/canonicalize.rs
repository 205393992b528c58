//! Long and wide tables to unsorted canonical rows.
//!
//! Work is split into disjoint shards (row batches for long tables, header
//! columns for wide ones) evaluated with rayon. Shards only read the table,
//! and their outputs are stitched back together in emission order:
//! row by row, and within a row header by header.

use rayon::prelude::*;
use tracing::{debug, info};

use super::CancelToken;
use crate::domain::{
    CanonicalRow, CellValue, DateSource, Diagnostics, DropReason, Issue, KeySpec, MappingSpec,
    RawTable, ShapeClassification, ValueSource,
};
use crate::error::{MappingError, MappingProblem, PipelineError, Role};
use crate::mapping::{build_cd_key, column_indices};
use crate::parse::{CellFailure, parse_date_cell, parse_header_date, parse_number_cell};

const ROW_BATCH: usize = 2048;

static NULL: CellValue = CellValue::Null;

/// Expand `table` into canonical rows, recording every excluded cell.
pub fn canonicalize(
    table: &RawTable,
    classification: &ShapeClassification,
    mapping: &MappingSpec,
    key_spec: &KeySpec,
    sample_limit: usize,
) -> Result<(Vec<CanonicalRow>, Diagnostics), PipelineError> {
    canonicalize_cancellable(
        table,
        classification,
        mapping,
        key_spec,
        sample_limit,
        &CancelToken::new(),
    )
}

/// As [`canonicalize`], giving up with `PipelineError::Cancelled` once
/// `cancel` is set. Nothing computed before cancellation is returned.
pub fn canonicalize_cancellable(
    table: &RawTable,
    classification: &ShapeClassification,
    mapping: &MappingSpec,
    key_spec: &KeySpec,
    sample_limit: usize,
    cancel: &CancelToken,
) -> Result<(Vec<CanonicalRow>, Diagnostics), PipelineError> {
    if mapping.shape() != classification.shape {
        debug!(
            detected = ?classification.shape,
            mapped = ?mapping.shape(),
            "mapping overrides the detected layout"
        );
    }

    let key_indices = resolve(table, &mapping.key_columns, Role::Key)?;
    let out = match (&mapping.date_source, &mapping.value_source) {
        (DateSource::Column(date), ValueSource::Column(value)) => {
            let date_idx = resolve_one(table, date, Role::Date)?;
            let value_idx = resolve_one(table, value, Role::Value)?;
            let ctx = Context {
                table,
                key_indices: &key_indices,
                key_spec,
                sample_limit,
            };
            long(&ctx, date_idx, value_idx, cancel)
        }
        (DateSource::Headers(headers), _) => {
            let header_indices = resolve(table, headers, Role::Date)?;
            let ctx = Context {
                table,
                key_indices: &key_indices,
                key_spec,
                sample_limit,
            };
            wide(&ctx, &header_indices, cancel)
        }
        (DateSource::Column(_), ValueSource::Headers(_)) => {
            return Err(MappingError::new(vec![MappingProblem::NoValueSource]).into());
        }
    };

    let (rows, diagnostics) = out.ok_or(PipelineError::Cancelled)?;
    info!(
        shape = ?mapping.shape(),
        input_rows = table.row_count(),
        emitted = rows.len(),
        excluded = diagnostics.total(),
        "canonicalized"
    );
    Ok((rows, diagnostics))
}

struct Context<'a> {
    table: &'a RawTable,
    key_indices: &'a [usize],
    key_spec: &'a KeySpec,
    sample_limit: usize,
}

impl Context<'_> {
    fn key(&self, row: usize) -> String {
        build_cd_key(self.table, row, self.key_indices, self.key_spec)
    }
}

type Shard = (Vec<CanonicalRow>, Diagnostics);

fn long(ctx: &Context<'_>, date_idx: usize, value_idx: usize, cancel: &CancelToken) -> Option<Shard> {
    let table = ctx.table;
    let date_name = table.columns()[date_idx].name();
    let value_name = table.columns()[value_idx].name();
    let starts: Vec<usize> = (0..table.row_count()).step_by(ROW_BATCH).collect();

    let shards: Option<Vec<Shard>> = starts
        .par_iter()
        .map(|&start| {
            if cancel.is_cancelled() {
                return None;
            }
            let end = (start + ROW_BATCH).min(table.row_count());
            let mut rows = Vec::with_capacity(end - start);
            let mut diag = Diagnostics::new(ctx.sample_limit);
            for row in start..end {
                let cd_key = ctx.key(row);
                let date_cell = cell(table, row, date_idx);
                let ds = match parse_date_cell(date_cell) {
                    Ok(ds) => ds,
                    Err(failure) => {
                        diag.record(date_issue(failure, date_cell, row, date_name, &cd_key));
                        continue;
                    }
                };
                let value_cell = cell(table, row, value_idx);
                match parse_number_cell(value_cell) {
                    Ok(y) => rows.push(CanonicalRow::new(cd_key, ds, y)),
                    Err(failure) => {
                        diag.record(value_issue(failure, value_cell, row, value_name, &cd_key));
                    }
                }
            }
            Some((rows, diag))
        })
        .collect();

    Some(concat(shards?, ctx.sample_limit))
}

fn wide(ctx: &Context<'_>, header_indices: &[usize], cancel: &CancelToken) -> Option<Shard> {
    let table = ctx.table;
    let mut diagnostics = Diagnostics::new(ctx.sample_limit);

    let mut columns = Vec::with_capacity(header_indices.len());
    for &col in header_indices {
        let header = table.columns()[col].name();
        match parse_header_date(header) {
            Some(ds) => columns.push((col, ds)),
            None => diagnostics.record(
                Issue::new(
                    DropReason::UnparseableDate,
                    format!("header `{header}` is not a date; column skipped"),
                )
                .in_column(header),
            ),
        }
    }

    let keys: Vec<String> = (0..table.row_count()).map(|row| ctx.key(row)).collect();

    let shards: Option<Vec<(Vec<(usize, CanonicalRow)>, Diagnostics)>> = columns
        .par_iter()
        .map(|&(col, ds)| {
            if cancel.is_cancelled() {
                return None;
            }
            let header = table.columns()[col].name();
            let mut rows = Vec::with_capacity(keys.len());
            let mut diag = Diagnostics::new(ctx.sample_limit);
            for (row, cd_key) in keys.iter().enumerate() {
                let value = cell(table, row, col);
                match parse_number_cell(value) {
                    Ok(y) => rows.push((row, CanonicalRow::new(cd_key.clone(), ds, y))),
                    Err(failure) => diag.record(value_issue(failure, value, row, header, cd_key)),
                }
            }
            Some((rows, diag))
        })
        .collect();

    // Header-major shards back to row-major emission order.
    let mut tagged = Vec::new();
    for (pos, (rows, diag)) in shards?.into_iter().enumerate() {
        diagnostics.merge(diag);
        tagged.extend(rows.into_iter().map(|(row, r)| (row, pos, r)));
    }
    tagged.sort_by_key(|(row, pos, _)| (*row, *pos));

    Some((tagged.into_iter().map(|(_, _, r)| r).collect(), diagnostics))
}

fn concat(shards: Vec<Shard>, sample_limit: usize) -> Shard {
    let mut rows = Vec::new();
    let mut diagnostics = Diagnostics::new(sample_limit);
    for (part, diag) in shards {
        rows.extend(part);
        diagnostics.merge(diag);
    }
    (rows, diagnostics)
}

fn cell(table: &RawTable, row: usize, col: usize) -> &CellValue {
    table.cell(row, col).unwrap_or(&NULL)
}

fn date_issue(failure: CellFailure, value: &CellValue, row: usize, column: &str, cd_key: &str) -> Issue {
    let detail = match failure {
        CellFailure::Missing => "empty date".to_string(),
        CellFailure::Invalid | CellFailure::NonFinite => format!("`{value}` is not a date"),
    };
    Issue::new(DropReason::UnparseableDate, detail)
        .at_row(row)
        .in_column(column)
        .for_key(cd_key)
}

fn value_issue(failure: CellFailure, value: &CellValue, row: usize, column: &str, cd_key: &str) -> Issue {
    let (reason, detail) = match failure {
        CellFailure::Missing => (DropReason::NullValue, "empty value".to_string()),
        CellFailure::Invalid => (DropReason::NonNumericValue, format!("`{value}` is not a number")),
        CellFailure::NonFinite => (DropReason::NonFiniteValue, format!("`{value}` is not finite")),
    };
    Issue::new(reason, detail).at_row(row).in_column(column).for_key(cd_key)
}

fn resolve(table: &RawTable, names: &[String], role: Role) -> Result<Vec<usize>, MappingError> {
    column_indices(table, names).ok_or_else(|| {
        let problems = names
            .iter()
            .filter(|n| table.column_index(n).is_none())
            .map(|n| MappingProblem::UnknownColumn {
                role,
                column: n.clone(),
            })
            .collect();
        MappingError::new(problems)
    })
}

fn resolve_one(table: &RawTable, name: &str, role: Role) -> Result<usize, MappingError> {
    table.column_index(name).ok_or_else(|| {
        MappingError::new(vec![MappingProblem::UnknownColumn {
            role,
            column: name.to_string(),
        }])
    })
}
