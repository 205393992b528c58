//! The profiling and canonicalization workflow shared by every front-end.
//!
//! profile -> shape -> mapping -> frequency -> canonicalize -> validate
//!
//! Each stage takes the previous stage's value and returns a new one; the
//! table itself is only ever borrowed.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::canon::{CancelToken, canonicalize_cancellable, validate};
use crate::domain::{
    CanonicalSeries, DateSource, Diagnostics, FrequencyLabel, MappingOverrides, MappingSpec,
    PipelineConfig, RawTable, Shape, ShapeClassification, ValueSource, Warning,
};
use crate::error::PipelineError;
use crate::mapping::{build_mapping, unused_numeric_columns};
use crate::parse::{parse_date_cell, parse_header_date};
use crate::profile::{ColumnProfile, TableProfile, detect_shape, infer_frequency};

/// Everything a successful run hands downstream.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub series: CanonicalSeries,
    pub diagnostics: Diagnostics,
    pub shape: ShapeClassification,
    pub frequency: FrequencyLabel,
    pub mapping: MappingSpec,
    pub warnings: Vec<Warning>,
}

/// Profiling results without a conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileOutput {
    pub rows: usize,
    pub columns: Vec<ColumnProfile>,
    /// Date-valued columns, best first.
    pub date_candidates: Vec<String>,
    pub shape: ShapeClassification,
    /// Inferred from the best date column or the date headers, if any.
    pub frequency: Option<FrequencyLabel>,
}

/// Inspect a table without converting it.
pub fn profile_table(
    table: &RawTable,
    config: &PipelineConfig,
) -> Result<ProfileOutput, PipelineError> {
    config.validate()?;
    let profile = TableProfile::build(table, config.classify_sample_limit);
    let shape = detect_shape(&profile, &config.shape);

    let source = match shape.shape {
        Shape::Wide => Some(DateSource::Headers(shape.evidence.date_headers.clone())),
        _ => shape.evidence.best_date_column.clone().map(DateSource::Column),
    };
    let frequency = source.map(|s| infer_frequency(&observed_dates(table, &s), &config.frequency));

    Ok(ProfileOutput {
        rows: table.row_count(),
        columns: profile.columns().to_vec(),
        date_candidates: profile.date_candidates().iter().map(|c| c.name.clone()).collect(),
        shape,
        frequency,
    })
}

/// Run the whole pipeline on one table.
pub fn run_pipeline(
    table: &RawTable,
    overrides: Option<&MappingOverrides>,
    config: &PipelineConfig,
) -> Result<PipelineOutput, PipelineError> {
    run_pipeline_cancellable(table, overrides, config, &CancelToken::new())
}

/// As [`run_pipeline`], stopping with `PipelineError::Cancelled` once `cancel`
/// is set.
pub fn run_pipeline_cancellable(
    table: &RawTable,
    overrides: Option<&MappingOverrides>,
    config: &PipelineConfig,
    cancel: &CancelToken,
) -> Result<PipelineOutput, PipelineError> {
    config.validate()?;

    // 1) Classify columns once; every later stage reads this.
    let profile = TableProfile::build(table, config.classify_sample_limit);

    // 2) Layout.
    let shape = detect_shape(&profile, &config.shape);
    let declared_date = overrides.is_some_and(|o| o.date_source.is_some());
    if !declared_date && !shape.is_confident(config.confidence_floor) {
        return Err(PipelineError::ShapeAmbiguous {
            shape: shape.shape,
            confidence: shape.confidence,
            floor: config.confidence_floor,
            evidence: shape.evidence,
        });
    }

    // 3) Column roles.
    let mapping = build_mapping(&shape, overrides, &profile, config)?;
    let mut warnings = Vec::new();
    let declared_value = overrides.is_some_and(|o| o.value_column.is_some());
    if let (false, ValueSource::Column(chosen)) = (declared_value, &mapping.value_source) {
        let others = unused_numeric_columns(&profile, &mapping);
        if !others.is_empty() {
            warnings.push(Warning::ValueColumnGuessed {
                chosen: chosen.clone(),
                others,
            });
        }
    }

    // 4) Cadence.
    let dates = observed_dates(table, &mapping.date_source);
    let frequency = infer_frequency(&dates, &config.frequency);
    if frequency.is_irregular() {
        warnings.push(Warning::FrequencyInconclusive {
            confidence: frequency.confidence,
            notes: frequency.notes.clone(),
        });
    }

    // 5) Expand and 6) validate.
    let (rows, mut diagnostics) = canonicalize_cancellable(
        table,
        &shape,
        &mapping,
        &config.key_spec(),
        config.diagnostic_sample_limit,
        cancel,
    )?;
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    let (series, checked) = validate(rows, config.duplicate_policy, config.diagnostic_sample_limit);
    diagnostics.merge(checked);

    info!(
        shape = ?mapping.shape(),
        frequency = ?frequency.frequency,
        rows = series.len(),
        keys = series.keys().len(),
        excluded = diagnostics.total(),
        warnings = warnings.len(),
        "pipeline finished"
    );

    Ok(PipelineOutput {
        series,
        diagnostics,
        shape,
        frequency,
        mapping,
        warnings,
    })
}

/// Dates the frequency is inferred from: the parsed date column, or the
/// parsed headers of a wide table.
fn observed_dates(table: &RawTable, source: &DateSource) -> Vec<NaiveDate> {
    match source {
        DateSource::Column(name) => table
            .column(name)
            .map(|c| c.values().iter().filter_map(|v| parse_date_cell(v).ok()).collect())
            .unwrap_or_default(),
        DateSource::Headers(headers) => headers.iter().filter_map(|h| parse_header_date(h)).collect(),
    }
}
