//! Canonical series exports (CSV or Parquet) and the diagnostics JSON.
//!
//! Both formats carry exactly `cd_key`, `ds`, `y`. CSV dates are ISO text;
//! Parquet uses a `Date32` column and non-nullable fields.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Date32Array, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::{Deserialize, Serialize};

use crate::app::pipeline::PipelineOutput;
use crate::domain::{
    CanonicalRow, CanonicalSeries, Diagnostics, FrequencyLabel, MappingSpec, ShapeClassification,
    Warning,
};
use crate::error::AppError;

pub const CANONICAL_HEADERS: [&str; 3] = ["cd_key", "ds", "y"];

/// `num_days_from_ce` of 1970-01-01; `Date32` counts days from there.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

/// `<stem>__canonical_long.<ext>`, next to the input unless `out_dir` is given.
pub fn default_output_path(input: &Path, out_dir: Option<&Path>, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "table".to_string());
    let name = format!("{stem}__canonical_long.{}", format.extension());
    match out_dir.or_else(|| input.parent()) {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

pub fn write_canonical(
    path: &Path,
    series: &CanonicalSeries,
    format: OutputFormat,
) -> Result<(), AppError> {
    match format {
        OutputFormat::Csv => write_canonical_csv(path, series),
        OutputFormat::Parquet => write_canonical_parquet(path, series),
    }
}

/// Write a validated series as `cd_key,ds,y`.
pub fn write_canonical_csv(path: &Path, series: &CanonicalSeries) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(4, format!("Failed to create canonical CSV '{}': {e}", path.display()))
    })?;
    let mut writer = csv::Writer::from_writer(file);

    // An empty series still gets the header row.
    if series.is_empty() {
        writer
            .write_record(CANONICAL_HEADERS)
            .map_err(|e| AppError::new(4, format!("Failed to write canonical CSV header: {e}")))?;
    }
    for row in series {
        writer
            .serialize(row)
            .map_err(|e| AppError::new(4, format!("Failed to write canonical CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(4, format!("Failed to flush canonical CSV: {e}")))?;
    Ok(())
}

/// Read a canonical CSV back. Rows come back as written; they are not
/// re-validated.
pub fn read_canonical_csv(path: &Path) -> Result<Vec<CanonicalRow>, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(2, format!("Failed to open canonical CSV '{}': {e}", path.display()))
    })?;
    let mut reader = csv::Reader::from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read canonical CSV headers: {e}")))?;
    if !headers.iter().eq(CANONICAL_HEADERS) {
        let found: Vec<&str> = headers.iter().collect();
        return Err(AppError::new(
            2,
            format!("Expected columns cd_key,ds,y, found {}", found.join(",")),
        ));
    }

    reader
        .deserialize::<CanonicalRow>()
        .enumerate()
        .map(|(idx, row)| {
            row.map_err(|e| AppError::new(2, format!("Bad canonical row at line {}: {e}", idx + 2)))
        })
        .collect()
}

fn canonical_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(CANONICAL_HEADERS[0], DataType::Utf8, false),
        Field::new(CANONICAL_HEADERS[1], DataType::Date32, false),
        Field::new(CANONICAL_HEADERS[2], DataType::Float64, false),
    ]))
}

/// Write a validated series as a single-row-group Parquet file.
pub fn write_canonical_parquet(path: &Path, series: &CanonicalSeries) -> Result<(), AppError> {
    let schema = canonical_schema();
    let keys: Vec<&str> = series.iter().map(|r| r.cd_key.as_str()).collect();
    let days: Vec<i32> = series
        .iter()
        .map(|r| r.ds.num_days_from_ce() - EPOCH_DAYS_FROM_CE)
        .collect();
    let values: Vec<f64> = series.iter().map(|r| r.y).collect();

    let columns = vec![
        Arc::new(StringArray::from(keys)) as ArrayRef,
        Arc::new(Date32Array::from(days)) as ArrayRef,
        Arc::new(Float64Array::from(values)) as ArrayRef,
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns)
        .map_err(|e| AppError::new(4, format!("Failed to build canonical batch: {e}")))?;

    let file = File::create(path).map_err(|e| {
        AppError::new(4, format!("Failed to create canonical Parquet '{}': {e}", path.display()))
    })?;
    let mut writer = ArrowWriter::try_new(file, schema, None)
        .map_err(|e| AppError::new(4, format!("Failed to start Parquet writer: {e}")))?;
    writer
        .write(&batch)
        .map_err(|e| AppError::new(4, format!("Failed to write canonical Parquet rows: {e}")))?;
    writer
        .close()
        .map_err(|e| AppError::new(4, format!("Failed to finish canonical Parquet: {e}")))?;
    Ok(())
}

/// Read a canonical Parquet file back, checking its column names and types.
pub fn read_canonical_parquet(path: &Path) -> Result<Vec<CanonicalRow>, AppError> {
    let bad = |msg: String| AppError::new(2, msg);
    let file = File::open(path).map_err(|e| {
        bad(format!("Failed to open canonical Parquet '{}': {e}", path.display()))
    })?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .and_then(|builder| builder.build())
        .map_err(|e| bad(format!("Failed to read canonical Parquet: {e}")))?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| bad(format!("Bad canonical Parquet batch: {e}")))?;
        let names: Vec<&str> = batch
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect();
        if names != CANONICAL_HEADERS {
            return Err(bad(format!("Expected columns cd_key,ds,y, found {}", names.join(","))));
        }

        let keys = typed_column::<StringArray>(&batch, 0)?;
        let days = typed_column::<Date32Array>(&batch, 1)?;
        let values = typed_column::<Float64Array>(&batch, 2)?;
        for i in 0..batch.num_rows() {
            let ds = NaiveDate::from_num_days_from_ce_opt(days.value(i) + EPOCH_DAYS_FROM_CE)
                .ok_or_else(|| bad(format!("Date out of range in canonical row {i}")))?;
            rows.push(CanonicalRow::new(keys.value(i), ds, values.value(i)));
        }
    }
    Ok(rows)
}

fn typed_column<'a, T: Array + 'static>(batch: &'a RecordBatch, idx: usize) -> Result<&'a T, AppError> {
    let column = batch.column(idx);
    if column.null_count() > 0 {
        return Err(AppError::new(2, format!("Column `{}` has nulls", CANONICAL_HEADERS[idx])));
    }
    column.as_any().downcast_ref::<T>().ok_or_else(|| {
        AppError::new(
            2,
            format!("Column `{}` has type {}", CANONICAL_HEADERS[idx], column.data_type()),
        )
    })
}

/// The JSON report written alongside the canonical series.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub rows: usize,
    pub keys: usize,
    pub shape: &'a ShapeClassification,
    pub mapping: &'a MappingSpec,
    pub frequency: &'a FrequencyLabel,
    pub warnings: &'a [Warning],
    pub diagnostics: &'a Diagnostics,
}

impl<'a> RunReport<'a> {
    pub fn new(output: &'a PipelineOutput) -> Self {
        Self {
            rows: output.series.len(),
            keys: output.series.keys().len(),
            shape: &output.shape,
            mapping: &output.mapping,
            frequency: &output.frequency,
            warnings: &output.warnings,
            diagnostics: &output.diagnostics,
        }
    }
}

pub fn write_diagnostics_json(path: &Path, output: &PipelineOutput) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(4, format!("Failed to create diagnostics JSON '{}': {e}", path.display()))
    })?;
    serde_json::to_writer_pretty(file, &RunReport::new(output))
        .map_err(|e| AppError::new(4, format!("Failed to write diagnostics JSON: {e}")))?;
    Ok(())
}
