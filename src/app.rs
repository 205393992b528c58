//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the real main:
//! - parses CLI arguments and builds the pipeline config
//! - loads the CSV into a `RawTable`
//! - runs profiling or the full conversion
//! - prints reports and writes exports

use std::fs;
use std::path::Path;

use clap::Parser;
use tracing::{info, warn};

use crate::cli::{Cli, Command, CommonArgs, ConvertArgs, ProfileArgs};
use crate::domain::{DateSource, MappingOverrides, PipelineConfig};
use crate::error::AppError;
use crate::io::{
    LoadedTable, default_output_path, load_csv_table, write_canonical, write_diagnostics_json,
};

pub mod pipeline;

/// Entry point for the `canon` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Profile(args) => handle_profile(args),
        Command::Convert(args) => handle_convert(args),
    }
}

fn handle_profile(args: ProfileArgs) -> Result<(), AppError> {
    let config = load_config(&args.common)?;
    let loaded = load(&args.common.input)?;
    let profile = pipeline::profile_table(&loaded.table, &config)?;

    if args.json {
        let json = serde_json::to_string_pretty(&profile)
            .map_err(|e| AppError::new(4, format!("Failed to encode profile JSON: {e}")))?;
        println!("{json}");
    } else {
        println!("{}", crate::report::format_profile(&profile));
    }
    Ok(())
}

fn handle_convert(args: ConvertArgs) -> Result<(), AppError> {
    let config = convert_config(&args)?;
    let overrides = overrides_from_args(&args);
    let loaded = load(&args.common.input)?;

    let output = pipeline::run_pipeline(
        &loaded.table,
        (!overrides.is_empty()).then_some(&overrides),
        &config,
    )?;

    println!("{}", crate::report::format_run_summary(&output));

    if output.series.is_empty() {
        return Err(AppError::new(3, "No usable rows after canonicalization."));
    }
    if args.dry_run {
        return Ok(());
    }

    let out_path = match &args.out {
        Some(path) => path.clone(),
        None => default_output_path(&args.common.input, args.out_dir.as_deref(), args.format),
    };
    write_canonical(&out_path, &output.series, args.format)?;
    println!("Wrote {} rows to {}", output.series.len(), out_path.display());

    if let Some(path) = &args.diagnostics {
        write_diagnostics_json(path, &output)?;
        println!("Wrote diagnostics to {}", path.display());
    }
    Ok(())
}

fn load(path: &Path) -> Result<LoadedTable, AppError> {
    let loaded = load_csv_table(path)?;
    for e in loaded.row_errors.iter().take(5) {
        warn!(line = e.line, "{}", e.message);
    }
    info!(rows = loaded.rows_read, skipped = loaded.row_errors.len(), "input read");
    Ok(loaded)
}

/// Config file (if any) with the shared CLI overrides applied.
fn load_config(args: &CommonArgs) -> Result<PipelineConfig, AppError> {
    let mut config = match &args.config {
        Some(path) => read_config_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(floor) = args.confidence_floor {
        config.confidence_floor = floor;
    }
    config.validate()?;
    Ok(config)
}

fn convert_config(args: &ConvertArgs) -> Result<PipelineConfig, AppError> {
    let mut config = load_config(&args.common)?;
    if let Some(policy) = args.duplicates {
        config.duplicate_policy = policy;
    }
    if let Some(sep) = &args.separator {
        config.key_separator = sep.clone();
    }
    if let Some(token) = &args.null_token {
        config.null_token = token.clone();
    }
    Ok(config)
}

pub fn read_config_file(path: &Path) -> Result<PipelineConfig, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::new(2, format!("Failed to read config '{}': {e}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|e| AppError::new(2, format!("Invalid config '{}': {e}", path.display())))
}

/// Role flags as a partial mapping; unset flags stay `None`.
pub fn overrides_from_args(args: &ConvertArgs) -> MappingOverrides {
    let date_source = match (&args.date, args.headers.is_empty()) {
        (Some(date), _) => Some(DateSource::Column(date.clone())),
        (None, false) => Some(DateSource::Headers(args.headers.clone())),
        (None, true) => None,
    };
    MappingOverrides {
        key_columns: (!args.keys.is_empty()).then(|| args.keys.clone()),
        date_source,
        value_column: args.value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DuplicatePolicy;

    fn parse(argv: &[&str]) -> ConvertArgs {
        match Cli::parse_from(argv).command {
            Command::Convert(args) => args,
            Command::Profile(_) => panic!("expected convert"),
        }
    }

    #[test]
    fn flags_become_overrides() {
        let args = parse(&["canon", "convert", "x.csv", "-k", "id", "-d", "when", "-v", "qty"]);
        let overrides = overrides_from_args(&args);
        assert_eq!(overrides.key_columns, Some(vec!["id".to_string()]));
        assert_eq!(overrides.date_source, Some(DateSource::Column("when".to_string())));
        assert_eq!(overrides.value_column.as_deref(), Some("qty"));
    }

    #[test]
    fn no_flags_no_overrides() {
        let args = parse(&["canon", "convert", "x.csv"]);
        assert!(overrides_from_args(&args).is_empty());
    }

    #[test]
    fn config_file_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("canon.json");
        fs::write(&path, r#"{"key_separator": "::", "duplicate_policy": "mean"}"#).unwrap();
        let path_str = path.to_string_lossy().into_owned();

        let args = parse(&[
            "canon", "convert", "x.csv", "--config", &path_str, "--duplicates", "last",
        ]);
        let config = convert_config(&args).unwrap();
        assert_eq!(config.key_separator, "::");
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Last);
        assert_eq!(config.confidence_floor, 0.6);
    }

    #[test]
    fn format_picks_the_default_suffix() {
        let args = parse(&["canon", "convert", "/data/x.csv", "--format", "parquet"]);
        let path = default_output_path(&args.common.input, args.out_dir.as_deref(), args.format);
        assert_eq!(path, Path::new("/data/x__canonical_long.parquet"));
    }

    #[test]
    fn bad_floor_is_a_usage_error() {
        let args = parse(&["canon", "convert", "x.csv", "--confidence-floor", "2"]);
        assert_eq!(convert_config(&args).unwrap_err().exit_code(), 2);
    }
}
