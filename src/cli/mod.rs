//! Command-line parsing for the `canon` binary.
//!
//! Argument parsing and dispatch stay separate from the pipeline code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::DuplicatePolicy;
use crate::io::OutputFormat;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "canon",
    version,
    about = "Profile tabular time series and convert them to cd_key/ds/y"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print column classes, date candidates, layout and cadence of a CSV.
    Profile(ProfileArgs),
    /// Convert a CSV to the canonical long format.
    Convert(ConvertArgs),
}

/// Options shared by every subcommand.
#[derive(Debug, Args, Clone)]
pub struct CommonArgs {
    /// Input CSV with a header row.
    #[arg(value_name = "CSV")]
    pub input: PathBuf,

    /// JSON pipeline configuration; flags below override its fields.
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,

    /// Minimum shape confidence for automatic layout detection.
    #[arg(long)]
    pub confidence_floor: Option<f64>,
}

#[derive(Debug, Args, Clone)]
pub struct ProfileArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Print the profile as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Key column (repeatable; order is kept in `cd_key`).
    #[arg(short = 'k', long = "key", value_name = "COLUMN")]
    pub keys: Vec<String>,

    /// Long layout: the date column.
    #[arg(short = 'd', long, value_name = "COLUMN", conflicts_with = "headers")]
    pub date: Option<String>,

    /// Wide layout: the date header columns (comma separated or repeated).
    #[arg(long, value_name = "COLUMN", value_delimiter = ',', num_args = 1..)]
    pub headers: Vec<String>,

    /// Long layout: the value column.
    #[arg(short = 'v', long, value_name = "COLUMN")]
    pub value: Option<String>,

    /// How to handle rows sharing a (cd_key, ds) pair.
    #[arg(long, value_enum)]
    pub duplicates: Option<DuplicatePolicy>,

    /// Separator between key parts.
    #[arg(long)]
    pub separator: Option<String>,

    /// Stand-in for blank key parts.
    #[arg(long)]
    pub null_token: Option<String>,

    /// Canonical output file format.
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,

    /// Canonical output path (default: `<stem>__canonical_long.<format>`).
    #[arg(short = 'o', long, value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Directory for the default output name.
    #[arg(long, value_name = "DIR", conflicts_with = "out")]
    pub out_dir: Option<PathBuf>,

    /// Also write a diagnostics JSON report here.
    #[arg(long, value_name = "JSON")]
    pub diagnostics: Option<PathBuf>,

    /// Print the summary without writing files.
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn convert_flags_parse() {
        let cli = Cli::parse_from([
            "canon", "convert", "in.csv", "-k", "store", "-k", "sku", "--headers", "Jan-2024,Feb-2024",
            "--duplicates", "sum",
        ]);
        let Command::Convert(args) = cli.command else {
            panic!("expected convert");
        };
        assert_eq!(args.keys, vec!["store", "sku"]);
        assert_eq!(args.headers, vec!["Jan-2024", "Feb-2024"]);
        assert_eq!(args.duplicates, Some(DuplicatePolicy::Sum));
        assert_eq!(args.format, OutputFormat::Csv);
        assert_eq!(args.common.input, PathBuf::from("in.csv"));
    }
}
