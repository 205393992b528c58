//! `ts-canon` library crate.
//!
//! Profiles a tabular time series (wide or long), resolves which columns are
//! keys, dates and values, and converts it to the canonical `(cd_key, ds, y)`
//! series with a diagnostics report.
//!
//! The binary (`canon`) is a thin wrapper around this library so that:
//!
//! - the pipeline is testable without spawning processes
//! - other front-ends can reuse it with their own loaders

pub mod app;
pub mod canon;
pub mod cli;
pub mod domain;
pub mod error;
pub mod io;
pub mod mapping;
pub mod parse;
pub mod profile;
pub mod report;

pub use app::pipeline::{
    PipelineOutput, ProfileOutput, profile_table, run_pipeline, run_pipeline_cancellable,
};
pub use canon::CancelToken;
pub use error::{MappingError, MappingProblem, PipelineError};
