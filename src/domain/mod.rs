//! Domain types used throughout the pipeline.
//!
//! - the input table (`RawTable`, `Column`, `CellValue`)
//! - stage outputs (`ShapeClassification`, `FrequencyLabel`, `MappingSpec`)
//! - the canonical output (`CanonicalSeries`) and its `Diagnostics`
//! - run configuration (`PipelineConfig`)

pub mod config;
pub mod diagnostics;
pub mod table;
pub mod types;

pub use config::*;
pub use diagnostics::*;
pub use table::*;
pub use types::*;
