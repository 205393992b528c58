//! Input/output helpers around the pipeline.
//!
//! - CSV file to `RawTable` (`load`)
//! - canonical CSV and diagnostics JSON (`export`)

pub mod export;
pub mod load;

pub use export::*;
pub use load::*;
