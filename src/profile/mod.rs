//! Table profiling: column classification, layout detection, cadence inference.

pub mod classify;
pub mod frequency;
pub mod shape;

pub use classify::{ColumnClass, ColumnProfile, TableProfile};
pub use frequency::infer as infer_frequency;
pub use shape::detect as detect_shape;
