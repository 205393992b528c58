//! Terminal reports for `canon profile` and `canon convert`.

pub mod format;

pub use format::*;
