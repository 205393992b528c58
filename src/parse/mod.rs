//! Cell-level parsers shared by profiling and canonicalization.
//!
//! Every parser returns a `CellParse<T>`; a failed cell is an ordinary value
//! the caller turns into a diagnostic, never an early return.

pub mod dates;
pub mod numeric;

pub use dates::*;
pub use numeric::*;

/// Why a single cell did not yield a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellFailure {
    /// Null or blank.
    Missing,
    /// Present but not in any accepted form.
    Invalid,
    /// Parsed to NaN or an infinity.
    NonFinite,
}

pub type CellParse<T> = Result<T, CellFailure>;
