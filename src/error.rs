//! Error types.
//!
//! Library stages report structured `thiserror` enums. The binary maps them to
//! `AppError`, which carries the process exit code.

use thiserror::Error;

use crate::domain::{Shape, ShapeEvidence};

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// `RawTable` construction failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("table has no columns")]
    NoColumns,

    #[error("column `{column}` has {found} rows, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("duplicate column name `{0}`")]
    DuplicateColumn(String),
}

/// A `PipelineConfig` field outside its allowed range.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("`{field}` must be within [0, 1], got {value}")]
    NotAFraction { field: &'static str, value: f64 },

    #[error("`{field}` must be at least {min}, got {value}")]
    BelowMinimum {
        field: &'static str,
        min: usize,
        value: usize,
    },
}

/// Which role a column was requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Key,
    Date,
    Value,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::Key => "key",
            Role::Date => "date",
            Role::Value => "value",
        };
        f.write_str(name)
    }
}

/// A single reason why column roles could not be resolved.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingProblem {
    #[error("no key column declared or detected")]
    NoKeyColumn,

    #[error("no date source declared or detected")]
    NoDateSource,

    #[error("no numeric value column declared or detected")]
    NoValueSource,

    #[error("{role} column `{column}` does not exist")]
    UnknownColumn { role: Role, column: String },

    #[error("column `{column}` is used both as {first} and {second}")]
    ConflictingRoles {
        column: String,
        first: Role,
        second: Role,
    },

    #[error("wide layout needs at least one date header column")]
    EmptyHeaderSet,

    #[error("layout is {shape:?} with confidence {confidence:.2}; declare a date source")]
    AmbiguousShape { shape: Shape, confidence: f64 },
}

/// Column roles could not be resolved. Lists every problem found, not just the first.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("column mapping failed: {}", join_problems(.problems))]
pub struct MappingError {
    pub problems: Vec<MappingProblem>,
}

impl MappingError {
    pub fn new(problems: Vec<MappingProblem>) -> Self {
        Self { problems }
    }

    pub fn has(&self, problem: &MappingProblem) -> bool {
        self.problems.contains(problem)
    }
}

fn join_problems(problems: &[MappingProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Whole-table failures that halt a pipeline run.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error(
        "table layout is ambiguous ({shape:?}, confidence {confidence:.2} below floor {floor:.2}); a column mapping is required"
    )]
    ShapeAmbiguous {
        shape: Shape,
        confidence: f64,
        floor: f64,
        evidence: ShapeEvidence,
    },

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("run cancelled")]
    Cancelled,
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::new(2, format!("Invalid configuration: {err}"))
    }
}

impl From<TableError> for AppError {
    fn from(err: TableError) -> Self {
        AppError::new(2, format!("Invalid table: {err}"))
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        let code = match &err {
            PipelineError::ShapeAmbiguous { .. } => 3,
            PipelineError::Mapping(_) | PipelineError::Config(_) => 2,
            PipelineError::Cancelled => 5,
        };
        AppError::new(code, err.to_string())
    }
}
