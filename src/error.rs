//! Error types for the debench library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing or unreadable parameter file for {source_name}: {path} ({reason})")]
    MissingParameterFile {
        source_name: String,
        path: PathBuf,
        reason: String,
    },

    #[error("Invalid design at {key_path}: {reason}")]
    InvalidDesign { key_path: String, reason: String },

    #[error("Duplicate leaf key: {0}")]
    DuplicateLeafKey(String),

    #[error("External runner failed for {leaf} ({method}): {reason}")]
    ExternalRunnerFailure {
        leaf: String,
        method: String,
        reason: String,
    },

    #[error("Gene '{0}' has no entry in the method output")]
    UnmatchedGeneId(String),

    #[error("Invalid count value '{value}' at row {row}, column {col}")]
    InvalidCount {
        value: String,
        row: usize,
        col: usize,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Missing column '{0}'")]
    MissingColumn(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BenchError {
    /// Whether the error aborts the whole run rather than a single leaf.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingParameterFile { .. } | Self::InvalidDesign { .. } | Self::DuplicateLeafKey(_)
        )
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, BenchError>;
