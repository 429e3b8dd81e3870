use std::path::PathBuf;

use polars::error::PolarsError;

/// Errors raised by the RSM core. None of them are transient: they describe
/// bad data or bad configuration, so callers should abort the iteration.
#[derive(thiserror::Error, Debug)]
pub enum RsmError {
    #[error("I/O error on '{path}': {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("Table operation failed: {0}")]
    Polars(#[from] PolarsError),
    #[error("Required input file does not exist: {0}")]
    MissingFile(PathBuf),
    #[error("Missing required column '{wanted}' (tried: {})", tried.join(", "))]
    MissingColumn { wanted: String, tried: Vec<String> },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Not implemented: {0}")]
    NotImplemented(String),
    #[error("Zone {zone} has no entry in the crosswalk ({context})")]
    UnmappedZone { zone: i64, context: String },
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Geometry error: {0}")]
    Geometry(String),
    #[error("Failed to parse config '{path}': {message}")]
    Toml { path: PathBuf, message: String },
}

impl RsmError {
    /// Shorthand for a missing column that has a single accepted name.
    pub fn missing_column(name: &str) -> Self {
        RsmError::MissingColumn { wanted: name.to_string(), tried: vec![name.to_string()] }
    }
}

pub type Result<T> = std::result::Result<T, RsmError>;
