use std::{io, path::PathBuf};

use thiserror::Error;

/// Failure to turn one dump file into an [`OutputRecord`](crate::OutputRecord).
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}:{line}: metric {name} has non-numeric value {value:?}", path.display())]
    InvalidMetric {
        path: PathBuf,
        line: usize,
        name: String,
        value: String,
    },
    #[error("{}:{line}: configuration field {field} has invalid value {value:?}", path.display())]
    InvalidConfig {
        path: PathBuf,
        line: usize,
        field: &'static str,
        value: String,
    },
    /// One of queue depth, thread count or IAT scale is still zero after the
    /// whole file was read.
    #[error("{}: malformed input, essential configuration missing: {}", path.display(), missing.join(", "))]
    MalformedInput {
        path: PathBuf,
        missing: Vec<&'static str>,
    },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to list directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to walk {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read analysis config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid analysis config {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("min_iterations must be at least 1")]
    ZeroIterations,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}
