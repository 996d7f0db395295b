//! Error types for the touch analyzer

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or analyzing touch logs
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Missing required columns in {path}: {columns:?}")]
    MissingColumns { path: PathBuf, columns: Vec<String> },

    #[error("No valid rows in {0}")]
    EmptyFile(PathBuf),

    #[error("No valid data in the selected files")]
    NoValidData,

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invariant violated: {0}")]
    Invariant(String),
}

impl AnalyzerError {
    /// True for the data-error family (the input could not be used)
    pub fn is_data_error(&self) -> bool {
        !matches!(self, AnalyzerError::Invariant(_))
    }

    /// Short machine-readable code used by the CLI and FFI layers
    pub fn code(&self) -> &'static str {
        match self {
            AnalyzerError::Io { .. } => "IO_ERROR",
            AnalyzerError::Csv { .. } => "CSV_ERROR",
            AnalyzerError::MissingColumns { .. } => "MISSING_COLUMNS",
            AnalyzerError::EmptyFile(_) => "EMPTY_FILE",
            AnalyzerError::NoValidData => "NO_VALID_DATA",
            AnalyzerError::Json(_) => "JSON_ERROR",
            AnalyzerError::Config(_) => "CONFIG_ERROR",
            AnalyzerError::Invariant(_) => "INVARIANT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = AnalyzerError::EmptyFile(PathBuf::from("a.csv"));
        assert_eq!(err.code(), "EMPTY_FILE");
        assert!(err.is_data_error());
        assert!(err.to_string().contains("a.csv"));

        let err = AnalyzerError::Invariant("unit 3".to_string());
        assert!(!err.is_data_error());
    }

    #[test]
    fn test_missing_columns_message() {
        let err = AnalyzerError::MissingColumns {
            path: PathBuf::from("task.csv"),
            columns: vec!["TouchX".to_string()],
        };
        assert!(err.to_string().contains("TouchX"));
    }
}
