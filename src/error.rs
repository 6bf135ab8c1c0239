//! Error types for Synheart Sleep

use thiserror::Error;

/// Errors that can occur while loading a hypnogram or computing its parameters
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse hypnogram: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid CSV: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Unknown sleep stage '{label}' at epoch {epoch}")]
    UnknownStage { epoch: usize, label: String },

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Invalid epoch length: {0} s (must be finite and positive)")]
    InvalidEpochLength(f64),

    #[error("Hypnogram contains no sleep epochs (N1, N2, N3 or R)")]
    NoSleepEpochs,
}
