//! Error types for Glucose Flux

use thiserror::Error;

/// Errors that can occur during computation
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Ambiguous units: series mean {mean:.2} is within {margin} of the {boundary} boundary")]
    AmbiguousUnits {
        mean: f64,
        boundary: f64,
        margin: f64,
    },

    #[error("Series is not in ascending time order at index {0}")]
    UnorderedSeries(usize),

    #[error("Invalid glucose reading: {0}")]
    InvalidReading(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Score store error: {0}")]
    StoreError(String),
}
