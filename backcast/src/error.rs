//! Error types for the backcast crate

use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors raised while planning, running or aggregating a backtest
#[derive(Debug, Error)]
pub enum BacktestError {
    /// Invalid window sizes, empty input or nothing to aggregate
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error related to data loading, validation or conversion
    #[error("Data error: {0}")]
    Data(String),

    /// Error related to shape or consistency checks
    #[error("Validation error: {0}")]
    Validation(String),

    /// Error from invalid model or transformer parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A forecaster failed to fit or predict
    #[error("Model error: {0}")]
    Model(String),

    /// A transformer failed to fit or transform
    #[error("Transform error: {0}")]
    Transform(String),

    /// A scoring function failed
    #[error("Metric '{name}' failed: {message}")]
    Metric {
        /// Metric name
        name: String,
        /// Failure description
        message: String,
    },

    /// A plotter failed to render or save its artifact
    #[error("Plot error: {0}")]
    Plot(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    Polars(String),

    /// Error from JSON or CSV (de)serialization
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BacktestError {
    /// Shorthand for a metric failure
    pub fn metric(name: impl Into<String>, message: impl Into<String>) -> Self {
        BacktestError::Metric {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, BacktestError>;

impl From<PolarsError> for BacktestError {
    fn from(err: PolarsError) -> Self {
        BacktestError::Polars(err.to_string())
    }
}

impl From<serde_json::Error> for BacktestError {
    fn from(err: serde_json::Error) -> Self {
        BacktestError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for BacktestError {
    fn from(err: csv::Error) -> Self {
        BacktestError::Serialization(err.to_string())
    }
}
