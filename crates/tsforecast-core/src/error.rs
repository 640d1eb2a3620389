//! Error types for the forecasting engine.

use thiserror::Error;

/// Result type for forecasting operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Error taxonomy for the forecasting engine (see spec §7).
#[derive(Error, Debug, Clone)]
pub enum ForecastError {
    /// Precondition violated on a `TimeSeries` or a model configuration.
    #[error("invalid input for '{field}': {message}")]
    InvalidInput { field: String, message: String },

    /// `predict`/an accessor was invoked before `fit`.
    #[error("model '{model}' has not been fitted")]
    NotFitted { model: String },

    /// A model-specific minimum sample size was not met.
    #[error("insufficient data for '{context}': need at least {needed} observations, got {got}")]
    InsufficientData {
        context: String,
        needed: usize,
        got: usize,
    },

    /// Singular design matrix, non-finite residuals, optimizer divergence,
    /// or an infeasible stationarity projection.
    #[error("numerical failure in '{context}' after {last_iteration} iterations: {message}")]
    NumericalFailure {
        context: String,
        message: String,
        last_iteration: usize,
    },

    /// Cooperative cancellation observed during an auto-tuner loop.
    #[error("cancelled during '{context}' after evaluating {models_evaluated} candidates")]
    Cancelled {
        context: String,
        models_evaluated: usize,
    },
}

impl ForecastError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ForecastError::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_fitted(model: impl Into<String>) -> Self {
        ForecastError::NotFitted {
            model: model.into(),
        }
    }

    pub fn insufficient(context: impl Into<String>, needed: usize, got: usize) -> Self {
        ForecastError::InsufficientData {
            context: context.into(),
            needed,
            got,
        }
    }

    pub fn numerical(
        context: impl Into<String>,
        message: impl Into<String>,
        last_iteration: usize,
    ) -> Self {
        ForecastError::NumericalFailure {
            context: context.into(),
            message: message.into(),
            last_iteration,
        }
    }
}
