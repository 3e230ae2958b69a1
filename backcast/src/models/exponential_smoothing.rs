//! Exponential smoothing models for time series forecasting

use crate::data::TimeSeriesData;
use crate::error::{BacktestError, Result};
use crate::models::{error_std, not_fitted, training_inputs, FittedState, ForecastResult, Forecaster};

/// Simple exponential smoothing model
#[derive(Debug, Clone)]
pub struct ExponentialSmoothing {
    /// Name of the model
    name: String,
    /// Smoothing parameter
    alpha: f64,
    confidence_level: f64,
    horizon: Option<usize>,
    state: Option<FittedState>,
}

impl ExponentialSmoothing {
    /// Create a new exponential smoothing model
    pub fn new(alpha: f64) -> Result<Self> {
        if alpha <= 0.0 || alpha >= 1.0 {
            return Err(BacktestError::InvalidParameter(
                "Alpha must be between 0 and 1".to_string(),
            ));
        }

        Ok(Self {
            name: format!("Exponential Smoothing (alpha={})", alpha),
            alpha,
            confidence_level: 0.95,
            horizon: None,
            state: None,
        })
    }

    /// Configure the default output length
    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = Some(horizon);
        self
    }

    /// Set the confidence level of the prediction intervals
    pub fn with_confidence_level(mut self, confidence_level: f64) -> Result<Self> {
        if confidence_level <= 0.0 || confidence_level >= 1.0 {
            return Err(BacktestError::InvalidParameter(
                "Confidence level must be between 0 and 1".to_string(),
            ));
        }
        self.confidence_level = confidence_level;
        Ok(self)
    }

    /// Smoothing parameter
    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl Forecaster for ExponentialSmoothing {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_length(&self) -> Option<usize> {
        self.horizon
    }

    fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    fn clone_unfitted(&self) -> Self {
        Self {
            state: None,
            ..self.clone()
        }
    }

    fn fit(&mut self, data: &TimeSeriesData) -> Result<()> {
        let (values, last_timestamp, frequency) = training_inputs(data, 2)?;

        // Initialize level with first observation
        let mut level = values[0];
        let mut errors = Vec::with_capacity(values.len() - 1);

        for &value in &values[1..] {
            errors.push(value - level);
            level = self.alpha * value + (1.0 - self.alpha) * level;
        }

        self.state = Some(FittedState {
            level,
            residual_std: error_std(&errors),
            last_timestamp,
            frequency,
        });
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<ForecastResult> {
        let state = self.state.as_ref().ok_or_else(|| not_fitted(self.name()))?;
        let alpha = self.alpha;
        state.forecast(horizon, self.confidence_level, |h| {
            (1.0 + (h as f64 - 1.0) * alpha * alpha).sqrt()
        })
    }
}
