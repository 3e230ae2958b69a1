//! Moving average forecaster

use crate::data::TimeSeriesData;
use crate::error::{BacktestError, Result};
use crate::models::{error_std, not_fitted, training_inputs, FittedState, ForecastResult, Forecaster};

/// Simple Moving Average model
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    /// Name of the model
    name: String,
    /// Window size
    window: usize,
    confidence_level: f64,
    horizon: Option<usize>,
    state: Option<FittedState>,
}

impl SimpleMovingAverage {
    /// Create a new Simple Moving Average model
    pub fn new(window: usize) -> Result<Self> {
        if window == 0 {
            return Err(BacktestError::InvalidParameter(
                "Window size must be positive".to_string(),
            ));
        }

        Ok(Self {
            name: format!("Simple Moving Average (window={})", window),
            window,
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

    /// Window size
    pub fn window(&self) -> usize {
        self.window
    }
}

impl Forecaster for SimpleMovingAverage {
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
        let (values, last_timestamp, frequency) = training_inputs(data, self.window)?;

        let level = values[values.len() - self.window..].iter().sum::<f64>() / self.window as f64;

        // One-step errors of the trailing average over the training slice
        let errors: Vec<f64> = (self.window..values.len())
            .map(|i| {
                let ma = values[i - self.window..i].iter().sum::<f64>() / self.window as f64;
                values[i] - ma
            })
            .collect();

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
        state.forecast(horizon, self.confidence_level, |_| 1.0)
    }
}
