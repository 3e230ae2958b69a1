//! Naive (last value) forecaster

use crate::data::TimeSeriesData;
use crate::error::Result;
use crate::models::{error_std, not_fitted, training_inputs, FittedState, ForecastResult, Forecaster};

/// Repeats the last observed value for every future period
#[derive(Debug, Clone)]
pub struct Naive {
    confidence_level: f64,
    horizon: Option<usize>,
    state: Option<FittedState>,
}

impl Naive {
    /// Create a new naive forecaster with 95% intervals
    pub fn new() -> Self {
        Self {
            confidence_level: 0.95,
            horizon: None,
            state: None,
        }
    }

    /// Configure the default output length
    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = Some(horizon);
        self
    }
}

impl Default for Naive {
    fn default() -> Self {
        Self::new()
    }
}

impl Forecaster for Naive {
    fn name(&self) -> &str {
        "Naive"
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

        let errors: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();

        self.state = Some(FittedState {
            level: values[values.len() - 1],
            residual_std: error_std(&errors),
            last_timestamp,
            frequency,
        });
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<ForecastResult> {
        let state = self.state.as_ref().ok_or_else(|| not_fitted(self.name()))?;
        // Random walk: variance grows linearly with the horizon
        state.forecast(horizon, self.confidence_level, |h| (h as f64).sqrt())
    }
}
