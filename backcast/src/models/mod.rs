//! Forecasting models driven by the backtester

use crate::data::TimeSeriesData;
use crate::error::{BacktestError, Result};
use crate::utils::{future_timestamps, Frequency};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::fmt::Debug;

/// Forecast result containing predicted values aligned to future timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    /// Timestamps of the forecasted periods
    timestamps: Vec<DateTime<Utc>>,
    /// Forecasted values
    values: Vec<f64>,
    /// Confidence intervals (optional)
    intervals: Option<Vec<(f64, f64)>>,
}

impl ForecastResult {
    /// Create a new forecast result
    pub fn new(timestamps: Vec<DateTime<Utc>>, values: Vec<f64>) -> Result<Self> {
        if values.len() != timestamps.len() {
            return Err(BacktestError::Validation(format!(
                "Values length ({}) doesn't match timestamps length ({})",
                values.len(),
                timestamps.len()
            )));
        }

        Ok(Self {
            timestamps,
            values,
            intervals: None,
        })
    }

    /// Attach confidence intervals
    pub fn with_intervals(mut self, intervals: Vec<(f64, f64)>) -> Result<Self> {
        if self.values.len() != intervals.len() {
            return Err(BacktestError::Validation(format!(
                "Values length ({}) doesn't match intervals length ({})",
                self.values.len(),
                intervals.len()
            )));
        }

        self.intervals = Some(intervals);
        Ok(self)
    }

    /// Get the forecasted values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Get the forecast timestamps
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Get the confidence intervals, if available
    pub fn intervals(&self) -> Option<&[(f64, f64)]> {
        self.intervals.as_deref()
    }

    /// Get the number of periods forecasted
    pub fn horizon(&self) -> usize {
        self.values.len()
    }

    /// Convert into a series with a single target column
    pub fn to_series(&self, target_column: &str) -> Result<TimeSeriesData> {
        TimeSeriesData::with_columns(
            self.timestamps.clone(),
            vec![(target_column.to_string(), self.values.clone())],
            target_column,
        )
    }

    /// Serialize to a JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Forecast model that can be fitted on a training slice and asked for a horizon.
///
/// The backtester never fits the instance it is given: each fold works on
/// [`Forecaster::clone_unfitted`], so implementations must not share mutable
/// state between clones.
pub trait Forecaster: Debug + Clone + Send + Sync {
    /// Name of the model
    fn name(&self) -> &str;

    /// Horizon the model was configured with, used when no test window is given
    fn output_length(&self) -> Option<usize> {
        None
    }

    /// Whether `fit` has succeeded on this instance
    fn is_fitted(&self) -> bool;

    /// An independent copy without fitted state
    fn clone_unfitted(&self) -> Self;

    /// Fit the model on a training series
    fn fit(&mut self, data: &TimeSeriesData) -> Result<()>;

    /// Forecast `horizon` periods past the end of the training series
    fn predict(&self, horizon: usize) -> Result<ForecastResult>;

    /// Fit on `data` and forecast `horizon` periods
    fn fit_predict(&mut self, data: &TimeSeriesData, horizon: usize) -> Result<ForecastResult> {
        self.fit(data)?;
        self.predict(horizon)
    }
}

/// State shared by the fitted reference models
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FittedState {
    /// Point forecast for every future period
    pub level: f64,
    /// Standard deviation of one-step-ahead in-sample errors
    pub residual_std: f64,
    /// Last training timestamp
    pub last_timestamp: DateTime<Utc>,
    /// Training sampling frequency
    pub frequency: Frequency,
}

impl FittedState {
    /// Flat forecast with normal intervals whose width follows `spread(h)`
    pub(crate) fn forecast(
        &self,
        horizon: usize,
        confidence_level: f64,
        spread: impl Fn(usize) -> f64,
    ) -> Result<ForecastResult> {
        let timestamps = future_timestamps(self.last_timestamp, horizon, self.frequency)?;
        let values = vec![self.level; horizon];
        let z = z_score(confidence_level)?;

        let intervals = (1..=horizon)
            .map(|h| {
                let margin = z * self.residual_std * spread(h);
                (self.level - margin, self.level + margin)
            })
            .collect();

        ForecastResult::new(timestamps, values)?.with_intervals(intervals)
    }
}

/// Extract target values, last timestamp and frequency from a training slice
pub(crate) fn training_inputs(
    data: &TimeSeriesData,
    min_len: usize,
) -> Result<(Vec<f64>, DateTime<Utc>, Frequency)> {
    if data.len() < min_len.max(2) {
        return Err(BacktestError::Model(format!(
            "Insufficient data: need at least {} observations, got {}",
            min_len.max(2),
            data.len()
        )));
    }

    let values = data.target_values()?;
    let last_timestamp = data.last_timestamp()?;
    let frequency = data.frequency()?.ok_or_else(|| {
        BacktestError::Model("Cannot infer sampling frequency of training data".to_string())
    })?;

    Ok((values, last_timestamp, frequency))
}

/// Population standard deviation of one-step errors
pub(crate) fn error_std(errors: &[f64]) -> f64 {
    if errors.is_empty() {
        return 0.0;
    }
    let n = errors.len() as f64;
    let mean = errors.iter().sum::<f64>() / n;
    (errors.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Two-sided standard normal quantile for a confidence level
pub(crate) fn z_score(confidence_level: f64) -> Result<f64> {
    if confidence_level <= 0.0 || confidence_level >= 1.0 {
        return Err(BacktestError::InvalidParameter(
            "Confidence level must be between 0 and 1".to_string(),
        ));
    }

    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| BacktestError::Model(format!("Normal distribution: {}", e)))?;
    Ok(normal.inverse_cdf((1.0 + confidence_level) / 2.0))
}

pub(crate) fn not_fitted(name: &str) -> BacktestError {
    BacktestError::Model(format!("{} must be fitted before predicting", name))
}

pub mod exponential_smoothing;
pub mod moving_average;
pub mod naive;

pub use exponential_smoothing::ExponentialSmoothing;
pub use moving_average::SimpleMovingAverage;
pub use naive::Naive;
