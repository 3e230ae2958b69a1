//! Preprocessing transformers applied to each fold's train and test slices

use crate::data::TimeSeriesData;
use crate::error::{BacktestError, Result};
use std::fmt::Debug;

/// Stateful transformation fitted on training data and replayed on test data.
///
/// `fit_transform` leaves `self` untouched and returns the fitted copy, so a
/// template transformer can be shared across folds.
pub trait Transformer: Debug + Clone + Send + Sync {
    /// Name of the transformer
    fn name(&self) -> &str;

    /// Whether `fit` has succeeded on this instance
    fn is_fitted(&self) -> bool;

    /// An independent copy without fitted state
    fn clone_unfitted(&self) -> Self;

    /// Learn the transformation parameters from `data`
    fn fit(&mut self, data: &TimeSeriesData) -> Result<()>;

    /// Apply the fitted transformation
    fn transform(&self, data: &TimeSeriesData) -> Result<TimeSeriesData>;

    /// Fit a fresh copy on `data`, returning the transformed data and the fitted copy
    fn fit_transform(&self, data: &TimeSeriesData) -> Result<(TimeSeriesData, Self)> {
        let mut fitted = self.clone_unfitted();
        fitted.fit(data)?;
        let transformed = fitted.transform(data)?;
        Ok((transformed, fitted))
    }
}

/// No-op transformer returning its input unchanged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DummyTransformer;

impl Transformer for DummyTransformer {
    fn name(&self) -> &str {
        "Dummy"
    }

    fn is_fitted(&self) -> bool {
        true
    }

    fn clone_unfitted(&self) -> Self {
        *self
    }

    fn fit(&mut self, _data: &TimeSeriesData) -> Result<()> {
        Ok(())
    }

    fn transform(&self, data: &TimeSeriesData) -> Result<TimeSeriesData> {
        Ok(data.clone())
    }
}

/// Scales every value column to zero mean and unit variance
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    /// (column, mean, std) learned by `fit`
    params: Option<Vec<(String, f64, f64)>>,
}

impl StandardScaler {
    /// Create an unfitted scaler
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transformer for StandardScaler {
    fn name(&self) -> &str {
        "StandardScaler"
    }

    fn is_fitted(&self) -> bool {
        self.params.is_some()
    }

    fn clone_unfitted(&self) -> Self {
        Self::new()
    }

    fn fit(&mut self, data: &TimeSeriesData) -> Result<()> {
        if data.is_empty() {
            return Err(BacktestError::Transform(
                "Cannot fit StandardScaler on empty data".to_string(),
            ));
        }

        let mut params = Vec::with_capacity(data.value_columns().len());
        for column in data.value_columns() {
            let values = data.values(column)?;
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
            // Constant columns are only centered
            let std = if std > f64::EPSILON { std } else { 1.0 };
            params.push((column.clone(), mean, std));
        }

        self.params = Some(params);
        Ok(())
    }

    fn transform(&self, data: &TimeSeriesData) -> Result<TimeSeriesData> {
        let params = self.params.as_ref().ok_or_else(|| {
            BacktestError::Transform("StandardScaler must be fitted before transform".to_string())
        })?;

        params.iter().try_fold(data.clone(), |acc, (column, mean, std)| {
            let scaled = acc.values(column)?.iter().map(|v| (v - mean) / std).collect();
            acc.with_values(column, scaled)
        })
    }
}

/// Rescales every value column to `[0, 1]` using the training range
#[derive(Debug, Clone, Default)]
pub struct MinMaxScaler {
    /// (column, min, range) learned by `fit`
    params: Option<Vec<(String, f64, f64)>>,
}

impl MinMaxScaler {
    /// Create an unfitted scaler
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transformer for MinMaxScaler {
    fn name(&self) -> &str {
        "MinMaxScaler"
    }

    fn is_fitted(&self) -> bool {
        self.params.is_some()
    }

    fn clone_unfitted(&self) -> Self {
        Self::new()
    }

    fn fit(&mut self, data: &TimeSeriesData) -> Result<()> {
        if data.is_empty() {
            return Err(BacktestError::Transform(
                "Cannot fit MinMaxScaler on empty data".to_string(),
            ));
        }

        let mut params = Vec::with_capacity(data.value_columns().len());
        for column in data.value_columns() {
            let values = data.values(column)?;
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let range = if max - min > f64::EPSILON { max - min } else { 1.0 };
            params.push((column.clone(), min, range));
        }

        self.params = Some(params);
        Ok(())
    }

    fn transform(&self, data: &TimeSeriesData) -> Result<TimeSeriesData> {
        let params = self.params.as_ref().ok_or_else(|| {
            BacktestError::Transform("MinMaxScaler must be fitted before transform".to_string())
        })?;

        params.iter().try_fold(data.clone(), |acc, (column, min, range)| {
            let scaled = acc.values(column)?.iter().map(|v| (v - min) / range).collect();
            acc.with_values(column, scaled)
        })
    }
}
