//! Metrics for evaluating forecast performance on each fold

use crate::error::{BacktestError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Scoring function over `(y_true, y_pred)`
pub type MetricFn = Arc<dyn Fn(&[f64], &[f64]) -> Result<f64> + Send + Sync>;

/// A named scoring function
#[derive(Clone)]
pub struct Metric {
    name: String,
    func: MetricFn,
}

impl Metric {
    /// Create a metric from a fallible scoring function
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[f64], &[f64]) -> Result<f64> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Create a metric from a scoring function that cannot fail
    pub fn from_fn<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[f64], &[f64]) -> f64 + Send + Sync + 'static,
    {
        Self::new(name, move |y_true, y_pred| Ok(func(y_true, y_pred)))
    }

    /// Metric name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Score a prediction
    pub fn score(&self, y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
        (self.func)(y_true, y_pred)
    }
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metric").field("name", &self.name).finish()
    }
}

/// Ordered collection of metrics with unique names
#[derive(Debug, Clone, Default)]
pub struct MetricSet {
    metrics: Vec<Metric>,
}

impl MetricSet {
    /// Create an empty metric set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a metric, rejecting duplicate names
    pub fn with(mut self, metric: Metric) -> Result<Self> {
        self.push(metric)?;
        Ok(self)
    }

    /// Add a metric, rejecting duplicate names
    pub fn push(&mut self, metric: Metric) -> Result<()> {
        if self.metrics.iter().any(|m| m.name == metric.name) {
            return Err(BacktestError::Configuration(format!(
                "duplicate metric name '{}'",
                metric.name
            )));
        }
        self.metrics.push(metric);
        Ok(())
    }

    /// Build a set from built-in metric names
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut set = Self::new();
        for name in names {
            let name = name.as_ref();
            let metric = builtin(name).ok_or_else(|| {
                BacktestError::Configuration(format!("unknown metric '{}'", name))
            })?;
            set.push(metric)?;
        }
        Ok(set)
    }

    /// Metrics in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Metric> {
        self.metrics.iter()
    }

    /// Number of metrics
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// Score `y_pred` against `y_true` with every metric.
///
/// Metrics run in insertion order and the first failure is returned as is.
pub fn evaluate(y_true: &[f64], y_pred: &[f64], metrics: &MetricSet) -> Result<BTreeMap<String, f64>> {
    metrics
        .iter()
        .map(|metric| Ok((metric.name().to_string(), metric.score(y_true, y_pred)?)))
        .collect()
}

/// Look up a built-in metric by name
pub fn builtin(name: &str) -> Option<Metric> {
    let metric = match name {
        "mae" => Metric::new(name, mean_absolute_error),
        "mse" => Metric::new(name, mean_squared_error),
        "rmse" => Metric::new(name, root_mean_squared_error),
        "mape" => Metric::new(name, mean_absolute_percentage_error),
        "smape" => Metric::new(name, symmetric_mean_absolute_percentage_error),
        _ => return None,
    };
    Some(metric)
}

/// Names accepted by [`builtin`]
pub const BUILTIN_METRICS: [&str; 5] = ["mae", "mse", "rmse", "mape", "smape"];

fn check_lengths(name: &str, y_true: &[f64], y_pred: &[f64]) -> Result<()> {
    if y_true.len() != y_pred.len() || y_true.is_empty() {
        return Err(BacktestError::metric(
            name,
            format!(
                "actual ({}) and predicted ({}) values must have the same non-zero length",
                y_true.len(),
                y_pred.len()
            ),
        ));
    }
    Ok(())
}

/// Mean Absolute Error
pub fn mean_absolute_error(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_lengths("mae", y_true, y_pred)?;
    let sum: f64 = y_true.iter().zip(y_pred).map(|(a, f)| (a - f).abs()).sum();
    Ok(sum / y_true.len() as f64)
}

/// Mean Squared Error
pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_lengths("mse", y_true, y_pred)?;
    let sum: f64 = y_true.iter().zip(y_pred).map(|(a, f)| (a - f).powi(2)).sum();
    Ok(sum / y_true.len() as f64)
}

/// Root Mean Squared Error
pub fn root_mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_lengths("rmse", y_true, y_pred)?;
    Ok(mean_squared_error(y_true, y_pred)?.sqrt())
}

/// Mean Absolute Percentage Error, as a fraction. Fails on zero actual values.
pub fn mean_absolute_percentage_error(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_lengths("mape", y_true, y_pred)?;
    if y_true.iter().any(|a| *a == 0.0) {
        return Err(BacktestError::metric(
            "mape",
            "undefined when actual values contain zero",
        ));
    }

    let sum: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(a, f)| ((a - f) / a).abs())
        .sum();
    Ok(sum / y_true.len() as f64)
}

/// Symmetric Mean Absolute Percentage Error, as a fraction in `[0, 2]`
pub fn symmetric_mean_absolute_percentage_error(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_lengths("smape", y_true, y_pred)?;
    let sum: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(a, f)| {
            let denom = a.abs() + f.abs();
            if denom == 0.0 {
                0.0
            } else {
                2.0 * (a - f).abs() / denom
            }
        })
        .sum();
    Ok(sum / y_true.len() as f64)
}
