//! Serializable backtest configuration

use crate::aggregate::{AggregationSpec, MetricsReduction, PlotSelection};
use crate::data::Granularity;
use crate::error::Result;
use crate::metrics::MetricSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// How folds are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One fold at a time in window order
    #[default]
    Sequential,
    /// Folds run on the rayon thread pool; results keep window order
    Parallel,
}

/// What happens when a fold fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the run with the fold's error
    #[default]
    Abort,
    /// Log the error and leave the fold out of the results
    SkipFailedFolds,
}

/// Aggregation section of a [`BacktestConfig`]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Built-in reducer names; empty means `min`, `max` and `avg`
    pub reducers: Vec<String>,
    /// Plot selection policy
    pub plot: PlotSelection,
}

impl AggregationConfig {
    /// Resolve reducer names into an [`AggregationSpec`]
    pub fn to_spec(&self) -> Result<AggregationSpec> {
        let metrics = if self.reducers.is_empty() {
            MetricsReduction::Default
        } else {
            MetricsReduction::from_names(self.reducers.as_slice())?
        };
        Ok(AggregationSpec::new().with_metrics(metrics).with_plot(self.plot))
    }
}

/// Backtest settings loadable from JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Rows per test range; falls back to the forecaster's output length
    pub test_window: Option<usize>,
    /// Rows per training range, absent for an expanding window
    pub train_window: Option<usize>,
    /// Rows between test ranges, defaults to the test window
    pub step_size: Option<usize>,
    /// Built-in metric names
    pub metrics: Vec<String>,
    /// Aggregate fold results when present
    pub aggregation: Option<AggregationConfig>,
    /// Resolution for duplicate-timestamp checks; absent means strict ascending order only
    pub granularity: Option<Granularity>,
    /// Fold scheduling
    pub execution: ExecutionMode,
    /// Fold failure handling
    pub failure_policy: FailurePolicy,
    /// Identifier passed to plotters and listeners
    pub run_id: Option<String>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            test_window: None,
            train_window: None,
            step_size: None,
            metrics: vec!["mae".to_string(), "rmse".to_string()],
            aggregation: None,
            granularity: None,
            execution: ExecutionMode::default(),
            failure_policy: FailurePolicy::default(),
            run_id: None,
        }
    }
}

impl BacktestConfig {
    /// Parse a configuration from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Resolve metric names into a [`MetricSet`]
    pub fn metric_set(&self) -> Result<MetricSet> {
        MetricSet::from_names(self.metrics.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = BacktestConfig::from_json_str(r#"{"test_window": 10, "train_window": 30}"#).unwrap();
        assert_eq!(config.test_window, Some(10));
        assert_eq!(config.train_window, Some(30));
        assert_eq!(config.step_size, None);
        assert_eq!(config.metrics, vec!["mae", "rmse"]);
        assert_eq!(config.execution, ExecutionMode::Sequential);
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
        assert_eq!(config.granularity, None);
    }

    #[test]
    fn test_aggregation_section() {
        let json = r#"{
            "test_window": 5,
            "aggregation": {"reducers": ["avg", "median"], "plot": {"fold": 2}},
            "execution": "parallel",
            "granularity": "month"
        }"#;
        let config = BacktestConfig::from_json_str(json).unwrap();
        let aggregation = config.aggregation.unwrap();
        assert_eq!(aggregation.plot, PlotSelection::Fold(2));
        assert!(aggregation.to_spec().is_ok());
        assert_eq!(config.execution, ExecutionMode::Parallel);
        assert_eq!(config.granularity, Some(Granularity::Month));
    }

    #[test]
    fn test_unknown_metric_is_rejected() {
        let config = BacktestConfig {
            metrics: vec!["mae".to_string(), "r2".to_string()],
            ..Default::default()
        };
        assert!(config.metric_set().is_err());
    }
}
