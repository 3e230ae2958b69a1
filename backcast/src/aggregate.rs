//! Reduction of fold results into a single summary record

use crate::error::{BacktestError, Result};
use crate::report::{AggregatedPlot, AggregatedRanges, AggregatedResult, FoldResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Reduction of one metric's per-fold values to a scalar
pub type ReducerFn = Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// A named reduction
#[derive(Clone)]
pub struct Reducer {
    name: String,
    func: ReducerFn,
}

impl Reducer {
    /// Create a reducer
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Look up a built-in reducer: `min`, `max`, `avg`, `median`, `std` or `sum`
    pub fn builtin(name: &str) -> Option<Self> {
        let reducer = match name {
            "min" => Reducer::new(name, |v| v.iter().cloned().fold(f64::INFINITY, f64::min)),
            "max" => Reducer::new(name, |v| v.iter().cloned().fold(f64::NEG_INFINITY, f64::max)),
            "avg" => Reducer::new(name, mean),
            "median" => Reducer::new(name, median),
            "std" => Reducer::new(name, |v| {
                let m = mean(v);
                (v.iter().map(|x| (x - m).powi(2)).sum::<f64>() / v.len() as f64).sqrt()
            }),
            "sum" => Reducer::new(name, |v| v.iter().sum()),
            _ => return None,
        };
        Some(reducer)
    }

    /// Reducer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply the reduction
    pub fn reduce(&self, values: &[f64]) -> f64 {
        (self.func)(values)
    }
}

impl fmt::Debug for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reducer").field("name", &self.name).finish()
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// How per-fold metric values are reduced
#[derive(Debug, Clone, Default)]
pub enum MetricsReduction {
    /// `min`, `max` and `avg` of every metric
    #[default]
    Default,
    /// The given reducers, applied to every metric
    Custom(Vec<Reducer>),
}

impl MetricsReduction {
    /// Build a custom reduction from built-in reducer names
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut reducers: Vec<Reducer> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            if reducers.iter().any(|r| r.name == name) {
                return Err(BacktestError::Configuration(format!(
                    "duplicate reducer name '{}'",
                    name
                )));
            }
            let reducer = Reducer::builtin(name).ok_or_else(|| {
                BacktestError::Configuration(format!("unknown reducer '{}'", name))
            })?;
            reducers.push(reducer);
        }
        Ok(MetricsReduction::Custom(reducers))
    }

    fn reducers(&self) -> Vec<Reducer> {
        match self {
            MetricsReduction::Default => ["min", "max", "avg"]
                .iter()
                .filter_map(|name| Reducer::builtin(name))
                .collect(),
            MetricsReduction::Custom(reducers) => reducers.clone(),
        }
    }
}

/// Which fold plots an aggregation keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotSelection {
    /// The fold at [`representative_fold`]
    #[default]
    Representative,
    /// An explicit 0-based fold index
    Fold(usize),
    /// Every fold's plot
    All,
}

/// Index of the representative fold among `folds` folds: the middle one,
/// or the later of the two middle ones for an even count.
pub fn representative_fold(folds: usize) -> usize {
    folds / 2
}

/// Aggregation settings
#[derive(Debug, Clone, Default)]
pub struct AggregationSpec {
    /// Metric reduction policy
    pub metrics: MetricsReduction,
    /// Plot selection policy
    pub plot: PlotSelection,
}

impl AggregationSpec {
    /// Default reducers and representative plot
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom metric reduction
    pub fn with_metrics(mut self, metrics: MetricsReduction) -> Self {
        self.metrics = metrics;
        self
    }

    /// Use a plot selection policy
    pub fn with_plot(mut self, plot: PlotSelection) -> Self {
        self.plot = plot;
        self
    }
}

/// Reduce `folds` (in window order) into one summary record
pub fn aggregate(folds: &[FoldResult], spec: &AggregationSpec) -> Result<Vec<AggregatedResult>> {
    let (first, last) = match (folds.first(), folds.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return Err(BacktestError::Configuration(
                "no folds to aggregate".to_string(),
            ))
        }
    };

    let plot = match spec.plot {
        PlotSelection::Representative => {
            AggregatedPlot::Selected(folds[representative_fold(folds.len())].plot.clone())
        }
        PlotSelection::Fold(index) => {
            let fold = folds.get(index).ok_or_else(|| {
                BacktestError::Configuration(format!(
                    "plot fold {} out of range for {} folds",
                    index,
                    folds.len()
                ))
            })?;
            AggregatedPlot::Selected(fold.plot.clone())
        }
        PlotSelection::All => {
            AggregatedPlot::All(folds.iter().filter_map(|f| f.plot.clone()).collect())
        }
    };

    let names: BTreeSet<&String> = folds.iter().flat_map(|f| f.metrics.keys()).collect();
    let reducers = spec.metrics.reducers();

    let metrics = names
        .into_iter()
        .map(|name| {
            let values: Vec<f64> = folds
                .iter()
                .filter_map(|f| f.metrics.get(name).copied())
                .collect();
            let reduced: BTreeMap<String, f64> = reducers
                .iter()
                .map(|r| (r.name().to_string(), r.reduce(&values)))
                .collect();
            (name.clone(), reduced)
        })
        .collect();

    debug!(folds = folds.len(), plot = ?spec.plot, "Aggregated fold results");

    Ok(vec![AggregatedResult {
        ranges: AggregatedRanges {
            start: first.ranges.train_start,
            end: last.ranges.test_end,
        },
        folds: folds.len(),
        metrics,
        plot,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn test_representative_fold() {
        assert_eq!(representative_fold(1), 0);
        assert_eq!(representative_fold(3), 1);
        assert_eq!(representative_fold(4), 2);
    }

    #[test]
    fn test_unknown_reducer() {
        assert!(MetricsReduction::from_names(&["avg", "p99"]).is_err());
        assert!(MetricsReduction::from_names(&["avg", "avg"]).is_err());
    }
}
