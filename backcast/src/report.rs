//! Result records produced by a backtest run

use crate::error::Result;
use crate::plot::PlotArtifact;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// Boundary timestamps of one fold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldRanges {
    /// First training timestamp
    pub train_start: DateTime<Utc>,
    /// Last training timestamp
    pub train_end: DateTime<Utc>,
    /// Last test timestamp
    pub test_end: DateTime<Utc>,
}

/// Outcome of one fold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldResult {
    /// Position of the fold in the plan
    pub index: usize,
    /// Boundary timestamps
    pub ranges: FoldRanges,
    /// Score of every metric
    pub metrics: BTreeMap<String, f64>,
    /// Diagnostic artifact, when a plotter was configured
    pub plot: Option<PlotArtifact>,
}

/// Time span covered by an aggregated result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedRanges {
    /// First fold's training start
    pub start: DateTime<Utc>,
    /// Last fold's test end
    pub end: DateTime<Utc>,
}

/// Plot artifacts kept by an aggregation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregatedPlot {
    /// A single fold's artifact, absent when that fold has none
    Selected(Option<PlotArtifact>),
    /// Every fold's artifact in fold order
    All(Vec<PlotArtifact>),
}

/// Summary of all folds of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    /// Span from the first training row to the last test row
    pub ranges: AggregatedRanges,
    /// Number of folds summarized
    pub folds: usize,
    /// Metric name -> reducer name -> value
    pub metrics: BTreeMap<String, BTreeMap<String, f64>>,
    /// Selected plot artifacts
    pub plot: AggregatedPlot,
}

/// What a backtest run returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BacktestOutput {
    /// One record per fold, in window order
    Folds(Vec<FoldResult>),
    /// Summary records
    Aggregated(Vec<AggregatedResult>),
}

impl BacktestOutput {
    /// Fold results, if the run was not aggregated
    pub fn folds(&self) -> Option<&[FoldResult]> {
        match self {
            BacktestOutput::Folds(folds) => Some(folds),
            BacktestOutput::Aggregated(_) => None,
        }
    }

    /// Aggregated results, if aggregation was requested
    pub fn aggregated(&self) -> Option<&[AggregatedResult]> {
        match self {
            BacktestOutput::Folds(_) => None,
            BacktestOutput::Aggregated(aggregated) => Some(aggregated),
        }
    }

    /// Serialize to a pretty-printed JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the JSON report to `path`
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl fmt::Display for FoldResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Fold {}: train {} .. {}, test until {}",
            self.index, self.ranges.train_start, self.ranges.train_end, self.ranges.test_end
        )?;
        for (name, value) in &self.metrics {
            writeln!(f, "  {:<8} {:.4}", name, value)?;
        }
        if let Some(plot) = &self.plot {
            writeln!(f, "  plot     {}", plot)?;
        }
        Ok(())
    }
}

impl fmt::Display for AggregatedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Backtest summary ({} folds, {} .. {}):",
            self.folds, self.ranges.start, self.ranges.end
        )?;
        for (name, reduced) in &self.metrics {
            let parts: Vec<String> = reduced
                .iter()
                .map(|(reducer, value)| format!("{}={:.4}", reducer, value))
                .collect();
            writeln!(f, "  {:<8} {}", name, parts.join(" "))?;
        }
        Ok(())
    }
}
