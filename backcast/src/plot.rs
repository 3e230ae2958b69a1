//! Per-fold diagnostic artifacts

use crate::data::TimeSeriesData;
use crate::error::{BacktestError, Result};
use crate::models::ForecastResult;
use crate::window::Window;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Debug};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Handle to a saved artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlotArtifact(PathBuf);

impl PlotArtifact {
    /// Wrap a path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Path of the artifact
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for PlotArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Context of the fold being processed, passed explicitly to collaborators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldContext {
    /// Identifier of the run, if the caller supplied one
    pub run_id: Option<String>,
    /// Window of the fold
    pub window: Window,
}

impl FoldContext {
    /// Index of the fold in the plan
    pub fn fold(&self) -> usize {
        self.window.index
    }
}

/// Renders the diagnostic figure of one fold and returns a handle to it
pub trait Plotter: Debug + Send + Sync {
    /// Save a figure of `series` (train then test rows) against `prediction`
    fn plot(
        &self,
        ctx: &FoldContext,
        series: &TimeSeriesData,
        prediction: &ForecastResult,
    ) -> Result<PlotArtifact>;
}

/// Writes the data behind each fold's figure as a CSV table.
///
/// Columns are `timestamp`, `actual`, `predicted`, `lower` and `upper`;
/// prediction columns are empty outside the forecast horizon.
#[derive(Debug, Clone)]
pub struct CsvPlotter {
    dir: PathBuf,
    prefix: String,
}

impl CsvPlotter {
    /// Save artifacts in `dir`, creating it if needed
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: "backtest".to_string(),
        }
    }

    /// Prefix of every artifact file name
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn artifact_path(&self, ctx: &FoldContext) -> PathBuf {
        let name = match &ctx.run_id {
            Some(run_id) => format!("{}_{}_fold_{}.csv", self.prefix, run_id, ctx.fold()),
            None => format!("{}_fold_{}.csv", self.prefix, ctx.fold()),
        };
        self.dir.join(name)
    }
}

#[derive(Debug, Default)]
struct PlotRow {
    actual: Option<f64>,
    predicted: Option<f64>,
    lower: Option<f64>,
    upper: Option<f64>,
}

impl Plotter for CsvPlotter {
    fn plot(
        &self,
        ctx: &FoldContext,
        series: &TimeSeriesData,
        prediction: &ForecastResult,
    ) -> Result<PlotArtifact> {
        fs::create_dir_all(&self.dir)?;
        let path = self.artifact_path(ctx);

        let mut rows: BTreeMap<i64, PlotRow> = BTreeMap::new();
        for (ts, actual) in series.timestamps()?.into_iter().zip(series.target_values()?) {
            rows.entry(ts.timestamp_millis()).or_default().actual = Some(actual);
        }
        for (i, (ts, value)) in prediction
            .timestamps()
            .iter()
            .zip(prediction.values())
            .enumerate()
        {
            let row = rows.entry(ts.timestamp_millis()).or_default();
            row.predicted = Some(*value);
            if let Some((lower, upper)) = prediction.intervals().map(|iv| iv[i]) {
                row.lower = Some(lower);
                row.upper = Some(upper);
            }
        }

        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(["timestamp", "actual", "predicted", "lower", "upper"])?;
        for (millis, row) in rows {
            let timestamp = Utc
                .timestamp_millis_opt(millis)
                .single()
                .map(|ts| ts.to_rfc3339())
                .ok_or_else(|| BacktestError::Plot(format!("invalid timestamp {}", millis)))?;
            writer.write_record([
                timestamp,
                format_cell(row.actual),
                format_cell(row.predicted),
                format_cell(row.lower),
                format_cell(row.upper),
            ])?;
        }
        writer.flush()?;

        debug!(fold = ctx.fold(), path = %path.display(), "Saved fold plot data");
        Ok(PlotArtifact::new(path))
    }
}

fn format_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
