//! Backtest orchestration.
//!
//! A [`Backtester`] plans train/test windows over a series and evaluates one
//! fold per window:
//!
//! 1. fit a fresh copy of the transformer on the training rows,
//! 2. fit a fresh copy of the forecaster on the transformed rows and forecast
//!    `test_window` periods,
//! 3. transform the test rows with the fitted transformer and score the
//!    forecast with every metric,
//! 4. optionally hand the transformed rows and the forecast to a plotter.
//!
//! The forecaster and transformer given to the backtester are templates and
//! are never fitted themselves. Any failure aborts the run unless
//! [`FailurePolicy::SkipFailedFolds`] is selected.

use crate::aggregate::{aggregate, AggregationSpec};
use crate::config::{BacktestConfig, ExecutionMode, FailurePolicy};
use crate::data::{Granularity, TimeSeriesData};
use crate::error::{BacktestError, Result};
use crate::metrics::{evaluate, Metric, MetricSet};
use crate::models::Forecaster;
use crate::plot::{FoldContext, Plotter};
use crate::report::{BacktestOutput, FoldRanges, FoldResult};
use crate::transform::{DummyTransformer, Transformer};
use crate::window::{Window, WindowSpec};
use rayon::prelude::*;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Hooks invoked at fold and run boundaries.
///
/// In [`ExecutionMode::Parallel`] the fold hooks run on worker threads and
/// may interleave; `on_run_complete` always sees results in window order.
/// When a parallel run aborts, folds already in flight on other threads can
/// still reach `on_fold_complete`, and `on_run_complete` is not called.
pub trait BacktestListener: Send + Sync {
    /// A fold is about to be evaluated
    fn on_fold_start(&self, _ctx: &FoldContext) {}

    /// A fold finished successfully
    fn on_fold_complete(&self, _ctx: &FoldContext, _result: &FoldResult) {}

    /// Every fold finished; `results` excludes skipped folds
    fn on_run_complete(&self, _results: &[FoldResult]) {}
}

/// Listener persisting each fold result as `fold_<n>.json` in a directory
#[derive(Debug, Clone)]
pub struct JsonFoldWriter {
    dir: PathBuf,
}

impl JsonFoldWriter {
    /// Write results to `dir`, creating it on first use
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn write(&self, ctx: &FoldContext, result: &FoldResult) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("fold_{}.json", ctx.fold()));
        fs::write(&path, serde_json::to_string_pretty(result)?)?;
        Ok(path)
    }
}

impl BacktestListener for JsonFoldWriter {
    fn on_fold_complete(&self, ctx: &FoldContext, result: &FoldResult) {
        match self.write(ctx, result) {
            Ok(path) => debug!(fold = ctx.fold(), path = %path.display(), "Saved fold result"),
            Err(err) => warn!(fold = ctx.fold(), error = %err, "Failed to save fold result"),
        }
    }
}

/// Drives a forecaster and transformer over every backtest window
pub struct Backtester<F: Forecaster, T: Transformer = DummyTransformer> {
    forecaster: F,
    transformer: T,
    test_window: Option<usize>,
    train_window: Option<usize>,
    step_size: Option<usize>,
    metrics: MetricSet,
    plotter: Option<Arc<dyn Plotter>>,
    aggregation: Option<AggregationSpec>,
    listeners: Vec<Arc<dyn BacktestListener>>,
    granularity: Option<Granularity>,
    execution: ExecutionMode,
    failure_policy: FailurePolicy,
    run_id: Option<String>,
}

impl<F: Forecaster> Backtester<F, DummyTransformer> {
    /// Backtest `forecaster` without preprocessing
    pub fn new(forecaster: F) -> Self {
        Self {
            forecaster,
            transformer: DummyTransformer,
            test_window: None,
            train_window: None,
            step_size: None,
            metrics: MetricSet::new(),
            plotter: None,
            aggregation: None,
            listeners: Vec::new(),
            granularity: None,
            execution: ExecutionMode::default(),
            failure_policy: FailurePolicy::default(),
            run_id: None,
        }
    }
}

impl<F: Forecaster, T: Transformer> Backtester<F, T> {
    /// Build a backtester from a configuration value
    pub fn from_config(forecaster: F, transformer: T, config: &BacktestConfig) -> Result<Self> {
        let aggregation = config
            .aggregation
            .as_ref()
            .map(|a| a.to_spec())
            .transpose()?;

        Ok(Backtester::new(forecaster)
            .with_transformer(transformer)
            .with_window(config.test_window, config.train_window, config.step_size)
            .with_metrics(config.metric_set()?)
            .with_optional_granularity(config.granularity)
            .with_execution(config.execution)
            .with_failure_policy(config.failure_policy)
            .with_optional_aggregation(aggregation)
            .with_optional_run_id(config.run_id.clone()))
    }

    /// Preprocess every fold with `transformer`
    pub fn with_transformer<T2: Transformer>(self, transformer: T2) -> Backtester<F, T2> {
        Backtester {
            forecaster: self.forecaster,
            transformer,
            test_window: self.test_window,
            train_window: self.train_window,
            step_size: self.step_size,
            metrics: self.metrics,
            plotter: self.plotter,
            aggregation: self.aggregation,
            listeners: self.listeners,
            granularity: self.granularity,
            execution: self.execution,
            failure_policy: self.failure_policy,
            run_id: self.run_id,
        }
    }

    /// Rows per test range, which is also the forecast horizon
    pub fn test_window(mut self, test_window: usize) -> Self {
        self.test_window = Some(test_window);
        self
    }

    /// Rows per sliding training range
    pub fn train_window(mut self, train_window: usize) -> Self {
        self.train_window = Some(train_window);
        self
    }

    /// Rows between consecutive test ranges
    pub fn step_size(mut self, step_size: usize) -> Self {
        self.step_size = Some(step_size);
        self
    }

    /// Use every setting of `spec`
    pub fn with_window_spec(self, spec: WindowSpec) -> Self {
        self.with_window(Some(spec.test_window), spec.train_window, spec.step_size)
    }

    fn with_window(
        mut self,
        test_window: Option<usize>,
        train_window: Option<usize>,
        step_size: Option<usize>,
    ) -> Self {
        self.test_window = test_window;
        self.train_window = train_window;
        self.step_size = step_size;
        self
    }

    /// Replace the metric set
    pub fn with_metrics(mut self, metrics: MetricSet) -> Self {
        self.metrics = metrics;
        self
    }

    /// Add a metric, rejecting duplicate names
    pub fn with_metric(mut self, metric: Metric) -> Result<Self> {
        self.metrics.push(metric)?;
        Ok(self)
    }

    /// Save a diagnostic artifact for every fold
    pub fn with_plotter<P: Plotter + 'static>(mut self, plotter: P) -> Self {
        self.plotter = Some(Arc::new(plotter));
        self
    }

    /// Return an aggregated summary instead of fold results
    pub fn with_aggregation(mut self, spec: AggregationSpec) -> Self {
        self.aggregation = Some(spec);
        self
    }

    fn with_optional_aggregation(mut self, spec: Option<AggregationSpec>) -> Self {
        self.aggregation = spec;
        self
    }

    /// Register a lifecycle listener
    pub fn with_listener<L: BacktestListener + 'static>(mut self, listener: L) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Also reject timestamps that collide once truncated to `granularity`.
    ///
    /// Without a granularity, runs only require strictly ascending timestamps.
    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = Some(granularity);
        self
    }

    fn with_optional_granularity(mut self, granularity: Option<Granularity>) -> Self {
        self.granularity = granularity;
        self
    }

    /// Fold scheduling
    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    /// Fold failure handling
    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Identifier passed to plotters and listeners
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    fn with_optional_run_id(mut self, run_id: Option<String>) -> Self {
        self.run_id = run_id;
        self
    }

    /// The forecaster template
    pub fn forecaster(&self) -> &F {
        &self.forecaster
    }

    /// The transformer template
    pub fn transformer(&self) -> &T {
        &self.transformer
    }

    /// Window settings, with the test window defaulting to the forecaster's output length
    pub fn window_spec(&self) -> Result<WindowSpec> {
        let test_window = self
            .test_window
            .or_else(|| self.forecaster.output_length())
            .ok_or_else(|| {
                BacktestError::Configuration(format!(
                    "no test window given and forecaster '{}' has no output length",
                    self.forecaster.name()
                ))
            })?;

        Ok(WindowSpec {
            test_window,
            train_window: self.train_window,
            step_size: self.step_size,
        })
    }

    /// Windows a run over `series` would evaluate
    pub fn plan(&self, series: &TimeSeriesData) -> Result<Vec<Window>> {
        self.window_spec()?.plan(series.len())
    }

    /// Run the backtest, aggregating when an [`AggregationSpec`] is configured
    pub fn run(&self, series: &TimeSeriesData) -> Result<BacktestOutput> {
        let folds = self.run_folds(series)?;

        match &self.aggregation {
            Some(spec) => Ok(BacktestOutput::Aggregated(aggregate(&folds, spec)?)),
            None => Ok(BacktestOutput::Folds(folds)),
        }
    }

    /// Run the backtest and return one result per fold in window order
    pub fn run_folds(&self, series: &TimeSeriesData) -> Result<Vec<FoldResult>> {
        let spec = self.window_spec()?;
        let windows = spec.plan(series.len())?;
        match self.granularity {
            Some(granularity) => series.validate(granularity)?,
            None => series.check_ascending()?,
        }

        info!(
            forecaster = self.forecaster.name(),
            transformer = self.transformer.name(),
            rows = series.len(),
            folds = windows.len(),
            mode = ?self.execution,
            "Starting backtest"
        );
        if windows.is_empty() {
            warn!(
                rows = series.len(),
                test_window = spec.test_window,
                "No backtest window fits the series"
            );
        }

        let outcomes: Vec<(Window, Result<FoldResult>)> = match self.execution {
            ExecutionMode::Sequential => {
                let mut outcomes = Vec::with_capacity(windows.len());
                for window in windows {
                    let outcome = self.execute(series, &window, spec.test_window);
                    let failed = outcome.is_err();
                    outcomes.push((window, outcome));
                    if failed && self.failure_policy == FailurePolicy::Abort {
                        break;
                    }
                }
                outcomes
            }
            ExecutionMode::Parallel => {
                // Under Abort, folds not yet started are dropped once one fails
                let aborted = AtomicBool::new(false);
                windows
                    .into_par_iter()
                    .filter_map(|window| {
                        if aborted.load(Ordering::Relaxed) {
                            return None;
                        }
                        let outcome = self.execute(series, &window, spec.test_window);
                        if outcome.is_err() && self.failure_policy == FailurePolicy::Abort {
                            aborted.store(true, Ordering::Relaxed);
                        }
                        Some((window, outcome))
                    })
                    .collect()
            }
        };

        let mut results = Vec::with_capacity(outcomes.len());
        for (window, outcome) in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(err) if self.failure_policy == FailurePolicy::SkipFailedFolds => {
                    warn!(
                        fold = window.index,
                        train = ?window.train,
                        test = ?window.test,
                        error = %err,
                        "Skipping failed backtest fold"
                    );
                }
                Err(err) => {
                    error!(
                        fold = window.index,
                        train = ?window.train,
                        test = ?window.test,
                        error = %err,
                        "Backtest fold failed"
                    );
                    return Err(err);
                }
            }
        }

        for listener in &self.listeners {
            listener.on_run_complete(&results);
        }
        info!(folds = results.len(), "Backtest complete");

        Ok(results)
    }

    fn execute(&self, series: &TimeSeriesData, window: &Window, horizon: usize) -> Result<FoldResult> {
        let ctx = FoldContext {
            run_id: self.run_id.clone(),
            window: window.clone(),
        };

        for listener in &self.listeners {
            listener.on_fold_start(&ctx);
        }

        let result = self.run_fold(series, &ctx, horizon)?;

        for listener in &self.listeners {
            listener.on_fold_complete(&ctx, &result);
        }
        Ok(result)
    }

    fn run_fold(&self, series: &TimeSeriesData, ctx: &FoldContext, horizon: usize) -> Result<FoldResult> {
        let window = &ctx.window;
        debug!(fold = window.index, train = ?window.train, test = ?window.test, "Running fold");

        let train = series.slice(window.train.clone())?;
        let test = series.slice(window.test.clone())?;

        let mut forecaster = self.forecaster.clone_unfitted();
        let (ready_train, transformer) = self.transformer.fit_transform(&train)?;
        let prediction = forecaster.fit_predict(&ready_train, horizon)?;
        let ready_test = transformer.transform(&test)?;

        let y_true = ready_test.target_values()?;
        if prediction.horizon() != y_true.len() {
            return Err(BacktestError::Model(format!(
                "{} returned {} values for a horizon of {}",
                forecaster.name(),
                prediction.horizon(),
                y_true.len()
            )));
        }
        let metrics = evaluate(&y_true, prediction.values(), &self.metrics)?;

        let ranges = FoldRanges {
            train_start: train.first_timestamp()?,
            train_end: train.last_timestamp()?,
            test_end: test.last_timestamp()?,
        };

        let plot = match &self.plotter {
            Some(plotter) => {
                let full = ready_train.concat(&ready_test)?;
                Some(plotter.plot(ctx, &full, &prediction)?)
            }
            None => None,
        };

        Ok(FoldResult {
            index: window.index,
            ranges,
            metrics,
            plot,
        })
    }
}

impl<F: Forecaster, T: Transformer> fmt::Debug for Backtester<F, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backtester")
            .field("forecaster", &self.forecaster)
            .field("transformer", &self.transformer)
            .field("test_window", &self.test_window)
            .field("train_window", &self.train_window)
            .field("step_size", &self.step_size)
            .field("metrics", &self.metrics)
            .field("plotter", &self.plotter)
            .field("aggregation", &self.aggregation)
            .field("listeners", &self.listeners.len())
            .field("execution", &self.execution)
            .field("failure_policy", &self.failure_policy)
            .finish()
    }
}
