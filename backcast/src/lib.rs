//! # Backcast
//!
//! Rolling-origin backtesting for time series forecasters.
//!
//! ## Features
//!
//! - Sliding and expanding train/test window planning
//! - Per-fold preprocessing with transformers fitted on training rows only
//! - Pluggable forecasters (Naive, Moving Average, Exponential Smoothing)
//! - Named metrics (MAE, MSE, RMSE, MAPE, sMAPE) and custom metric functions
//! - Optional per-fold plot artifacts and aggregated summaries
//! - Sequential or parallel fold execution
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use backcast::data::DataLoader;
//! use backcast::metrics::MetricSet;
//! use backcast::models::ExponentialSmoothing;
//! use backcast::transform::StandardScaler;
//! use backcast::Backtester;
//!
//! # fn main() -> backcast::Result<()> {
//! // Load data
//! let data = DataLoader::from_csv("data.csv")?;
//!
//! // Evaluate a model on 12-row test windows with 36 rows of history
//! let backtester = Backtester::new(ExponentialSmoothing::new(0.3)?)
//!     .with_transformer(StandardScaler::new())
//!     .test_window(12)
//!     .train_window(36)
//!     .with_metrics(MetricSet::from_names(&["mae", "rmse"])?);
//!
//! let output = backtester.run(&data)?;
//! println!("{}", output.to_json()?);
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod backtester;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod models;
pub mod plot;
pub mod report;
pub mod transform;
pub mod utils;
pub mod window;

// Re-export commonly used types
pub use crate::aggregate::{aggregate, AggregationSpec, MetricsReduction, PlotSelection, Reducer};
pub use crate::backtester::{BacktestListener, Backtester, JsonFoldWriter};
pub use crate::config::{BacktestConfig, ExecutionMode, FailurePolicy};
pub use crate::data::{DataLoader, Granularity, TimeSeriesData};
pub use crate::error::{BacktestError, Result};
pub use crate::metrics::{Metric, MetricSet};
pub use crate::models::{ForecastResult, Forecaster};
pub use crate::plot::{CsvPlotter, FoldContext, PlotArtifact, Plotter};
pub use crate::report::{AggregatedResult, BacktestOutput, FoldResult};
pub use crate::transform::{DummyTransformer, Transformer};
pub use crate::window::{plan, Window, WindowSpec};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
