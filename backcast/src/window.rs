//! Train/test window planning for backtests.
//!
//! Windows are expressed as row ranges over the original series, so planning
//! only depends on the series length. Two policies are supported:
//!
//! - **Sliding** (`train_window = Some(w)`): every training range holds the
//!   `w` rows immediately before its test range.
//! - **Expanding** (`train_window = None`): every training range starts at
//!   row 0 and grows by `step_size` per window.
//!
//! The first test range starts at `train_window` (sliding) or `step_size`
//! (expanding) and later ones advance by `step_size` while a full test range
//! still fits. Rows after the last test range are left unused.

use crate::error::{BacktestError, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::debug;

/// Window sizes for a backtest, all in rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    /// Rows in each test range
    pub test_window: usize,
    /// Rows in each training range, `None` for an expanding window
    pub train_window: Option<usize>,
    /// Rows between consecutive test ranges, defaults to `test_window`
    pub step_size: Option<usize>,
}

impl WindowSpec {
    /// Expanding-window spec stepping by `test_window`
    pub fn new(test_window: usize) -> Self {
        Self {
            test_window,
            train_window: None,
            step_size: None,
        }
    }

    /// Use a sliding training window of `train_window` rows
    pub fn with_train_window(mut self, train_window: usize) -> Self {
        self.train_window = Some(train_window);
        self
    }

    /// Advance test ranges by `step_size` rows
    pub fn with_step_size(mut self, step_size: usize) -> Self {
        self.step_size = Some(step_size);
        self
    }

    /// Step size after applying the default
    pub fn effective_step(&self) -> usize {
        self.step_size.unwrap_or(self.test_window)
    }

    /// Plan the windows of a series with `series_length` rows
    pub fn plan(&self, series_length: usize) -> Result<Vec<Window>> {
        plan(
            series_length,
            self.test_window,
            self.train_window,
            self.effective_step(),
        )
    }
}

/// One train/test partition of a series
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    /// Position of this window in the plan
    pub index: usize,
    /// Training rows
    pub train: Range<usize>,
    /// Test rows
    pub test: Range<usize>,
}

/// Partition `series_length` rows into train/test windows.
///
/// Returns an empty plan when no test range fits; that is not an error.
pub fn plan(
    series_length: usize,
    test_window: usize,
    train_window: Option<usize>,
    step_size: usize,
) -> Result<Vec<Window>> {
    if series_length == 0 {
        return Err(BacktestError::Configuration(
            "time series is empty".to_string(),
        ));
    }
    if test_window == 0 || test_window >= series_length {
        return Err(BacktestError::Configuration(format!(
            "inconsistent test window: {} must be in (0, {})",
            test_window, series_length
        )));
    }
    if step_size == 0 {
        return Err(BacktestError::Configuration(
            "step size must be positive".to_string(),
        ));
    }
    if let Some(train) = train_window {
        if train == 0 || train >= series_length {
            return Err(BacktestError::Configuration(format!(
                "inconsistent train window: {} must be in (0, {})",
                train, series_length
            )));
        }
    }

    let last_start = series_length - test_window;
    let first_start = train_window.unwrap_or(step_size);

    let windows: Vec<Window> = (first_start..=last_start)
        .step_by(step_size)
        .enumerate()
        .map(|(index, test_start)| {
            let train_start = train_window.map_or(0, |w| test_start - w);
            Window {
                index,
                train: train_start..test_start,
                test: test_start..test_start + test_window,
            }
        })
        .collect();

    debug!(
        series_length,
        test_window,
        ?train_window,
        step_size,
        windows = windows.len(),
        "Planned backtest windows"
    );

    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expanding_windows() {
        let windows = plan(10, 2, None, 2).unwrap();
        let tests: Vec<_> = windows.iter().map(|w| w.test.clone()).collect();
        assert_eq!(tests, vec![2..4, 4..6, 6..8, 8..10]);
        assert!(windows.iter().all(|w| w.train.start == 0 && w.train.end == w.test.start));
    }

    #[test]
    fn test_sliding_windows() {
        let windows = plan(10, 2, Some(4), 3).unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].train, 0..4);
        assert_eq!(windows[0].test, 4..6);
        assert_eq!(windows[1].train, 3..7);
        assert_eq!(windows[1].test, 7..9);
    }

    #[test]
    fn test_step_defaults_to_test_window() {
        let spec = WindowSpec::new(3);
        assert_eq!(spec.effective_step(), 3);
        assert_eq!(spec.with_step_size(1).effective_step(), 1);
    }
}
