//! Time series data handling for backtesting

use crate::error::{BacktestError, Result};
use crate::utils::{infer_frequency, parse_timestamp, Frequency};
use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::ops::Range;
use std::path::Path;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Resolution timestamps are rounded to before checking for duplicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Whole seconds
    Second,
    /// Whole minutes
    Minute,
    /// Whole hours
    Hour,
    /// Calendar days
    #[default]
    Day,
    /// Calendar months
    Month,
}

impl Granularity {
    /// Truncate a timestamp to this granularity
    pub fn truncate(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let date = ts.date_naive();
        let naive = match self {
            Granularity::Second => date.and_hms_opt(ts.hour(), ts.minute(), ts.second()),
            Granularity::Minute => date.and_hms_opt(ts.hour(), ts.minute(), 0),
            Granularity::Hour => date.and_hms_opt(ts.hour(), 0, 0),
            Granularity::Day => date.and_hms_opt(0, 0, 0),
            Granularity::Month => date.with_day(1).and_then(|d| d.and_hms_opt(0, 0, 0)),
        };

        naive.map(|n| Utc.from_utc_datetime(&n)).unwrap_or(ts)
    }
}

/// Time series data structure used by the backtester.
///
/// The time column is stored as UTC epoch milliseconds (`Int64`) and every
/// value column as `Float64`, whatever the source types were.
#[derive(Debug, Clone)]
pub struct TimeSeriesData {
    /// Data frame containing the time series data
    df: DataFrame,
    /// Name of the time column
    time_column: String,
    /// Names of the numeric value columns
    value_columns: Vec<String>,
    /// Name of the column forecasters predict and metrics score
    target_column: String,
}

/// Data loader for time series data
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load time series data from a CSV file, detecting time and target columns
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<TimeSeriesData> {
        let df = Self::read_csv(path)?;
        Self::from_dataframe(df)
    }

    /// Load time series data from a CSV file with explicit column names
    pub fn from_csv_with_columns<P: AsRef<Path>>(
        path: P,
        time_column: &str,
        target_column: &str,
    ) -> Result<TimeSeriesData> {
        let df = Self::read_csv(path)?;
        TimeSeriesData::from_dataframe(df, time_column, target_column)
    }

    /// Load time series data from a Parquet file, detecting time and target columns
    pub fn from_parquet<P: AsRef<Path>>(path: P) -> Result<TimeSeriesData> {
        let file = File::open(path)?;
        let df = ParquetReader::new(file).finish()?;
        Self::from_dataframe(df)
    }

    /// Create time series data from an existing DataFrame
    pub fn from_dataframe(df: DataFrame) -> Result<TimeSeriesData> {
        let time_column = Self::detect_time_column(&df)?;
        let target_column = Self::detect_target_column(&df, &time_column)?;
        TimeSeriesData::from_dataframe(df, &time_column, &target_column)
    }

    fn read_csv<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;
        Ok(df)
    }

    /// Detect the time column in a DataFrame
    fn detect_time_column(df: &DataFrame) -> Result<String> {
        for name in df.get_column_names() {
            let lower_name = name.to_lowercase();
            if lower_name.contains("time") || lower_name.contains("date") || lower_name == "ds" {
                return Ok(name.to_string());
            }
        }

        // Fall back to the first column if it is temporal
        if let Some(first_col) = df.get_columns().first() {
            if first_col.dtype().is_temporal() {
                return Ok(first_col.name().to_string());
            }
        }

        Err(BacktestError::Data(
            "No time column found in data".to_string(),
        ))
    }

    /// Detect the target column: a conventional name, else the first numeric column
    fn detect_target_column(df: &DataFrame, time_column: &str) -> Result<String> {
        let candidates: Vec<&Series> = df
            .get_columns()
            .iter()
            .filter(|s| s.name() != time_column && s.dtype().is_numeric())
            .collect();

        for preferred in ["y", "value", "target", "close", "price"] {
            if let Some(series) = candidates
                .iter()
                .find(|s| s.name().to_lowercase() == preferred)
            {
                return Ok(series.name().to_string());
            }
        }

        candidates
            .first()
            .map(|s| s.name().to_string())
            .ok_or_else(|| BacktestError::Data("No numeric value column found in data".to_string()))
    }
}

impl TimeSeriesData {
    /// Create a univariate series with a `date` time column and a `value` target
    pub fn new(dates: Vec<DateTime<Utc>>, values: Vec<f64>) -> Result<Self> {
        Self::with_columns(dates, vec![("value".to_string(), values)], "value")
    }

    /// Create a series from timestamps and named value columns
    pub fn with_columns(
        dates: Vec<DateTime<Utc>>,
        columns: Vec<(String, Vec<f64>)>,
        target_column: &str,
    ) -> Result<Self> {
        let mut series = Vec::with_capacity(columns.len() + 1);
        series.push(Series::new(
            "date",
            dates
                .iter()
                .map(|d| d.timestamp_millis())
                .collect::<Vec<i64>>(),
        ));

        for (name, values) in &columns {
            if values.len() != dates.len() {
                return Err(BacktestError::Validation(format!(
                    "Column '{}' has {} values but there are {} timestamps",
                    name,
                    values.len(),
                    dates.len()
                )));
            }
            series.push(Series::new(name, values.as_slice()));
        }

        let df = DataFrame::new(series)?;
        Self::from_dataframe(df, "date", target_column)
    }

    /// Wrap a DataFrame, normalizing the time column to epoch milliseconds and
    /// numeric columns to `Float64`. Non-numeric columns are dropped.
    pub fn from_dataframe(df: DataFrame, time_column: &str, target_column: &str) -> Result<Self> {
        let time = df.column(time_column).map_err(|e| {
            BacktestError::Data(format!("Time column '{}' not found: {}", time_column, e))
        })?;

        let mut columns = vec![normalize_time_column(time)?];
        let mut value_columns = Vec::new();

        for series in df.get_columns() {
            if series.name() == time_column || !series.dtype().is_numeric() {
                continue;
            }
            let values = series.cast(&DataType::Float64)?;
            if values.null_count() > 0 {
                return Err(BacktestError::Data(format!(
                    "Column '{}' contains null values",
                    series.name()
                )));
            }
            value_columns.push(series.name().to_string());
            columns.push(values);
        }

        if !value_columns.iter().any(|c| c == target_column) {
            return Err(BacktestError::Data(format!(
                "Target column '{}' is missing or not numeric",
                target_column
            )));
        }

        Ok(Self {
            df: DataFrame::new(columns)?,
            time_column: time_column.to_string(),
            value_columns,
            target_column: target_column.to_string(),
        })
    }

    /// Get the DataFrame
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Get the time column name
    pub fn time_column(&self) -> &str {
        &self.time_column
    }

    /// Get the value column names
    pub fn value_columns(&self) -> &[String] {
        &self.value_columns
    }

    /// Get the target column name
    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    /// Check if the time series is empty
    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// Get the length of the time series
    pub fn len(&self) -> usize {
        self.df.height()
    }

    /// Get the timestamps as a vector
    pub fn timestamps(&self) -> Result<Vec<DateTime<Utc>>> {
        let millis = self.df.column(&self.time_column)?.i64()?;
        millis
            .into_iter()
            .map(|opt| opt.and_then(millis_to_datetime).ok_or_else(|| self.bad_timestamp()))
            .collect()
    }

    /// Get the timestamp of a single row
    pub fn timestamp_at(&self, index: usize) -> Result<DateTime<Utc>> {
        if index >= self.len() {
            return Err(BacktestError::Validation(format!(
                "Row {} out of bounds for series of length {}",
                index,
                self.len()
            )));
        }

        self.df
            .column(&self.time_column)?
            .i64()?
            .get(index)
            .and_then(millis_to_datetime)
            .ok_or_else(|| self.bad_timestamp())
    }

    /// Timestamp of the first row
    pub fn first_timestamp(&self) -> Result<DateTime<Utc>> {
        self.timestamp_at(0)
    }

    /// Timestamp of the last row
    pub fn last_timestamp(&self) -> Result<DateTime<Utc>> {
        match self.len() {
            0 => Err(BacktestError::Data("Empty time series data".to_string())),
            n => self.timestamp_at(n - 1),
        }
    }

    /// Get the target values as a vector
    pub fn target_values(&self) -> Result<Vec<f64>> {
        self.values(&self.target_column)
    }

    /// Get a value column as a vector
    pub fn values(&self, column: &str) -> Result<Vec<f64>> {
        let col = self.df.column(column).map_err(|e| {
            BacktestError::Data(format!("Column '{}' not found: {}", column, e))
        })?;

        col.f64()?
            .into_iter()
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| BacktestError::Data(format!("Column '{}' contains null values", column)))
    }

    /// Get the rows in `range` without copying the underlying buffers
    pub fn slice(&self, range: Range<usize>) -> Result<Self> {
        if range.start > range.end || range.end > self.len() {
            return Err(BacktestError::Validation(format!(
                "Slice {:?} out of bounds for series of length {}",
                range,
                self.len()
            )));
        }

        Ok(Self {
            df: self.df.slice(range.start as i64, range.len()),
            time_column: self.time_column.clone(),
            value_columns: self.value_columns.clone(),
            target_column: self.target_column.clone(),
        })
    }

    /// Append the rows of `other`, which must share this series' columns
    pub fn concat(&self, other: &Self) -> Result<Self> {
        if self.time_column != other.time_column || self.value_columns != other.value_columns {
            return Err(BacktestError::Validation(
                "Cannot concatenate series with different columns".to_string(),
            ));
        }

        Ok(Self {
            df: self.df.vstack(&other.df)?,
            time_column: self.time_column.clone(),
            value_columns: self.value_columns.clone(),
            target_column: self.target_column.clone(),
        })
    }

    /// Return a copy with `column` replaced by `values`
    pub fn with_values(&self, column: &str, values: Vec<f64>) -> Result<Self> {
        if !self.value_columns.iter().any(|c| c == column) {
            return Err(BacktestError::Data(format!("Column '{}' not found", column)));
        }
        if values.len() != self.len() {
            return Err(BacktestError::Validation(format!(
                "Replacement for '{}' has {} values, expected {}",
                column,
                values.len(),
                self.len()
            )));
        }

        let mut df = self.df.clone();
        df.with_column(Series::new(column, values))?;

        Ok(Self {
            df,
            time_column: self.time_column.clone(),
            value_columns: self.value_columns.clone(),
            target_column: self.target_column.clone(),
        })
    }

    /// Return a copy with the target column replaced by `values`
    pub fn with_target_values(&self, values: Vec<f64>) -> Result<Self> {
        let target = self.target_column.clone();
        self.with_values(&target, values)
    }

    /// Check that raw timestamps are strictly ascending
    pub fn check_ascending(&self) -> Result<()> {
        self.check_order(|ts| ts, None)
    }

    /// Check that timestamps are strictly ascending once truncated to `granularity`
    pub fn validate(&self, granularity: Granularity) -> Result<()> {
        self.check_order(|ts| granularity.truncate(ts), Some(granularity))
    }

    fn check_order(
        &self,
        round: impl Fn(DateTime<Utc>) -> DateTime<Utc>,
        granularity: Option<Granularity>,
    ) -> Result<()> {
        let timestamps = self.timestamps()?;

        for (i, pair) in timestamps.windows(2).enumerate() {
            let previous = round(pair[0]);
            let current = round(pair[1]);
            if current < previous {
                return Err(BacktestError::Data(format!(
                    "Timestamps not sorted: {} follows {} at row {}",
                    pair[1],
                    pair[0],
                    i + 1
                )));
            }
            if current == previous {
                let resolution = granularity
                    .map(|g| format!(" at {:?} granularity", g))
                    .unwrap_or_default();
                return Err(BacktestError::Data(format!(
                    "Duplicate timestamp {} at row {}{}",
                    current,
                    i + 1,
                    resolution
                )));
            }
        }

        Ok(())
    }

    /// Infer the sampling frequency from the timestamps
    pub fn frequency(&self) -> Result<Option<Frequency>> {
        Ok(infer_frequency(&self.timestamps()?))
    }

    fn bad_timestamp(&self) -> BacktestError {
        BacktestError::Data(format!(
            "Column '{}' contains null or out of range timestamps",
            self.time_column
        ))
    }
}

fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Convert a temporal, integer or string column to epoch milliseconds
fn normalize_time_column(series: &Series) -> Result<Series> {
    let name = series.name().to_string();

    let millis: Vec<Option<i64>> = match series.dtype() {
        DataType::Datetime(unit, _) => {
            let divisor = match unit {
                TimeUnit::Nanoseconds => 1_000_000,
                TimeUnit::Microseconds => 1_000,
                TimeUnit::Milliseconds => 1,
            };
            let physical = series.cast(&DataType::Int64)?;
            let values: Vec<Option<i64>> = physical
                .i64()?
                .into_iter()
                .map(|v| v.map(|v| v.div_euclid(divisor)))
                .collect();
            values
        }
        DataType::Date => {
            let physical = series.cast(&DataType::Int32)?;
            let values: Vec<Option<i64>> = physical
                .i32()?
                .into_iter()
                .map(|v| v.map(|days| days as i64 * MILLIS_PER_DAY))
                .collect();
            values
        }
        DataType::Utf8 => series
            .utf8()?
            .into_iter()
            .map(|v| v.map(parse_timestamp).transpose().map(|ts| ts.map(|t| t.timestamp_millis())))
            .collect::<Result<Vec<Option<i64>>>>()?,
        DataType::Int64 | DataType::Int32 | DataType::UInt32 | DataType::UInt64 => {
            let physical = series.cast(&DataType::Int64)?;
            let values: Vec<Option<i64>> = physical.i64()?.into_iter().collect();
            values
        }
        other => {
            return Err(BacktestError::Data(format!(
                "Column '{}' of type {} cannot be used as time column",
                name, other
            )))
        }
    };

    let millis = millis
        .into_iter()
        .collect::<Option<Vec<i64>>>()
        .ok_or_else(|| BacktestError::Data(format!("Time column '{}' contains null values", name)))?;

    Ok(Series::new(&name, millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(raw: &str) -> DateTime<Utc> {
        parse_timestamp(raw).unwrap()
    }

    #[test]
    fn test_granularity_truncate() {
        let stamp = ts("2021-03-17 13:45:12");
        assert_eq!(Granularity::Hour.truncate(stamp), ts("2021-03-17 13:00:00"));
        assert_eq!(Granularity::Day.truncate(stamp), ts("2021-03-17"));
        assert_eq!(Granularity::Month.truncate(stamp), ts("2021-03-01"));
    }

    #[test]
    fn test_slice_is_positional() {
        let dates = vec![ts("2021-01-01"), ts("2021-01-02"), ts("2021-01-03")];
        let data = TimeSeriesData::new(dates, vec![1.0, 2.0, 3.0]).unwrap();

        let tail = data.slice(1..3).unwrap();
        assert_eq!(tail.target_values().unwrap(), vec![2.0, 3.0]);
        assert_eq!(tail.first_timestamp().unwrap(), ts("2021-01-02"));
        assert_eq!(data.len(), 3);

        assert!(data.slice(2..4).is_err());
    }
}
