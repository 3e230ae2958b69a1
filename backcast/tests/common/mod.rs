#![allow(dead_code)]

use backcast::data::TimeSeriesData;
use backcast::error::Result;
use backcast::models::{ForecastResult, Forecaster};
use backcast::utils::future_timestamps;
use chrono::{DateTime, Duration, Months, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

pub fn monthly_dates(n: usize) -> Vec<DateTime<Utc>> {
    let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| start.checked_add_months(Months::new(i as u32)).unwrap())
        .collect()
}

pub fn daily_dates(n: usize) -> Vec<DateTime<Utc>> {
    let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    (0..n).map(|i| start + Duration::days(i as i64)).collect()
}

/// Monthly series whose value at row `i` is `i`
pub fn linear_monthly(n: usize) -> TimeSeriesData {
    let values = (0..n).map(|i| i as f64).collect();
    TimeSeriesData::new(monthly_dates(n), values).unwrap()
}

/// Monthly trend plus seeded gaussian noise
pub fn noisy_monthly(n: usize, seed: u64) -> TimeSeriesData {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 2.0).unwrap();
    let values = (0..n)
        .map(|i| 100.0 + 0.5 * i as f64 + noise.sample(&mut rng))
        .collect();
    TimeSeriesData::new(monthly_dates(n), values).unwrap()
}

/// Predicts the training mean and refuses to be fitted twice
#[derive(Debug, Clone, Default)]
pub struct MeanForecaster {
    fitted: Option<(f64, DateTime<Utc>)>,
}

impl Forecaster for MeanForecaster {
    fn name(&self) -> &str {
        "Mean"
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    fn clone_unfitted(&self) -> Self {
        Self::default()
    }

    fn fit(&mut self, data: &TimeSeriesData) -> Result<()> {
        assert!(self.fitted.is_none(), "forecaster reused across folds");
        let values = data.target_values()?;
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        self.fitted = Some((mean, data.last_timestamp()?));
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<ForecastResult> {
        let (mean, last) = self.fitted.unwrap();
        let timestamps = future_timestamps(last, horizon, backcast::utils::Frequency::Monthly)?;
        ForecastResult::new(timestamps, vec![mean; horizon])
    }
}

/// Returns a single value whatever the horizon
#[derive(Debug, Clone, Default)]
pub struct ShortForecaster {
    last: Option<(f64, DateTime<Utc>)>,
}

impl Forecaster for ShortForecaster {
    fn name(&self) -> &str {
        "Short"
    }

    fn is_fitted(&self) -> bool {
        self.last.is_some()
    }

    fn clone_unfitted(&self) -> Self {
        Self::default()
    }

    fn fit(&mut self, data: &TimeSeriesData) -> Result<()> {
        let values = data.target_values()?;
        self.last = Some((values[values.len() - 1], data.last_timestamp()?));
        Ok(())
    }

    fn predict(&self, _horizon: usize) -> Result<ForecastResult> {
        let (value, last) = self.last.unwrap();
        ForecastResult::new(vec![last], vec![value])
    }
}
