//! Utility functions for the backcast crate

use crate::error::{BacktestError, Result};
use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Parse a timestamp from RFC 3339, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(BacktestError::Data(format!(
        "Unrecognized timestamp: '{}'",
        raw
    )))
}

/// Spacing between consecutive observations of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    /// Constant spacing
    Fixed(Duration),
    /// Calendar months
    Monthly,
}

impl Frequency {
    /// Step a timestamp forward by one period
    pub fn advance(&self, ts: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let next = match self {
            Frequency::Fixed(step) => ts.checked_add_signed(*step),
            Frequency::Monthly => ts.checked_add_months(Months::new(1)),
        };

        next.ok_or_else(|| {
            BacktestError::Data(format!("Timestamp overflow advancing {} by {:?}", ts, self))
        })
    }
}

/// Infer the sampling frequency of ascending timestamps.
///
/// Returns `None` when fewer than two timestamps are available. Series whose
/// consecutive points are exactly one calendar month apart are `Monthly`;
/// everything else uses the median gap.
pub fn infer_frequency(timestamps: &[DateTime<Utc>]) -> Option<Frequency> {
    if timestamps.len() < 2 {
        return None;
    }

    let monthly = timestamps
        .windows(2)
        .all(|w| w[0].checked_add_months(Months::new(1)) == Some(w[1]));
    if monthly {
        return Some(Frequency::Monthly);
    }

    let mut gaps: Vec<Duration> = timestamps.windows(2).map(|w| w[1] - w[0]).collect();
    gaps.sort();
    let median = gaps[gaps.len() / 2];

    if median <= Duration::zero() {
        return None;
    }

    Some(Frequency::Fixed(median))
}

/// Create future timestamps for forecasting
pub fn future_timestamps(
    last_timestamp: DateTime<Utc>,
    horizon: usize,
    frequency: Frequency,
) -> Result<Vec<DateTime<Utc>>> {
    let mut timestamps = Vec::with_capacity(horizon);
    let mut current = last_timestamp;

    for _ in 0..horizon {
        current = frequency.advance(current)?;
        timestamps.push(current);
    }

    Ok(timestamps)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(raw: &str) -> DateTime<Utc> {
        parse_timestamp(raw).unwrap()
    }

    #[test]
    fn test_parse_formats() {
        assert_eq!(ts("2023-01-05"), ts("2023-01-05T00:00:00Z"));
        assert_eq!(ts("2023-01-05 10:30:00"), ts("2023-01-05T10:30:00+00:00"));
        assert!(parse_timestamp("05/01/2023").is_err());
    }

    #[test]
    fn test_infer_monthly() {
        let stamps = vec![ts("2020-01-01"), ts("2020-02-01"), ts("2020-03-01")];
        assert_eq!(infer_frequency(&stamps), Some(Frequency::Monthly));

        let next = future_timestamps(stamps[2], 2, Frequency::Monthly).unwrap();
        assert_eq!(next, vec![ts("2020-04-01"), ts("2020-05-01")]);
    }

    #[test]
    fn test_infer_fixed() {
        let stamps = vec![ts("2020-01-01"), ts("2020-01-02"), ts("2020-01-03")];
        assert_eq!(
            infer_frequency(&stamps),
            Some(Frequency::Fixed(Duration::days(1)))
        );
        assert_eq!(infer_frequency(&stamps[..1]), None);
    }
}
