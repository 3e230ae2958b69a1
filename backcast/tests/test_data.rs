use backcast::data::{DataLoader, Granularity, TimeSeriesData};
use backcast::error::BacktestError;
use backcast::utils::{parse_timestamp, Frequency};
use chrono::Duration;
use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::NamedTempFile;

fn csv_file(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file
}

fn dates(raw: &[&str]) -> Vec<chrono::DateTime<chrono::Utc>> {
    raw.iter().map(|s| parse_timestamp(s).unwrap()).collect()
}

#[test]
fn test_data_loader_from_csv() {
    let file = csv_file(&[
        "date,open,high,low,close,volume",
        "2023-01-01,100.0,105.0,98.0,103.0,1000",
        "2023-01-02,103.0,107.0,101.0,106.0,1200",
        "2023-01-03,106.0,110.0,104.0,108.0,1500",
    ]);

    let data = DataLoader::from_csv(file.path()).unwrap();

    assert_eq!(data.len(), 3);
    assert_eq!(data.time_column(), "date");
    assert_eq!(data.target_column(), "close");
    assert_eq!(data.value_columns().len(), 5);
    assert_eq!(data.target_values().unwrap(), vec![103.0, 106.0, 108.0]);
    assert_eq!(data.first_timestamp().unwrap(), parse_timestamp("2023-01-01").unwrap());
}

#[test]
fn test_data_loader_with_columns() {
    let file = csv_file(&[
        "ds,y,exog",
        "2023-01-01 09:00:00,1.5,10",
        "2023-01-01 10:00:00,2.5,11",
    ]);

    let data = DataLoader::from_csv_with_columns(file.path(), "ds", "exog").unwrap();
    assert_eq!(data.target_column(), "exog");
    assert_eq!(data.target_values().unwrap(), vec![10.0, 11.0]);
    assert_eq!(data.values("y").unwrap(), vec![1.5, 2.5]);
    assert_eq!(
        data.frequency().unwrap(),
        Some(Frequency::Fixed(Duration::hours(1)))
    );
}

#[test]
fn test_missing_target_column() {
    let file = csv_file(&["date,value", "2023-01-01,1.0"]);
    let result = DataLoader::from_csv_with_columns(file.path(), "date", "price");
    assert!(matches!(result, Err(BacktestError::Data(_))));
}

#[test]
fn test_time_series_data_operations() {
    let data = TimeSeriesData::new(
        dates(&["2023-01-01", "2023-01-02", "2023-01-03", "2023-01-04"]),
        vec![100.0, 103.0, 106.0, 104.0],
    )
    .unwrap();

    assert_eq!(data.len(), 4);
    assert!(!data.is_empty());

    let head = data.slice(0..2).unwrap();
    let tail = data.slice(2..4).unwrap();
    assert_eq!(head.target_values().unwrap(), vec![100.0, 103.0]);
    assert_eq!(tail.first_timestamp().unwrap(), parse_timestamp("2023-01-03").unwrap());

    let joined = head.concat(&tail).unwrap();
    assert_eq!(joined.target_values().unwrap(), data.target_values().unwrap());
    assert_eq!(joined.timestamps().unwrap(), data.timestamps().unwrap());

    assert!(data.slice(3..5).is_err());
}

#[test]
fn test_with_target_values_keeps_source() {
    let data = TimeSeriesData::new(dates(&["2023-01-01", "2023-01-02"]), vec![1.0, 2.0]).unwrap();
    let replaced = data.with_target_values(vec![5.0, 6.0]).unwrap();

    assert_eq!(replaced.target_values().unwrap(), vec![5.0, 6.0]);
    assert_eq!(data.target_values().unwrap(), vec![1.0, 2.0]);
    assert!(data.with_target_values(vec![1.0]).is_err());
}

#[test]
fn test_mismatched_column_length() {
    let result = TimeSeriesData::with_columns(
        dates(&["2023-01-01", "2023-01-02"]),
        vec![("value".to_string(), vec![1.0])],
        "value",
    );
    assert!(matches!(result, Err(BacktestError::Validation(_))));
}

#[test]
fn test_validate_granularity() {
    let data = TimeSeriesData::new(
        dates(&["2023-01-01 09:00:00", "2023-01-01 17:00:00", "2023-01-02 09:00:00"]),
        vec![1.0, 2.0, 3.0],
    )
    .unwrap();

    assert!(data.validate(Granularity::Hour).is_ok());
    assert!(matches!(
        data.validate(Granularity::Day),
        Err(BacktestError::Data(_))
    ));
}

#[test]
fn test_validate_rejects_unsorted() {
    let data = TimeSeriesData::new(
        dates(&["2023-01-02", "2023-01-01", "2023-01-03"]),
        vec![1.0, 2.0, 3.0],
    )
    .unwrap();
    assert!(data.validate(Granularity::Second).is_err());
    assert!(matches!(data.check_ascending(), Err(BacktestError::Data(_))));
}

#[test]
fn test_check_ascending_ignores_granularity() {
    let data = TimeSeriesData::new(
        dates(&["2023-01-01 09:00:00", "2023-01-01 17:00:00", "2023-01-02 09:00:00"]),
        vec![1.0, 2.0, 3.0],
    )
    .unwrap();
    assert!(data.check_ascending().is_ok());

    let repeated = TimeSeriesData::new(
        dates(&["2023-01-01", "2023-01-01", "2023-01-02"]),
        vec![1.0, 2.0, 3.0],
    )
    .unwrap();
    assert!(repeated.check_ascending().is_err());
}

#[test]
fn test_monthly_frequency() {
    let data = TimeSeriesData::new(
        dates(&["2023-01-31", "2023-02-28", "2023-03-28"]),
        vec![1.0, 2.0, 3.0],
    )
    .unwrap();
    assert_eq!(data.frequency().unwrap(), Some(Frequency::Monthly));
}
