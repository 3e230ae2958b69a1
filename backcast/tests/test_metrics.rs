use assert_approx_eq::assert_approx_eq;
use backcast::error::BacktestError;
use backcast::metrics::{
    builtin, evaluate, mean_absolute_error, mean_absolute_percentage_error, mean_squared_error,
    root_mean_squared_error, symmetric_mean_absolute_percentage_error, Metric, MetricSet,
    BUILTIN_METRICS,
};
use rstest::rstest;

#[test]
fn test_regression_metrics() {
    let actual = vec![10.0, 20.0, 30.0, 40.0, 50.0];
    let predicted = vec![12.0, 18.0, 33.0, 37.0, 52.0];

    assert_approx_eq!(mean_absolute_error(&actual, &predicted).unwrap(), 2.4, 1e-12);
    assert_approx_eq!(mean_squared_error(&actual, &predicted).unwrap(), 6.0, 1e-12);
    assert_approx_eq!(root_mean_squared_error(&actual, &predicted).unwrap(), 6f64.sqrt(), 1e-12);
    assert_approx_eq!(mean_absolute_percentage_error(&actual, &predicted).unwrap(), 0.103, 1e-12);

    let smape = symmetric_mean_absolute_percentage_error(&actual, &predicted).unwrap();
    assert!(smape > 0.0 && smape < 0.15);
}

#[test]
fn test_perfect_forecast() {
    let actual = vec![1.0, 2.0, 3.0];
    for name in BUILTIN_METRICS {
        let metric = builtin(name).unwrap();
        assert_eq!(metric.score(&actual, &actual).unwrap(), 0.0, "{}", name);
    }
}

#[rstest]
#[case("mae")]
#[case("mse")]
#[case("rmse")]
#[case("mape")]
#[case("smape")]
fn test_length_mismatch(#[case] name: &str) {
    let metric = builtin(name).unwrap();
    match metric.score(&[1.0, 2.0], &[1.0]) {
        Err(BacktestError::Metric { name: failed, .. }) => assert_eq!(failed, name),
        other => panic!("expected metric error, got {:?}", other),
    }
    assert!(metric.score(&[], &[]).is_err());
}

#[test]
fn test_mape_rejects_zero_actuals() {
    let result = mean_absolute_percentage_error(&[0.0, 1.0], &[0.5, 1.0]);
    assert!(matches!(result, Err(BacktestError::Metric { .. })));
}

#[test]
fn test_unknown_builtin() {
    assert!(builtin("r2").is_none());
    assert!(matches!(
        MetricSet::from_names(&["mae", "r2"]),
        Err(BacktestError::Configuration(_))
    ));
}

#[test]
fn test_evaluate_scores_every_metric() {
    let metrics = MetricSet::from_names(&["mae", "mse"])
        .unwrap()
        .with(Metric::from_fn("max_error", |y_true: &[f64], y_pred: &[f64]| {
            y_true
                .iter()
                .zip(y_pred)
                .map(|(a, f)| (a - f).abs())
                .fold(0.0, f64::max)
        }))
        .unwrap();
    assert_eq!(metrics.len(), 3);

    let scores = evaluate(&[1.0, 2.0, 4.0], &[1.0, 3.0, 1.0], &metrics).unwrap();
    assert_eq!(scores.len(), 3);
    assert_approx_eq!(scores["mae"], 4.0 / 3.0, 1e-12);
    assert_approx_eq!(scores["mse"], 10.0 / 3.0, 1e-12);
    assert_approx_eq!(scores["max_error"], 3.0, 1e-12);
}

#[test]
fn test_evaluate_propagates_first_failure() {
    let metrics = MetricSet::new()
        .with(Metric::new("broken", |_: &[f64], _: &[f64]| {
            Err(BacktestError::metric("broken", "always fails"))
        }))
        .unwrap();

    match evaluate(&[1.0], &[1.0], &metrics) {
        Err(BacktestError::Metric { name, message }) => {
            assert_eq!(name, "broken");
            assert_eq!(message, "always fails");
        }
        other => panic!("expected metric error, got {:?}", other),
    }
}

#[test]
fn test_empty_metric_set() {
    let scores = evaluate(&[1.0], &[2.0], &MetricSet::new()).unwrap();
    assert!(scores.is_empty());
}
