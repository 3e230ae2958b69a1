use backcast::error::BacktestError;
use backcast::window::{plan, WindowSpec};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
#[case(10, 2, None, 2, 4)]
#[case(10, 2, Some(4), 3, 2)]
#[case(100, 10, Some(30), 10, 7)]
#[case(40, 10, Some(30), 10, 1)]
#[case(12, 3, Some(5), 1, 5)]
#[case(11, 3, None, 3, 2)]
fn test_window_count(
    #[case] length: usize,
    #[case] test_window: usize,
    #[case] train_window: Option<usize>,
    #[case] step: usize,
    #[case] expected: usize,
) {
    let windows = plan(length, test_window, train_window, step).unwrap();
    assert_eq!(windows.len(), expected);

    // Closed form: floor((L - t - start) / s) + 1 when the first window fits
    let start = train_window.unwrap_or(step);
    let formula = if length >= test_window + start {
        (length - test_window - start) / step + 1
    } else {
        0
    };
    assert_eq!(windows.len(), formula);
}

#[rstest]
#[case(10, 2, Some(4), 3)]
#[case(10, 2, None, 2)]
#[case(37, 5, Some(7), 4)]
fn test_window_invariants(
    #[case] length: usize,
    #[case] test_window: usize,
    #[case] train_window: Option<usize>,
    #[case] step: usize,
) {
    let windows = plan(length, test_window, train_window, step).unwrap();

    for (i, window) in windows.iter().enumerate() {
        assert_eq!(window.index, i);
        assert_eq!(window.train.end, window.test.start);
        assert_eq!(window.test.len(), test_window);
        assert!(window.test.end <= length);
        match train_window {
            Some(w) => assert_eq!(window.train.len(), w),
            None => assert_eq!(window.train.start, 0),
        }
    }

    for pair in windows.windows(2) {
        assert_eq!(pair[1].test.start - pair[0].test.start, step);
    }
}

#[test]
fn test_expanding_training_ranges_grow() {
    let windows = plan(20, 4, None, 4).unwrap();
    let train_ends: Vec<usize> = windows.iter().map(|w| w.train.end).collect();
    assert_eq!(train_ends, vec![4, 8, 12, 16]);
    assert!(windows.iter().all(|w| w.train.start == 0));
}

#[test]
fn test_sliding_training_ranges_keep_length() {
    let windows = plan(40, 10, Some(30), 10).unwrap();
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].train, 0..30);
    assert_eq!(windows[0].test, 30..40);
}

#[test]
fn test_trailing_rows_are_unused() {
    // 23 rows, tests at 10..15 and 15..20; rows 20..23 are never tested
    let windows = plan(23, 5, Some(10), 5).unwrap();
    assert_eq!(windows.len(), 2);
    assert_eq!(windows[1].test, 15..20);
}

#[rstest]
#[case(10, 9, 9)]
#[case(10, 5, 20)]
fn test_no_window_fits(#[case] length: usize, #[case] test_window: usize, #[case] step: usize) {
    // The count formula floor((L - s - t) / s) + 1 needs L - s >= t, which fails
    // here: the first test range would start at `step` and run past the end
    let windows = plan(length, test_window, None, step).unwrap();
    assert!(windows.is_empty());
}

#[rstest]
#[case(0, 1, None, 1)]
#[case(10, 0, None, 1)]
#[case(10, 10, None, 1)]
#[case(10, 12, Some(3), 1)]
#[case(10, 2, None, 0)]
#[case(10, 2, Some(0), 2)]
#[case(10, 2, Some(10), 2)]
fn test_invalid_configuration(
    #[case] length: usize,
    #[case] test_window: usize,
    #[case] train_window: Option<usize>,
    #[case] step: usize,
) {
    let result = plan(length, test_window, train_window, step);
    assert!(matches!(result, Err(BacktestError::Configuration(_))));
}

#[test]
fn test_window_spec_matches_plan() {
    let spec = WindowSpec::new(3).with_train_window(6);
    assert_eq!(spec.plan(20).unwrap(), plan(20, 3, Some(6), 3).unwrap());

    let spec = spec.with_step_size(2);
    assert_eq!(spec.plan(20).unwrap(), plan(20, 3, Some(6), 2).unwrap());
}

#[test]
fn test_plan_is_deterministic() {
    assert_eq!(plan(50, 7, Some(9), 3).unwrap(), plan(50, 7, Some(9), 3).unwrap());
}
